use webtrace_engine::NetworkCapture;
use webtrace_testing::{
    complete_lifecycle, failed, finished, finished_with_size, request_sent, response, wall_ms,
};
use webtrace_types::{CaptureConfig, FetchedBody, RequestId, ResourceKind, ResponseBody};

fn capture() -> NetworkCapture {
    NetworkCapture::new(CaptureConfig::default()).expect("default config is valid")
}

fn capture_with(config: CaptureConfig) -> NetworkCapture {
    NetworkCapture::new(config).expect("test config is valid")
}

#[test]
fn simple_get_lifecycle() {
    let mut capture = capture();

    capture.handle_event(
        request_sent("r1", "https://api.example.com/users")
            .resource_type("Fetch")
            .at(0.0)
            .build(),
    );
    assert_eq!(capture.pending_count(), 1);
    assert_eq!(capture.len(), 0, "pending records are invisible");

    capture.handle_event(response("r1", 200).at(89.0).build());
    capture.handle_event(finished_with_size("r1", 95.0, 512.0));

    assert_eq!(capture.pending_count(), 0);
    assert_eq!(capture.len(), 1);

    let record = capture.get_request(&RequestId::new("r1")).unwrap();
    assert_eq!(record.url, "https://api.example.com/users");
    assert_eq!(record.resource_kind, ResourceKind::Fetch);
    assert_eq!(record.status, 200);
    assert_eq!(record.status_text, "OK");
    assert_eq!(record.encoded_size, 512);
    assert_eq!(record.timing.start_ms, wall_ms(0.0));
    assert!((record.timing.response_ms.unwrap() - wall_ms(89.0)).abs() < 1e-6);
    assert!((record.timing.duration_ms.unwrap() - 95.0).abs() < 1e-6);
    assert_eq!(record.body, None);
}

#[test]
fn redirect_hops_coalesce_into_one_record() {
    let mut capture = capture();

    capture.handle_event(request_sent("r", "https://x.test/old").at(0.0).build());
    capture.handle_event(
        request_sent("r", "https://x.test/new")
            .redirect(301)
            .at(10.0)
            .build(),
    );
    capture.handle_event(
        request_sent("r", "https://x.test/final")
            .redirect(302)
            .at(20.0)
            .build(),
    );
    capture.handle_event(response("r", 200).at(80.0).build());
    capture.handle_event(finished("r", 95.0));

    assert_eq!(capture.len(), 1);
    let record = capture.get_request(&RequestId::new("r")).unwrap();
    assert_eq!(record.url, "https://x.test/final");
    assert_eq!(record.redirects.len(), 2);
    assert_eq!(
        record
            .redirects
            .iter()
            .map(|hop| hop.status)
            .collect::<Vec<_>>(),
        vec![301, 302]
    );
    assert_eq!(record.redirects[0].url, "https://x.test/old");
    assert_eq!(record.redirects[1].url, "https://x.test/new");
    // The latest hop owns the start time.
    assert_eq!(record.timing.start_ms, wall_ms(20.0));
}

#[test]
fn store_evicts_earliest_record_at_capacity() {
    let config = CaptureConfig {
        max_requests: 3,
        ..CaptureConfig::default()
    };
    let mut capture = capture_with(config);

    for (position, id) in ["r0", "r1", "r2", "r3", "r4"].iter().enumerate() {
        let start = position as f64 * 200.0;
        for event in complete_lifecycle(id, &format!("https://x.test/{id}"), start) {
            capture.handle_event(event);
        }
    }

    assert_eq!(capture.len(), 3);
    assert!(capture.get_request(&RequestId::new("r0")).is_none());
    assert!(capture.get_request(&RequestId::new("r1")).is_none());
    for id in ["r2", "r3", "r4"] {
        assert!(capture.get_request(&RequestId::new(id)).is_some());
    }
}

#[test]
fn failed_load_finalizes_with_error_text() {
    let mut capture = capture();

    capture.handle_event(request_sent("r", "https://down.test/api").at(0.0).build());
    capture.handle_event(failed("r", "net::ERR_CONNECTION_REFUSED", 30.0));

    let record = capture.get_request(&RequestId::new("r")).unwrap();
    assert_eq!(record.status, 0);
    assert_eq!(record.status_text, "net::ERR_CONNECTION_REFUSED");
    assert!((record.timing.duration_ms.unwrap() - 30.0).abs() < 1e-6);
}

#[test]
fn events_for_unknown_ids_are_dropped() {
    let mut capture = capture();

    capture.handle_event(response("ghost", 200).at(10.0).build());
    capture.handle_event(finished("ghost", 20.0));
    capture.handle_event(failed("ghost", "boom", 30.0));

    assert_eq!(capture.len(), 0);
    assert_eq!(capture.pending_count(), 0);
}

#[test]
fn excluded_urls_are_dropped_before_processing() {
    let config = CaptureConfig {
        exclude_patterns: vec!["analytics".to_string()],
        ..CaptureConfig::default()
    };
    let mut capture = capture_with(config);

    for event in complete_lifecycle("noise", "https://analytics.test/collect", 0.0) {
        capture.handle_event(event);
    }
    for event in complete_lifecycle("real", "https://api.test/data", 0.0) {
        capture.handle_event(event);
    }

    assert_eq!(capture.len(), 1);
    assert!(capture.get_request(&RequestId::new("noise")).is_none());
}

#[test]
fn preflight_pairs_in_either_arrival_order() {
    // Preflight first.
    let mut capture = capture();
    capture.handle_event(
        request_sent("pf", "https://api.test/items")
            .preflight_of("actual")
            .at(0.0)
            .build(),
    );
    capture.handle_event(response("pf", 204).at(10.0).build());
    capture.handle_event(finished("pf", 15.0));
    capture.handle_event(
        request_sent("actual", "https://api.test/items")
            .method("POST")
            .at(20.0)
            .build(),
    );
    capture.handle_event(response("actual", 201).at(50.0).build());
    capture.handle_event(finished("actual", 60.0));

    let preflight = capture.get_request(&RequestId::new("pf")).unwrap();
    let actual = capture.get_request(&RequestId::new("actual")).unwrap();
    assert_eq!(preflight.preflight_for, Some(actual.request_id.clone()));
    assert_eq!(actual.preflight_request_id, Some(preflight.request_id.clone()));

    // Actual first, preflight late.
    let mut capture = self::capture();
    capture.handle_event(
        request_sent("actual", "https://api.test/items")
            .method("POST")
            .at(0.0)
            .build(),
    );
    capture.handle_event(response("actual", 201).at(30.0).build());
    capture.handle_event(finished("actual", 40.0));
    capture.handle_event(
        request_sent("pf", "https://api.test/items")
            .preflight_of("actual")
            .at(50.0)
            .build(),
    );
    capture.handle_event(response("pf", 204).at(60.0).build());
    capture.handle_event(finished("pf", 65.0));

    let preflight = capture.get_request(&RequestId::new("pf")).unwrap();
    let actual = capture.get_request(&RequestId::new("actual")).unwrap();
    assert_eq!(preflight.preflight_for, Some(actual.request_id.clone()));
    assert_eq!(actual.preflight_request_id, Some(preflight.request_id.clone()));
}

#[test]
fn body_attach_truncates_and_placeholders() {
    let config = CaptureConfig {
        max_response_body_size: 10,
        ..CaptureConfig::default()
    };
    let mut capture = capture_with(config);

    capture.handle_event(request_sent("r", "https://api.test/doc").at(0.0).build());
    capture.handle_event(response("r", 200).mime("application/json").at(10.0).build());
    let ticket = capture.handle_event(finished("r", 20.0)).unwrap();

    capture.attach_body(
        &ticket,
        Some(FetchedBody {
            body: "0123456789abcdef".to_string(),
            base64_encoded: false,
        }),
    );
    let record = capture.get_request(&RequestId::new("r")).unwrap();
    assert_eq!(
        record.body,
        Some(ResponseBody::Text("0123456789... [truncated]".to_string()))
    );

    capture.handle_event(request_sent("img", "https://api.test/pic").at(30.0).build());
    capture.handle_event(response("img", 200).mime("image/png").at(40.0).build());
    assert!(
        capture.handle_event(finished("img", 50.0)).is_none(),
        "binary media must not request a body fetch"
    );

    capture.handle_event(request_sent("b64", "https://api.test/blob").at(60.0).build());
    capture.handle_event(response("b64", 200).at(70.0).build());
    let ticket = capture.handle_event(finished("b64", 80.0)).unwrap();
    capture.attach_body(
        &ticket,
        Some(FetchedBody {
            body: "QUJD".to_string(),
            base64_encoded: true,
        }),
    );
    let record = capture.get_request(&RequestId::new("b64")).unwrap();
    assert_eq!(record.body, Some(ResponseBody::Base64(4)));
}

#[test]
fn stale_body_fetch_cannot_commit_after_clear() {
    let mut capture = capture();

    capture.handle_event(request_sent("r", "https://api.test/doc").at(0.0).build());
    capture.handle_event(response("r", 200).at(10.0).build());
    let ticket = capture.handle_event(finished("r", 20.0)).unwrap();

    capture.clear();
    // Same id captured again in the new generation.
    capture.handle_event(request_sent("r", "https://api.test/doc").at(100.0).build());
    capture.handle_event(response("r", 200).at(110.0).build());
    let _fresh = capture.handle_event(finished("r", 120.0)).unwrap();

    capture.attach_body(
        &ticket,
        Some(FetchedBody {
            body: "stale".to_string(),
            base64_encoded: false,
        }),
    );
    let record = capture.get_request(&RequestId::new("r")).unwrap();
    assert_eq!(record.body, None, "stale fetch must not attach");
}

#[test]
fn failed_body_fetch_is_non_fatal() {
    let mut capture = capture();
    for event in complete_lifecycle("r", "https://api.test/doc", 0.0) {
        let _ = capture.handle_event(event);
    }
    // The fetch callback rejected; the record stays committed, body unset.
    let record = capture.get_request(&RequestId::new("r")).unwrap();
    assert_eq!(record.body, None);
    assert_eq!(capture.len(), 1);
}

#[test]
fn json_fixtures_replay_into_the_capture() {
    let fixture = r#"[
        {"type": "request_will_be_sent", "content": {
            "requestId": "fx1",
            "url": "https://api.test/from-fixture",
            "method": "GET",
            "headers": {"Accept": "application/json"},
            "initiator": {"type": "parser"},
            "wallTime": 1700000000.0,
            "monotonicTime": 5000.0
        }},
        {"type": "loading_finished", "content": {
            "requestId": "fx1",
            "monotonicTime": 5000.04,
            "encodedDataLength": 12.0
        }}
    ]"#;

    let mut capture = capture();
    for event in webtrace_testing::events_from_json(fixture).unwrap() {
        capture.handle_event(event);
    }

    let record = capture.get_request(&RequestId::new("fx1")).unwrap();
    assert_eq!(record.url, "https://api.test/from-fixture");
    assert!((record.timing.duration_ms.unwrap() - 40.0).abs() < 1e-6);
}

#[test]
fn clear_is_idempotent() {
    let mut capture = capture();
    for event in complete_lifecycle("r", "https://api.test/doc", 0.0) {
        capture.handle_event(event);
    }
    capture.handle_event(request_sent("pending", "https://api.test/slow").at(200.0).build());

    capture.clear();
    assert_eq!(capture.len(), 0);
    assert_eq!(capture.pending_count(), 0);

    capture.clear();
    assert_eq!(capture.len(), 0);
    assert_eq!(capture.pending_count(), 0);
}
