use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use webtrace_sdk::{BodyFetcher, CaptureSession, RequestFilter};
use webtrace_testing::{action_at, click_stack, complete_lifecycle, finished, request_sent};
use webtrace_types::{
    ActionKind, CaptureConfig, FetchedBody, RequestId, ResourceKind, ResponseBody,
};

struct StaticFetcher;

impl BodyFetcher for StaticFetcher {
    fn fetch_body(&self, _request_id: &RequestId) -> BoxFuture<'static, Option<FetchedBody>> {
        async {
            Some(FetchedBody {
                body: r#"{"ok":true}"#.to_string(),
                base64_encoded: false,
            })
        }
        .boxed()
    }
}

struct SlowFetcher;

impl BodyFetcher for SlowFetcher {
    fn fetch_body(&self, _request_id: &RequestId) -> BoxFuture<'static, Option<FetchedBody>> {
        async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Some(FetchedBody {
                body: "late".to_string(),
                base64_encoded: false,
            })
        }
        .boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn network_idle_requires_a_continuous_quiet_period() {
    let config = CaptureConfig {
        network_quiet_period_ms: 100,
        ..CaptureConfig::default()
    };
    let session = CaptureSession::new(config).unwrap();

    session.ingest(request_sent("r", "https://api.test/slow").at(0.0).build());
    assert_eq!(session.pending_requests(), 1);
    assert!(
        !session
            .wait_for_network_idle(Duration::from_millis(300))
            .await,
        "an in-flight request must hold off quiescence until timeout"
    );

    session.ingest(finished("r", 50.0));
    assert!(
        session.wait_for_network_idle(Duration::from_secs(5)).await,
        "zero pending for the quiet period reaches quiescence"
    );
}

#[tokio::test(start_paused = true)]
async fn response_bodies_attach_asynchronously() {
    let session =
        CaptureSession::with_fetcher(CaptureConfig::default(), Arc::new(StaticFetcher)).unwrap();

    for event in complete_lifecycle("r", "https://api.test/doc", 0.0) {
        session.ingest(event);
    }
    // The record is queryable immediately; the body may arrive later.
    assert!(session.get_request(&RequestId::new("r")).is_some());

    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let record = session.get_request(&RequestId::new("r")).unwrap();
    assert_eq!(
        record.body,
        Some(ResponseBody::Text(r#"{"ok":true}"#.to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn late_body_fetch_cannot_resurrect_cleared_state() {
    let session =
        CaptureSession::with_fetcher(CaptureConfig::default(), Arc::new(SlowFetcher)).unwrap();

    for event in complete_lifecycle("r", "https://api.test/doc", 0.0) {
        session.ingest(event);
    }
    session.clear();
    session.clear(); // idempotent

    // Let the outstanding fetch resolve well past its delay.
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(session.stats().total_requests, 0);
    assert!(session.get_request(&RequestId::new("r")).is_none());
}

#[tokio::test]
async fn raw_envelopes_drive_a_full_lifecycle() {
    let session = CaptureSession::new(CaptureConfig::default()).unwrap();

    session.ingest_cdp(
        "Network.requestWillBeSent",
        &json!({
            "requestId": "9.1",
            "request": {
                "url": "https://api.example.com/users",
                "method": "GET",
                "headers": {"Accept": "application/json"}
            },
            "initiator": {"type": "script"},
            "wallTime": 1_700_000_000.0,
            "timestamp": 5000.0,
            "type": "Fetch"
        }),
    );
    session.ingest_cdp(
        "Network.responseReceived",
        &json!({
            "requestId": "9.1",
            "response": {
                "url": "https://api.example.com/users",
                "status": 200,
                "statusText": "OK",
                "headers": {"Content-Type": "application/json"},
                "mimeType": "application/json"
            },
            "timestamp": 5000.05
        }),
    );
    session.ingest_cdp(
        "Network.loadingFinished",
        &json!({"requestId": "9.1", "timestamp": 5000.06, "encodedDataLength": 321}),
    );
    // Unknown methods and malformed payloads are dropped silently.
    session.ingest_cdp("Page.loadEventFired", &json!({}));
    session.ingest_cdp("Network.requestWillBeSent", &json!({"requestId": "bad"}));

    let record = session.get_request(&RequestId::new("9.1")).unwrap();
    assert_eq!(record.resource_kind, ResourceKind::Fetch);
    assert_eq!(record.status, 200);
    assert_eq!(record.encoded_size, 321);
    assert!((record.timing.duration_ms.unwrap() - 60.0).abs() < 1e-6);
    assert_eq!(session.stats().total_requests, 1);
}

#[tokio::test]
async fn session_surfaces_correlation_and_stats() {
    let session = CaptureSession::new(CaptureConfig::default()).unwrap();

    let action = session.record_action(
        action_at(ActionKind::Click, 1000.0)
            .selector("#signin")
            .description(r#"button "Sign In""#),
    );

    session.ingest(
        request_sent("login", "https://api.test/auth/login")
            .method("POST")
            .stack(click_stack())
            .resource_type("Fetch")
            .at(1100.0)
            .build(),
    );
    session.ingest(finished("login", 1160.0));

    let stats = session.stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.pending_requests, 0);
    assert_eq!(stats.total_actions, 1);
    assert_eq!(stats.by_resource_kind.get(&ResourceKind::Fetch), Some(&1));

    let results = session.correlate_all();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].action.id, action);

    let filtered = session.get_requests(&RequestFilter::all().method("POST"));
    assert_eq!(filtered.len(), 1);
    assert_eq!(
        session.actions()[0].resulting_requests,
        vec![RequestId::new("login")]
    );

    session.clear();
    assert_eq!(session.stats().total_requests, 0);
    assert_eq!(session.stats().total_actions, 0);
}
