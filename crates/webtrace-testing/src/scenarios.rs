use webtrace_types::NetworkEvent;

use crate::events::{finished, request_sent, response};

/// A complete GET lifecycle: sent at `start_ms`, 200 response 80 ms
/// later, finished at +95 ms.
pub fn complete_lifecycle(id: &str, url: &str, start_ms: f64) -> Vec<NetworkEvent> {
    vec![
        request_sent(id, url)
            .resource_type("Fetch")
            .at(start_ms)
            .build(),
        response(id, 200).at(start_ms + 80.0).build(),
        finished(id, start_ms + 95.0),
    ]
}

/// A lifecycle that follows `hops` redirect statuses before landing on
/// `final_url` with a 200.
pub fn redirect_lifecycle(
    id: &str,
    urls: &[&str],
    hops: &[u16],
    final_url: &str,
    start_ms: f64,
) -> Vec<NetworkEvent> {
    let mut events = vec![request_sent(id, urls[0]).at(start_ms).build()];
    for (position, status) in hops.iter().enumerate() {
        let next_url = urls.get(position + 1).copied().unwrap_or(final_url);
        events.push(
            request_sent(id, next_url)
                .redirect(*status)
                .at(start_ms + 10.0 * (position + 1) as f64)
                .build(),
        );
    }
    events.push(response(id, 200).at(start_ms + 80.0).build());
    events.push(finished(id, start_ms + 95.0));
    events
}

/// A GET carrying a bearer token, as issued after an auth exchange.
pub fn authorized_get(id: &str, url: &str, token: &str, start_ms: f64) -> Vec<NetworkEvent> {
    vec![
        request_sent(id, url)
            .header("Authorization", &format!("Bearer {token}"))
            .resource_type("Fetch")
            .at(start_ms)
            .build(),
        response(id, 200).at(start_ms + 30.0).build(),
        finished(id, start_ms + 40.0),
    ]
}
