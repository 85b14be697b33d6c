use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;
use webtrace_engine::{
    capture_stats, ActionLog, CaptureStats, CorrelationResult, Correlator, NetworkCapture,
    RequestFilter,
};
use webtrace_types::{
    ActionId, ActionKind, ActionRecord, CaptureConfig, NetworkEvent, NewAction, RequestId,
    RequestRecord, Result,
};

use crate::fetch::BodyFetcher;

/// How often the in-flight count is sampled while waiting for quiescence.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct SessionState {
    capture: NetworkCapture,
    actions: ActionLog,
}

/// One observed browsing session: a capture engine, an action log and a
/// correlator behind a single lock.
///
/// Everything except the response-body fetch runs serially under the
/// lock; a record is never partially visible to queries. Sessions are
/// constructed, used, and discarded; nothing persists.
pub struct CaptureSession {
    state: Arc<Mutex<SessionState>>,
    correlator: Correlator,
    quiet_period: Duration,
    fetcher: Option<Arc<dyn BodyFetcher>>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// A session that fetches response bodies for text-like media through
    /// `fetcher`.
    pub fn with_fetcher(config: CaptureConfig, fetcher: Arc<dyn BodyFetcher>) -> Result<Self> {
        Self::build(config, Some(fetcher))
    }

    fn build(config: CaptureConfig, fetcher: Option<Arc<dyn BodyFetcher>>) -> Result<Self> {
        let correlator = Correlator::from_config(&config);
        let quiet_period = Duration::from_millis(config.network_quiet_period_ms);
        let capture = NetworkCapture::new(config)?;
        Ok(Self {
            state: Arc::new(Mutex::new(SessionState {
                capture,
                actions: ActionLog::new(),
            })),
            correlator,
            quiet_period,
            fetcher,
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap()
    }

    /// Apply one lifecycle event. When the event finalizes a record with a
    /// fetchable body and a fetcher is configured, the fetch runs as a
    /// background task; its resolution never reorders events for the same
    /// request id because the record is already finalized.
    ///
    /// Must be called within a tokio runtime when a fetcher is configured.
    pub fn ingest(&self, event: NetworkEvent) {
        let ticket = self.state().capture.handle_event(event);
        let (Some(ticket), Some(fetcher)) = (ticket, self.fetcher.clone()) else {
            return;
        };
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let fetched = fetcher.fetch_body(&ticket.request_id).await;
            state.lock().unwrap().capture.attach_body(&ticket, fetched);
        });
    }

    /// Apply a raw debugger envelope; non-lifecycle methods and malformed
    /// payloads are dropped silently.
    pub fn ingest_cdp(&self, method: &str, params: &Value) {
        if let Some(event) = NetworkEvent::from_cdp(method, params) {
            self.ingest(event);
        } else {
            trace!(method, "ignoring non-lifecycle envelope");
        }
    }

    pub fn record_action(&self, action: NewAction) -> ActionId {
        self.state().actions.record(action)
    }

    /// Record an action stamped with the current wall clock.
    pub fn record_action_now(
        &self,
        kind: ActionKind,
        selector: &str,
        description: &str,
        page_url: &str,
    ) -> ActionId {
        let timestamp_ms = Utc::now().timestamp_millis() as f64;
        self.record_action(
            NewAction::new(kind, timestamp_ms)
                .selector(selector)
                .description(description)
                .page_url(page_url),
        )
    }

    pub fn actions(&self) -> Vec<ActionRecord> {
        self.state().actions.all().to_vec()
    }

    /// Discard all requests and actions. Outstanding body fetches are
    /// invalidated and cannot reintroduce records. Idempotent.
    pub fn clear(&self) {
        let mut state = self.state();
        state.capture.clear();
        state.actions.clear();
    }

    pub fn get_requests(&self, filter: &RequestFilter) -> Vec<RequestRecord> {
        self.state().capture.get_requests(filter)
    }

    pub fn get_request(&self, id: &RequestId) -> Option<RequestRecord> {
        self.state().capture.get_request(id)
    }

    pub fn get_requests_since(&self, timestamp_ms: f64) -> Vec<RequestRecord> {
        self.state().capture.get_requests_since(timestamp_ms)
    }

    pub fn correlate_action(&self, action_id: ActionId) -> Option<CorrelationResult> {
        let mut state = self.state();
        let SessionState { capture, actions } = &mut *state;
        self.correlator.correlate_action(action_id, capture, actions)
    }

    pub fn correlate_all(&self) -> Vec<CorrelationResult> {
        let mut state = self.state();
        let SessionState { capture, actions } = &mut *state;
        self.correlator.correlate_all(capture, actions)
    }

    pub fn stats(&self) -> CaptureStats {
        let state = self.state();
        capture_stats(&state.capture, &state.actions)
    }

    pub fn pending_requests(&self) -> usize {
        self.state().capture.pending_count()
    }

    /// Wait until the in-flight count has been continuously zero for the
    /// configured quiet period, bounded by `timeout`. Returns whether
    /// quiescence was reached.
    pub async fn wait_for_network_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut quiet_since: Option<Instant> = None;

        loop {
            let pending = self.pending_requests();
            let now = Instant::now();
            if pending == 0 {
                let since = *quiet_since.get_or_insert(now);
                if now.duration_since(since) >= self.quiet_period {
                    return true;
                }
            } else {
                quiet_since = None;
            }
            if now >= deadline {
                return false;
            }
            let remaining = deadline.duration_since(now);
            tokio::time::sleep(IDLE_POLL_INTERVAL.min(remaining)).await;
        }
    }
}
