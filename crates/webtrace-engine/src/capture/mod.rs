mod clock;

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, trace};
use webtrace_types::{
    CaptureConfig, FetchedBody, InitiatorKind, LoadingFailed, LoadingFinished, NetworkEvent,
    RedirectHop, RequestId, RequestRecord, RequestTiming, RequestWillBeSent, ResourceKind,
    ResponseBody, ResponseReceived, Result,
};

use crate::actions::ActionLog;
use crate::query::{self, RequestFilter, UrlPattern};

pub use clock::TimeBase;

const TRUNCATION_MARKER: &str = "... [truncated]";

/// Ticket returned when a finalized record is eligible for a response-body
/// fetch.
///
/// The generation pins the store state the fetch started under;
/// [`NetworkCapture::attach_body`] refuses tickets minted before a
/// `clear()` so a late-resolving fetch cannot reintroduce stale data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyFetchTicket {
    pub request_id: RequestId,
    generation: u64,
}

/// Assembles request lifecycles from the debug event stream.
///
/// A record is *pending* from its first request-sent event and invisible
/// to queries; on loading-finished or loading-failed it is finalized and
/// committed to the bounded store. All state is private to one capture
/// instance; a session is constructed, used, and discarded.
pub struct NetworkCapture {
    config: CaptureConfig,
    exclude: Vec<UrlPattern>,
    clock: TimeBase,
    pending: HashMap<RequestId, RequestRecord>,
    store: VecDeque<RequestRecord>,
    next_index: u64,
    generation: u64,
}

impl NetworkCapture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let config = config.validated()?;
        let exclude = config
            .exclude_patterns
            .iter()
            .map(|pattern| UrlPattern::compile(pattern))
            .collect();
        Ok(Self {
            config,
            exclude,
            clock: TimeBase::new(),
            pending: HashMap::new(),
            store: VecDeque::new(),
            next_index: 0,
            generation: 0,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Apply one lifecycle event.
    ///
    /// Events for the same request id must arrive in source order; there
    /// is no ordering requirement across ids. Returns a ticket when the
    /// event finalized a record whose body should be fetched.
    pub fn handle_event(&mut self, event: NetworkEvent) -> Option<BodyFetchTicket> {
        match event {
            NetworkEvent::RequestWillBeSent(ev) => {
                self.on_request_will_be_sent(ev);
                None
            }
            NetworkEvent::ResponseReceived(ev) => {
                self.on_response_received(ev);
                None
            }
            NetworkEvent::LoadingFinished(ev) => self.on_loading_finished(ev),
            NetworkEvent::LoadingFailed(ev) => {
                self.on_loading_failed(ev);
                None
            }
        }
    }

    fn on_request_will_be_sent(&mut self, ev: RequestWillBeSent) {
        if ev.url.is_empty() {
            debug!(id = %ev.request_id, "dropping request-sent without url");
            return;
        }
        if self.exclude.iter().any(|pattern| pattern.matches(&ev.url)) {
            trace!(url = %ev.url, "request excluded");
            return;
        }

        self.clock.observe(ev.wall_time, ev.monotonic_time);
        let start_ms = ev.wall_time * 1000.0;

        // A redirect-bearing send for an in-flight id is the same request
        // moving to its next hop, not a new one.
        if let Some(redirect) = ev.redirect_response
            && let Some(record) = self.pending.get_mut(&ev.request_id)
        {
            record.redirects.push(RedirectHop {
                url: std::mem::take(&mut record.url),
                status: redirect.status,
                headers: redirect.headers,
            });
            record.url = ev.url;
            record.method = ev.method;
            record.request_headers = ev.headers;
            record.post_data = ev.post_data;
            record.timing.start_ms = start_ms;
            return;
        }

        let mut record = RequestRecord {
            request_id: ev.request_id.clone(),
            index: self.next_index,
            url: ev.url,
            method: ev.method,
            request_headers: ev.headers,
            post_data: ev.post_data,
            status: 0,
            status_text: String::new(),
            response_headers: Default::default(),
            mime_type: String::new(),
            body: None,
            encoded_size: 0,
            resource_kind: ev
                .resource_type
                .as_deref()
                .map(ResourceKind::from_cdp)
                .unwrap_or(ResourceKind::Other),
            initiator: ev.initiator,
            timing: RequestTiming {
                start_ms,
                ..Default::default()
            },
            redirects: Vec::new(),
            preflight_for: None,
            preflight_request_id: None,
            attribution: None,
        };
        self.next_index += 1;

        self.pair_preflight(&mut record);
        self.pending.insert(ev.request_id, record);
    }

    /// Cross-link preflights with their actual requests, tolerating either
    /// arrival order.
    fn pair_preflight(&mut self, record: &mut RequestRecord) {
        if record.initiator.kind == InitiatorKind::Preflight {
            let Some(target) = record.initiator.request_id.clone() else {
                return;
            };
            record.preflight_for = Some(target.clone());
            if let Some(target_record) = self.record_mut(&target) {
                target_record.preflight_request_id = Some(record.request_id.clone());
            }
            return;
        }

        // The preflight may already have been ingested; back-fill our side.
        let preflight_id = self
            .pending
            .values()
            .chain(self.store.iter())
            .find(|r| r.preflight_for.as_ref() == Some(&record.request_id))
            .map(|r| r.request_id.clone());
        if let Some(preflight_id) = preflight_id {
            record.preflight_request_id = Some(preflight_id);
        }
    }

    fn record_mut(&mut self, id: &RequestId) -> Option<&mut RequestRecord> {
        if self.pending.contains_key(id) {
            return self.pending.get_mut(id);
        }
        self.store.iter_mut().find(|r| r.request_id == *id)
    }

    fn on_response_received(&mut self, ev: ResponseReceived) {
        let response_ms = self.clock.project_ms(ev.monotonic_time);
        let Some(record) = self.pending.get_mut(&ev.request_id) else {
            debug!(id = %ev.request_id, "response for unknown request");
            return;
        };
        record.status = ev.status;
        record.status_text = ev.status_text;
        record.response_headers = ev.headers;
        record.mime_type = ev.mime_type;
        record.timing.response_ms = response_ms;
        if let Some(resource_type) = ev.resource_type.as_deref() {
            record.resource_kind = ResourceKind::from_cdp(resource_type);
        }
    }

    fn on_loading_finished(&mut self, ev: LoadingFinished) -> Option<BodyFetchTicket> {
        let end_ms = self.clock.project_ms(ev.monotonic_time);
        let Some(mut record) = self.pending.remove(&ev.request_id) else {
            debug!(id = %ev.request_id, "loading-finished for unknown request");
            return None;
        };
        record.timing.end_ms = end_ms;
        record.timing.duration_ms = end_ms.map(|end| end - record.timing.start_ms);
        record.encoded_size = ev.encoded_data_length.max(0.0) as u64;

        let wants_body = body_capture_eligible(&record.mime_type);
        let request_id = record.request_id.clone();
        self.commit(record);

        wants_body.then(|| BodyFetchTicket {
            request_id,
            generation: self.generation,
        })
    }

    fn on_loading_failed(&mut self, ev: LoadingFailed) {
        let end_ms = self.clock.project_ms(ev.monotonic_time);
        let Some(mut record) = self.pending.remove(&ev.request_id) else {
            debug!(id = %ev.request_id, "loading-failed for unknown request");
            return;
        };
        if record.status == 0 {
            record.status_text = ev.error_text;
        }
        record.timing.end_ms = end_ms;
        record.timing.duration_ms = end_ms.map(|end| end - record.timing.start_ms);
        self.commit(record);
    }

    fn commit(&mut self, record: RequestRecord) {
        while self.store.len() >= self.config.max_requests {
            if let Some(evicted) = self.store.pop_front() {
                trace!(id = %evicted.request_id, index = evicted.index, "evicting oldest record");
            }
        }
        self.store.push_back(record);
    }

    /// Attach a fetched body to a committed record.
    ///
    /// No-op when the ticket predates a `clear()` (the single mandatory
    /// cancellation point) or the record has since been evicted. Text is
    /// truncated to the configured size; base64 payloads keep only their
    /// character count.
    pub fn attach_body(&mut self, ticket: &BodyFetchTicket, fetched: Option<FetchedBody>) {
        if ticket.generation != self.generation {
            trace!(id = %ticket.request_id, "dropping body fetch resolved after clear");
            return;
        }
        let Some(fetched) = fetched else {
            return;
        };
        let Some(record) = self
            .store
            .iter_mut()
            .rev()
            .find(|r| r.request_id == ticket.request_id)
        else {
            return;
        };

        let body = if fetched.base64_encoded {
            ResponseBody::Base64(fetched.body.chars().count())
        } else {
            let limit = self.config.max_response_body_size;
            if fetched.body.chars().count() > limit {
                let truncated: String = fetched.body.chars().take(limit).collect();
                ResponseBody::Text(format!("{truncated}{TRUNCATION_MARKER}"))
            } else {
                ResponseBody::Text(fetched.body)
            }
        };
        record.body = Some(body);
    }

    /// Drop all pending and finalized records and invalidate outstanding
    /// body-fetch tickets. Idempotent.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.store.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub(crate) fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Finalized records in commit order.
    pub fn records(&self) -> impl Iterator<Item = &RequestRecord> {
        self.store.iter()
    }

    /// Snapshot of the finalized store; queries and correlation work on
    /// copies taken at call boundaries.
    pub fn snapshot(&self) -> Vec<RequestRecord> {
        self.store.iter().cloned().collect()
    }

    pub fn get_request(&self, id: &RequestId) -> Option<RequestRecord> {
        self.store
            .iter()
            .find(|r| r.request_id == *id)
            .cloned()
    }

    pub fn get_requests(&self, filter: &RequestFilter) -> Vec<RequestRecord> {
        query::filter_records(self.snapshot(), filter)
    }

    pub fn get_requests_since(&self, timestamp_ms: f64) -> Vec<RequestRecord> {
        self.get_requests(&RequestFilter::all().since(timestamp_ms))
    }

    /// Set a record's attribution. Attribution is written at most once;
    /// returns whether the write happened.
    pub fn apply_attribution(
        &mut self,
        id: &RequestId,
        attribution: webtrace_types::Attribution,
    ) -> bool {
        let Some(record) = self.store.iter_mut().find(|r| r.request_id == *id) else {
            return false;
        };
        if record.attribution.is_some() {
            return false;
        }
        debug!(
            id = %id,
            action = %attribution.action_id,
            method = ?attribution.method,
            confidence = attribution.confidence,
            "request attributed"
        );
        record.attribution = Some(attribution);
        true
    }
}

/// Media types whose bodies are never fetched; decoded payloads for binary
/// media are out of scope.
fn body_capture_eligible(mime_type: &str) -> bool {
    let mime = mime_type.to_ascii_lowercase();
    !(mime.starts_with("image/")
        || mime.starts_with("video/")
        || mime.starts_with("audio/")
        || mime.contains("font")
        || mime.contains("wasm"))
}

/// Aggregate counters over one capture session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStats {
    pub total_requests: usize,
    pub pending_requests: usize,
    pub total_actions: usize,
    pub by_resource_kind: BTreeMap<ResourceKind, usize>,
}

pub fn capture_stats(capture: &NetworkCapture, actions: &ActionLog) -> CaptureStats {
    CaptureStats {
        total_requests: capture.len(),
        pending_requests: capture.pending_count(),
        total_actions: actions.len(),
        by_resource_kind: RequestRecord::kind_counts(capture.records()),
    }
}
