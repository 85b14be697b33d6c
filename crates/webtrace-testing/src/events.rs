use anyhow::{Context, Result};
use chrono::Utc;
use webtrace_types::{
    ActionKind, Headers, Initiator, InitiatorKind, LoadingFailed, LoadingFinished, NetworkEvent,
    NewAction, RedirectResponse, RequestId, RequestWillBeSent, ResponseReceived, StackTrace,
};

use crate::{mono_at, wall_at, wall_ms};

/// Current wall-clock milliseconds, for tests that record actions "now".
pub fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

/// Parse a JSON array of lifecycle events, as serialized by the types
/// crate.
pub fn events_from_json(json: &str) -> Result<Vec<NetworkEvent>> {
    serde_json::from_str(json).context("failed to parse event fixture")
}

/// Start building a request-sent event at fixture offset zero.
pub fn request_sent(id: &str, url: &str) -> RequestSentBuilder {
    RequestSentBuilder {
        event: RequestWillBeSent {
            request_id: RequestId::new(id),
            url: url.to_string(),
            method: "GET".to_string(),
            headers: Headers::new(),
            post_data: None,
            initiator: Initiator::default(),
            wall_time: wall_at(0.0),
            monotonic_time: mono_at(0.0),
            redirect_response: None,
            resource_type: None,
        },
    }
}

pub struct RequestSentBuilder {
    event: RequestWillBeSent,
}

impl RequestSentBuilder {
    pub fn method(mut self, method: &str) -> Self {
        self.event.method = method.to_string();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.event.headers.insert(name, value);
        self
    }

    pub fn post_data(mut self, data: &str) -> Self {
        self.event.post_data = Some(data.to_string());
        self
    }

    pub fn resource_type(mut self, resource_type: &str) -> Self {
        self.event.resource_type = Some(resource_type.to_string());
        self
    }

    /// Place the event `offset_ms` past the fixture base on both time
    /// bases.
    pub fn at(mut self, offset_ms: f64) -> Self {
        self.event.wall_time = wall_at(offset_ms);
        self.event.monotonic_time = mono_at(offset_ms);
        self
    }

    pub fn stack(mut self, stack: StackTrace) -> Self {
        self.event.initiator.kind = InitiatorKind::Script;
        self.event.initiator.stack = Some(stack);
        self
    }

    /// Mark this request as the CORS preflight for `target_id`.
    pub fn preflight_of(mut self, target_id: &str) -> Self {
        self.event.method = "OPTIONS".to_string();
        self.event.initiator = Initiator {
            kind: InitiatorKind::Preflight,
            request_id: Some(RequestId::new(target_id)),
            ..Initiator::default()
        };
        self
    }

    /// Attach a redirect hop response, making this event a coalescing
    /// send for an in-flight request.
    pub fn redirect(mut self, status: u16) -> Self {
        self.event.redirect_response = Some(RedirectResponse {
            status,
            status_text: String::new(),
            headers: Headers::new(),
        });
        self
    }

    pub fn build(self) -> NetworkEvent {
        NetworkEvent::RequestWillBeSent(self.event)
    }
}

/// Start building a response-received event at fixture offset zero.
pub fn response(id: &str, status: u16) -> ResponseBuilder {
    ResponseBuilder {
        event: ResponseReceived {
            request_id: RequestId::new(id),
            url: String::new(),
            status,
            status_text: if status == 200 { "OK".to_string() } else { String::new() },
            headers: Headers::new(),
            mime_type: "application/json".to_string(),
            monotonic_time: mono_at(0.0),
            resource_type: None,
        },
    }
}

pub struct ResponseBuilder {
    event: ResponseReceived,
}

impl ResponseBuilder {
    pub fn mime(mut self, mime_type: &str) -> Self {
        self.event.mime_type = mime_type.to_string();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.event.headers.insert(name, value);
        self
    }

    pub fn resource_type(mut self, resource_type: &str) -> Self {
        self.event.resource_type = Some(resource_type.to_string());
        self
    }

    pub fn at(mut self, offset_ms: f64) -> Self {
        self.event.monotonic_time = mono_at(offset_ms);
        self
    }

    pub fn build(self) -> NetworkEvent {
        NetworkEvent::ResponseReceived(self.event)
    }
}

pub fn finished(id: &str, offset_ms: f64) -> NetworkEvent {
    finished_with_size(id, offset_ms, 0.0)
}

pub fn finished_with_size(id: &str, offset_ms: f64, encoded_bytes: f64) -> NetworkEvent {
    NetworkEvent::LoadingFinished(LoadingFinished {
        request_id: RequestId::new(id),
        monotonic_time: mono_at(offset_ms),
        encoded_data_length: encoded_bytes,
    })
}

pub fn failed(id: &str, error_text: &str, offset_ms: f64) -> NetworkEvent {
    NetworkEvent::LoadingFailed(LoadingFailed {
        request_id: RequestId::new(id),
        error_text: error_text.to_string(),
        monotonic_time: mono_at(offset_ms),
    })
}

/// An action timestamped `offset_ms` past the fixture base.
pub fn action_at(kind: ActionKind, offset_ms: f64) -> NewAction {
    NewAction::new(kind, wall_ms(offset_ms))
}

/// A stack whose async root is a click handler, the common shape for
/// user-gesture initiated fetches.
pub fn click_stack() -> StackTrace {
    stack_with_event("click", 1)
}

/// A stack with `depth` async hops ending in a frame described by
/// `event`.
pub fn stack_with_event(event: &str, depth: usize) -> StackTrace {
    let mut stack = StackTrace {
        description: Some(event.to_string()),
        call_frames: Vec::new(),
        parent: None,
    };
    for _ in 0..depth {
        stack = StackTrace {
            description: None,
            call_frames: Vec::new(),
            parent: Some(Box::new(stack)),
        };
    }
    stack
}
