use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::{Headers, RequestId};

// NOTE: Event Shape Design
//
// The debug source delivers loosely typed JSON envelopes. They are modeled
// as tagged variants at this boundary so that missing required fields are
// rejected here instead of propagating as half-initialized records.
//
// Two time bases cross this boundary:
// - wall_time: seconds since epoch, delivered only on request-sent
// - monotonic_time: seconds since an arbitrary origin, on every event
// The ingester reconciles them; events carry both verbatim.

/// A network lifecycle event from the debug source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
#[serde(rename_all = "snake_case")]
pub enum NetworkEvent {
    /// A request went on the wire, or an in-flight request followed a
    /// redirect (when `redirect_response` is set).
    RequestWillBeSent(RequestWillBeSent),

    /// Response status, headers and media type arrived.
    ResponseReceived(ResponseReceived),

    /// The exchange completed; the record can be finalized.
    LoadingFinished(LoadingFinished),

    /// The exchange failed mid-flight (DNS error, abort, CORS rejection).
    LoadingFailed(LoadingFailed),
}

impl NetworkEvent {
    pub fn request_id(&self) -> &RequestId {
        match self {
            NetworkEvent::RequestWillBeSent(ev) => &ev.request_id,
            NetworkEvent::ResponseReceived(ev) => &ev.request_id,
            NetworkEvent::LoadingFinished(ev) => &ev.request_id,
            NetworkEvent::LoadingFailed(ev) => &ev.request_id,
        }
    }

    pub fn monotonic_time(&self) -> f64 {
        match self {
            NetworkEvent::RequestWillBeSent(ev) => ev.monotonic_time,
            NetworkEvent::ResponseReceived(ev) => ev.monotonic_time,
            NetworkEvent::LoadingFinished(ev) => ev.monotonic_time,
            NetworkEvent::LoadingFailed(ev) => ev.monotonic_time,
        }
    }

    /// Map a raw debugger envelope (`Network.*` method plus params object)
    /// onto a lifecycle event.
    ///
    /// Returns `None` for methods outside the network lifecycle and for
    /// payloads missing their required fields. The source is authoritative;
    /// malformed envelopes are dropped, never surfaced.
    pub fn from_cdp(method: &str, params: &Value) -> Option<Self> {
        match method {
            "Network.requestWillBeSent" => {
                let request_id = RequestId::new(params.get("requestId")?.as_str()?);
                let request = params.get("request")?;
                let url = request.get("url")?.as_str()?.to_string();
                let method = request
                    .get("method")
                    .and_then(Value::as_str)
                    .unwrap_or("GET")
                    .to_string();
                let headers = Headers::from_json(request.get("headers").unwrap_or(&Value::Null));
                let post_data = request
                    .get("postData")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let initiator = params
                    .get("initiator")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                let redirect_response = params
                    .get("redirectResponse")
                    .and_then(|v| serde_json::from_value(v.clone()).ok());
                Some(NetworkEvent::RequestWillBeSent(RequestWillBeSent {
                    request_id,
                    url,
                    method,
                    headers,
                    post_data,
                    initiator,
                    wall_time: params.get("wallTime")?.as_f64()?,
                    monotonic_time: params.get("timestamp")?.as_f64()?,
                    redirect_response,
                    resource_type: cdp_resource_type(params),
                }))
            }
            "Network.responseReceived" => {
                let request_id = RequestId::new(params.get("requestId")?.as_str()?);
                let response = params.get("response")?;
                Some(NetworkEvent::ResponseReceived(ResponseReceived {
                    request_id,
                    url: response
                        .get("url")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    status: response.get("status")?.as_u64()? as u16,
                    status_text: response
                        .get("statusText")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    headers: Headers::from_json(response.get("headers").unwrap_or(&Value::Null)),
                    mime_type: response
                        .get("mimeType")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    monotonic_time: params.get("timestamp")?.as_f64()?,
                    resource_type: cdp_resource_type(params),
                }))
            }
            "Network.loadingFinished" => Some(NetworkEvent::LoadingFinished(LoadingFinished {
                request_id: RequestId::new(params.get("requestId")?.as_str()?),
                monotonic_time: params.get("timestamp")?.as_f64()?,
                encoded_data_length: params
                    .get("encodedDataLength")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            })),
            "Network.loadingFailed" => Some(NetworkEvent::LoadingFailed(LoadingFailed {
                request_id: RequestId::new(params.get("requestId")?.as_str()?),
                error_text: params
                    .get("errorText")
                    .and_then(Value::as_str)
                    .unwrap_or("loading failed")
                    .to_string(),
                monotonic_time: params.get("timestamp")?.as_f64()?,
            })),
            _ => None,
        }
    }
}

fn cdp_resource_type(params: &Value) -> Option<String> {
    params
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
    pub request_id: RequestId,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    #[serde(default)]
    pub initiator: Initiator,
    /// Seconds since epoch. Only request-sent events carry wall-clock time.
    pub wall_time: f64,
    /// Seconds since an arbitrary origin.
    pub monotonic_time: f64,
    /// Present when this event is a redirect hop of an in-flight request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_response: Option<RedirectResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    pub request_id: RequestId,
    #[serde(default)]
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub mime_type: String,
    pub monotonic_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
    pub request_id: RequestId,
    pub monotonic_time: f64,
    #[serde(default)]
    pub encoded_data_length: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
    pub request_id: RequestId,
    pub error_text: String,
    pub monotonic_time: f64,
}

/// The response that caused a redirect hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Headers,
}

/// The source of a network request as reported by the debug protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    #[serde(rename = "type")]
    pub kind: InitiatorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<f64>,
    /// For preflight initiators, the id of the request this preflight is
    /// clearing the way for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl Default for Initiator {
    fn default() -> Self {
        Self {
            kind: InitiatorKind::Other,
            stack: None,
            url: None,
            line_number: None,
            column_number: None,
            request_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorKind {
    Parser,
    Script,
    Preload,
    Preflight,
    Other,
}

/// A JavaScript stack, possibly with an async parent chain.
///
/// Each node holds its synchronous frames and an optional boxed parent;
/// traversal is bounded by the consumer so cyclic or pathological inputs
/// cannot loop forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    /// Label the runtime assigns to async portions, e.g. the DOM event
    /// name that scheduled this continuation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<StackTrace>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub line_number: u32,
    #[serde(default)]
    pub column_number: u32,
}
