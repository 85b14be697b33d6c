use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::action::ActionId;
use crate::event::Initiator;

/// Opaque request identifier supplied by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Case-preserving header map.
///
/// Names keep the casing the source delivered them with; lookups are
/// case-insensitive. Serializes as a JSON object in insertion order, the
/// same shape the debug protocol uses on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from a JSON object, coercing non-string scalar values.
    /// Anything that is not an object yields an empty map.
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::new();
        };
        let pairs = object
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect();
        Self(pairs)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Case-insensitive lookup of the first header with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    pairs.push((name, value));
                }
                Ok(Headers(pairs))
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

/// What kind of resource a request fetched, per the debug protocol's
/// resource typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Script,
    Image,
    Font,
    Xhr,
    Fetch,
    Websocket,
    Other,
}

impl ResourceKind {
    /// Map the protocol's `type` string. Unknown or absent types are Other.
    pub fn from_cdp(resource_type: &str) -> Self {
        match resource_type.to_ascii_lowercase().as_str() {
            "document" => ResourceKind::Document,
            "stylesheet" => ResourceKind::Stylesheet,
            "script" => ResourceKind::Script,
            "image" => ResourceKind::Image,
            "font" => ResourceKind::Font,
            "xhr" => ResourceKind::Xhr,
            "fetch" => ResourceKind::Fetch,
            "websocket" => ResourceKind::Websocket,
            _ => ResourceKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Document => "document",
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Script => "script",
            ResourceKind::Image => "image",
            ResourceKind::Font => "font",
            ResourceKind::Xhr => "xhr",
            ResourceKind::Fetch => "fetch",
            ResourceKind::Websocket => "websocket",
            ResourceKind::Other => "other",
        }
    }
}

/// A captured response body.
///
/// Binary payloads reported as base64 keep only their original character
/// count; the decoded bytes are never reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "value")]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    Text(String),
    Base64(usize),
}

impl ResponseBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Base64(_) => None,
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Text(text) => f.write_str(text),
            ResponseBody::Base64(chars) => write!(f, "[base64 encoded, {} chars]", chars),
        }
    }
}

/// A response body as returned by the source's body fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedBody {
    pub body: String,
    #[serde(default)]
    pub base64_encoded: bool,
}

/// One prior redirect hop coalesced into a request record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
}

/// Lifecycle timestamps in wall-clock milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTiming {
    pub start_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

/// How a request was attributed to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    StackTrace,
    TimingSemantic,
    TimingOnly,
    Chain,
}

/// The action a request was attributed to, with the evidence strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub action_id: ActionId,
    /// Probability estimate in [0, 1] that the attribution is correct.
    pub confidence: f64,
    pub method: AttributionMethod,
}

/// A single network exchange through its full lifecycle.
///
/// Records are assembled from lifecycle events and committed to the store
/// on finalization; a record is never partially visible to queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub request_id: RequestId,
    /// Monotonic creation index, used for insertion-order display.
    pub index: u64,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub request_headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    /// 0 until a response arrives; stays 0 for failed loads.
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub response_headers: Headers,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ResponseBody>,
    /// Encoded response size in bytes as reported on loading-finished.
    #[serde(default)]
    pub encoded_size: u64,
    pub resource_kind: ResourceKind,
    #[serde(default)]
    pub initiator: Initiator,
    pub timing: RequestTiming,
    /// Prior hops coalesced under this request id; the record's current
    /// URL is the final hop.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirects: Vec<RedirectHop>,
    /// Set when this record is a CORS preflight for another request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preflight_for: Option<RequestId>,
    /// Set when another record is the CORS preflight for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preflight_request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

impl RequestRecord {
    /// Count requests per resource kind, for stats reporting.
    pub fn kind_counts<'a>(
        records: impl Iterator<Item = &'a RequestRecord>,
    ) -> BTreeMap<ResourceKind, usize> {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.resource_kind).or_insert(0) += 1;
        }
        counts
    }
}
