use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::RequestId;

/// Monotonic action identifier with a stable string form (`action_<n>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(u64);

impl ActionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action_{}", self.0)
    }
}

/// The kind of user-level action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Navigate,
    Type,
    Submit,
    Scroll,
    AgentAction,
}

/// A recorded user-level action (navigation, click, keystroke, ...).
///
/// Actions are append-only within a session; `resulting_requests` is
/// written back by the correlator once attribution completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub id: ActionId,
    pub kind: ActionKind,
    /// Target selector, when the action had a DOM target.
    #[serde(default)]
    pub selector: String,
    /// Human-readable target description, e.g. `button "Sign In"`.
    #[serde(default)]
    pub description: String,
    /// Wall-clock milliseconds.
    pub timestamp_ms: f64,
    /// Page URL at the time the action was recorded.
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub resulting_requests: Vec<RequestId>,
}

/// Input for recording an action; the log assigns the id.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub kind: ActionKind,
    pub selector: String,
    pub description: String,
    pub page_url: String,
    pub timestamp_ms: f64,
}

impl NewAction {
    pub fn new(kind: ActionKind, timestamp_ms: f64) -> Self {
        Self {
            kind,
            selector: String::new(),
            description: String::new(),
            page_url: String::new(),
            timestamp_ms,
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }
}
