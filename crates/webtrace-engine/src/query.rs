use regex::Regex;
use serde::{Deserialize, Serialize};
use webtrace_types::{RequestRecord, ResourceKind};

/// A user-supplied URL pattern.
///
/// Invalid regexes degrade to case-insensitive substring matching rather
/// than surfacing an error; filter input is never authoritative enough to
/// reject.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Regex(Regex),
    Substring(String),
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => UrlPattern::Regex(regex),
            Err(_) => UrlPattern::Substring(pattern.to_ascii_lowercase()),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Regex(regex) => regex.is_match(url),
            UrlPattern::Substring(needle) => url.to_ascii_lowercase().contains(needle),
        }
    }
}

/// Filter over finalized request records. All clauses are optional and
/// conjunctive; results keep insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestFilter {
    pub url_pattern: Option<String>,
    /// Exact method, compared case-insensitively.
    pub method: Option<String>,
    /// Inclusive status bounds.
    pub status_range: Option<(u16, u16)>,
    pub resource_kind: Option<ResourceKind>,
    /// Minimum start timestamp in wall-clock milliseconds.
    pub since_ms: Option<f64>,
    /// Applied after sorting.
    pub limit: Option<usize>,
}

impl RequestFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn url(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = Some(pattern.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn status(mut self, low: u16, high: u16) -> Self {
        self.status_range = Some((low, high));
        self
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.resource_kind = Some(kind);
        self
    }

    pub fn since(mut self, timestamp_ms: f64) -> Self {
        self.since_ms = Some(timestamp_ms);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub(crate) fn filter_records(
    records: Vec<RequestRecord>,
    filter: &RequestFilter,
) -> Vec<RequestRecord> {
    let pattern = filter.url_pattern.as_deref().map(UrlPattern::compile);

    let mut matched: Vec<RequestRecord> = records
        .into_iter()
        .filter(|record| {
            pattern.as_ref().is_none_or(|p| p.matches(&record.url))
                && filter
                    .method
                    .as_deref()
                    .is_none_or(|m| record.method.eq_ignore_ascii_case(m))
                && filter
                    .status_range
                    .is_none_or(|(low, high)| (low..=high).contains(&record.status))
                && filter
                    .resource_kind
                    .is_none_or(|kind| record.resource_kind == kind)
                && filter
                    .since_ms
                    .is_none_or(|since| record.timing.start_ms >= since)
        })
        .collect();

    matched.sort_by_key(|record| record.index);
    if let Some(limit) = filter.limit {
        matched.truncate(limit);
    }
    matched
}
