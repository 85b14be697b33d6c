use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use url::Url;
use webtrace_types::{RequestId, RequestRecord};

/// Maximum gap between adjacent requests for a sequential dependency.
const SEQUENTIAL_GAP_MS: f64 = 50.0;

/// How much of an issued token is matched against later Authorization
/// headers.
const TOKEN_PREFIX_CHARS: usize = 20;

static AUTH_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)auth|login|sign-in|token|session|oauth").expect("static pattern compiles"));

/// JSON paths a token may live under in an auth response.
const TOKEN_PATHS: [&[&str]; 5] = [
    &["token"],
    &["access_token"],
    &["jwt"],
    &["data", "token"],
    &["data", "access_token"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    Redirect,
    Preflight,
    AuthFlow,
    Sequential,
}

/// A causal relationship detected among the requests of one correlated
/// group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestChain {
    pub kind: ChainKind,
    pub requests: Vec<RequestId>,
    pub description: String,
}

/// Detect redirect, preflight, auth-flow and sequential chains within a
/// group of correlated requests. The group must be sorted by start time.
pub fn detect_chains(group: &[RequestRecord]) -> Vec<RequestChain> {
    let mut chains = Vec::new();
    chains.extend(redirect_chains(group));
    chains.extend(preflight_chains(group));
    if let Some(auth) = auth_flow_chain(group) {
        chains.push(auth);
    }
    chains.extend(sequential_chains(group));
    chains
}

fn redirect_chains(group: &[RequestRecord]) -> Vec<RequestChain> {
    group
        .iter()
        .filter(|record| !record.redirects.is_empty())
        .map(|record| {
            let hops: Vec<String> = record
                .redirects
                .iter()
                .map(|hop| format!("{} ({})", url_path(&hop.url), hop.status))
                .collect();
            RequestChain {
                kind: ChainKind::Redirect,
                requests: vec![record.request_id.clone()],
                description: format!(
                    "{} redirect hops: {} -> {}",
                    record.redirects.len(),
                    hops.join(" -> "),
                    url_path(&record.url)
                ),
            }
        })
        .collect()
}

fn preflight_chains(group: &[RequestRecord]) -> Vec<RequestChain> {
    group
        .iter()
        .filter_map(|record| {
            let preflight_id = record.preflight_request_id.as_ref()?;
            group
                .iter()
                .find(|r| r.request_id == *preflight_id)
                .map(|preflight| RequestChain {
                    kind: ChainKind::Preflight,
                    requests: vec![preflight.request_id.clone(), record.request_id.clone()],
                    description: format!(
                        "CORS preflight for {} {}",
                        record.method,
                        url_path(&record.url)
                    ),
                })
        })
        .collect()
}

/// Find a successful auth-looking POST whose body carries a token, then
/// the later requests that present that token. At most one auth-flow
/// chain is emitted per group.
fn auth_flow_chain(group: &[RequestRecord]) -> Option<RequestChain> {
    for (position, auth) in group.iter().enumerate() {
        if !auth.method.eq_ignore_ascii_case("POST")
            || !AUTH_URL.is_match(&auth.url)
            || !(200..300).contains(&auth.status)
        {
            continue;
        }
        let Some(token) = auth.body.as_ref().and_then(|b| b.as_text()).and_then(extract_token)
        else {
            continue;
        };
        let prefix: String = token.chars().take(TOKEN_PREFIX_CHARS).collect();

        let dependents: Vec<&RequestRecord> = group[position + 1..]
            .iter()
            .filter(|record| {
                record
                    .request_headers
                    .get("authorization")
                    .is_some_and(|value| value.contains(&prefix))
            })
            .collect();
        if dependents.is_empty() {
            continue;
        }

        let mut requests = vec![auth.request_id.clone()];
        requests.extend(dependents.iter().map(|r| r.request_id.clone()));
        return Some(RequestChain {
            kind: ChainKind::AuthFlow,
            requests,
            description: format!(
                "token issued by {} used by {} authenticated requests",
                url_path(&auth.url),
                dependents.len()
            ),
        });
    }
    None
}

fn extract_token(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for path in TOKEN_PATHS {
        let found = path.iter().try_fold(&value, |v, key| v.get(key));
        if let Some(Value::String(token)) = found {
            return Some(token.clone());
        }
    }
    None
}

fn sequential_chains(group: &[RequestRecord]) -> Vec<RequestChain> {
    group
        .windows(2)
        .filter_map(|pair| {
            let (previous, next) = (&pair[0], &pair[1]);
            let end_ms = previous.timing.end_ms?;
            let gap_ms = next.timing.start_ms - end_ms;
            if !(0.0..=SEQUENTIAL_GAP_MS).contains(&gap_ms) {
                return None;
            }
            Some(RequestChain {
                kind: ChainKind::Sequential,
                requests: vec![previous.request_id.clone(), next.request_id.clone()],
                description: format!(
                    "{} -> {} after {:.0} ms",
                    url_path(&previous.url),
                    url_path(&next.url),
                    gap_ms
                ),
            })
        })
        .collect()
}

/// Best-effort path extraction for display. Opaque or malformed URLs fall
/// back to the raw string; this must never panic.
fn url_path(raw: &str) -> String {
    if raw.is_empty() || raw.starts_with("data:") || raw.starts_with("blob:") {
        return raw.to_string();
    }
    match Url::parse(raw) {
        Ok(parsed) if parsed.cannot_be_a_base() => raw.to_string(),
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw.to_string(),
    }
}
