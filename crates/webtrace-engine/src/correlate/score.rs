use once_cell::sync::Lazy;
use regex::Regex;
use webtrace_types::{ActionKind, ActionRecord, RequestRecord, ResourceKind};

const PROXIMITY_WEIGHT: f64 = 0.35;
const PROXIMITY_DECAY_MS: f64 = 150.0;
const BACKGROUND_PENALTY: f64 = 0.20;

/// URL fragments that identify analytics/telemetry traffic. Such requests
/// fire continuously and correlate with nothing the user did.
const BACKGROUND_MARKERS: [&str; 15] = [
    "google-analytics",
    "gtag",
    "fbevents",
    "segment.io",
    "hotjar",
    "sentry",
    "datadog",
    "newrelic",
    "analytics",
    "tracking",
    "telemetry",
    "heartbeat",
    "health",
    "ping",
    "beacon",
];

/// One row of the semantic table: action wording plus request shape.
/// Rows are evaluated in order; the first match wins.
struct SemanticPattern {
    action_text: Regex,
    url: Option<Regex>,
    method: Option<&'static str>,
    bonus: f64,
}

static SEMANTIC_PATTERNS: Lazy<Vec<SemanticPattern>> = Lazy::new(|| {
    let row = |action: &str, url: Option<&str>, method: Option<&'static str>, bonus: f64| {
        SemanticPattern {
            action_text: case_insensitive(action),
            url: url.map(case_insensitive),
            method,
            bonus,
        }
    };
    vec![
        row(
            r"log[ _-]?in|sign[ _-]?in",
            Some(r"auth|login|sign-?in|session"),
            Some("POST"),
            0.30,
        ),
        row(
            r"register|sign[ _-]?up",
            Some(r"register|sign-?up|user"),
            Some("POST"),
            0.30,
        ),
        row(r"save|update|submit", None, Some("POST"), 0.15),
        row(r"delete|remove", None, Some("DELETE"), 0.25),
        row(r"search", Some(r"search|query|find"), Some("GET"), 0.25),
        row(
            r"load[ _-]?more|next",
            Some(r"page|offset|cursor|limit"),
            Some("GET"),
            0.20,
        ),
        row(
            r"log[ _-]?out|sign[ _-]?out",
            Some(r"logout|sign-?out|session"),
            None,
            0.30,
        ),
    ]
});

fn case_insensitive(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("static pattern compiles")
}

pub fn is_background_noise(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    BACKGROUND_MARKERS.iter().any(|marker| url.contains(marker))
}

/// Timing-plus-semantics score for one request/action pair, clamped to
/// [0, 1]. The caller has already restricted candidates to the
/// correlation window, so a negative delta here means clock skew and
/// earns the maximum proximity term.
pub fn score_candidate(request: &RequestRecord, action: &ActionRecord) -> f64 {
    let delta_ms = request.timing.start_ms - action.timestamp_ms;
    let proximity = PROXIMITY_WEIGHT * (-delta_ms.max(0.0) / PROXIMITY_DECAY_MS).exp();

    let mut score = proximity + action_type_bonus(request, action) + semantic_bonus(request, action);
    if is_background_noise(&request.url) {
        score -= BACKGROUND_PENALTY;
    }
    score.clamp(0.0, 1.0)
}

fn action_type_bonus(request: &RequestRecord, action: &ActionRecord) -> f64 {
    match action.kind {
        ActionKind::Navigate if request.resource_kind == ResourceKind::Document => 0.35,
        ActionKind::Submit if request.method.eq_ignore_ascii_case("POST") => 0.25,
        ActionKind::Click
            if matches!(
                request.resource_kind,
                ResourceKind::Xhr | ResourceKind::Fetch
            ) =>
        {
            0.15
        }
        _ => 0.0,
    }
}

fn semantic_bonus(request: &RequestRecord, action: &ActionRecord) -> f64 {
    let action_text = format!("{} {}", action.description, action.selector);
    for pattern in SEMANTIC_PATTERNS.iter() {
        if pattern.action_text.is_match(&action_text)
            && pattern.url.as_ref().is_none_or(|u| u.is_match(&request.url))
            && pattern
                .method
                .is_none_or(|m| request.method.eq_ignore_ascii_case(m))
        {
            return pattern.bonus;
        }
    }
    0.0
}
