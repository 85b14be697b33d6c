//! Fixtures and builders for webtrace tests.
//!
//! Provides utilities to:
//! - Build lifecycle events with a consistent pair of time bases
//! - Generate canned multi-event flows (lifecycles, redirects, auth)
//! - Load event sequences from JSON fixtures

mod events;
mod scenarios;

pub use events::{
    action_at, click_stack, events_from_json, failed, finished, finished_with_size, now_ms,
    request_sent, response, stack_with_event, RequestSentBuilder, ResponseBuilder,
};
pub use scenarios::{authorized_get, complete_lifecycle, redirect_lifecycle};

/// Wall-clock base for fixture events, seconds since epoch.
pub const BASE_WALL_SECS: f64 = 1_700_000_000.0;

/// Monotonic base for fixture events, seconds since an arbitrary origin.
pub const BASE_MONO_SECS: f64 = 5_000.0;

/// Wall-clock seconds at `offset_ms` past the fixture base.
pub fn wall_at(offset_ms: f64) -> f64 {
    BASE_WALL_SECS + offset_ms / 1000.0
}

/// Monotonic seconds at `offset_ms` past the fixture base.
pub fn mono_at(offset_ms: f64) -> f64 {
    BASE_MONO_SECS + offset_ms / 1000.0
}

/// Wall-clock milliseconds at `offset_ms` past the fixture base; what a
/// capture projects fixture timestamps to.
pub fn wall_ms(offset_ms: f64) -> f64 {
    BASE_WALL_SECS * 1000.0 + offset_ms
}
