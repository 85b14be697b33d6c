//! webtrace-sdk: a causal view of browser network behavior.
//!
//! # Overview
//!
//! `webtrace-sdk` wires the capture and correlation engine into a session
//! facade for agent tool layers. It consumes the debugger's network
//! lifecycle events, reconstructs request records, attributes them to
//! recorded user actions, and answers queries over the finalized store.
//!
//! # Quickstart
//!
//! ```no_run
//! use webtrace_sdk::CaptureSession;
//! use webtrace_types::{ActionKind, CaptureConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = CaptureSession::new(CaptureConfig::default())?;
//!
//! // Feed raw debugger envelopes as they arrive.
//! // session.ingest_cdp("Network.requestWillBeSent", &params);
//!
//! // Record what the agent did, then ask why requests happened.
//! session.record_action_now(ActionKind::Click, "#login", r#"button "Sign In""#, "https://app.test");
//! session.wait_for_network_idle(std::time::Duration::from_secs(10)).await;
//! for result in session.correlate_all() {
//!     println!("{} -> {} requests", result.action.id, result.requests.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! This SDK acts as a facade over:
//! - `webtrace-types`: event and record schemas
//! - `webtrace-engine`: lifecycle assembly, correlation, chain detection
//!
//! All engine state sits behind one lock; ingestion, queries and
//! correlation are strictly serialized. The only asynchronous work is the
//! optional response-body fetch, driven through [`BodyFetcher`].

mod fetch;
mod session;

pub use fetch::BodyFetcher;
pub use session::CaptureSession;

// Re-export the engine surface consumers need alongside the session.
pub use webtrace_engine::{
    CaptureStats, ChainKind, CorrelationResult, RequestChain, RequestFilter,
};
pub use webtrace_types::{Error, Result};
