mod action;
mod config;
mod error;
mod event;
mod request;

pub use action::{ActionId, ActionKind, ActionRecord, NewAction};
pub use config::CaptureConfig;
pub use error::{Error, Result};
pub use event::{
    CallFrame, Initiator, InitiatorKind, LoadingFailed, LoadingFinished, NetworkEvent,
    RedirectResponse, RequestWillBeSent, ResponseReceived, StackTrace,
};
pub use request::{
    Attribution, AttributionMethod, FetchedBody, Headers, RedirectHop, RequestId, RequestRecord,
    RequestTiming, ResourceKind, ResponseBody,
};
