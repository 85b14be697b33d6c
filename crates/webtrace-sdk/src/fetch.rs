use futures::future::BoxFuture;
use webtrace_types::{FetchedBody, RequestId};

/// Retrieves response bodies from the debug source.
///
/// Called only for finalized records with text-like media types.
/// Returning `None` (or mapping any failure to `None`) leaves the record
/// without a body; fetch failure is never fatal.
pub trait BodyFetcher: Send + Sync {
    fn fetch_body(&self, request_id: &RequestId) -> BoxFuture<'static, Option<FetchedBody>>;
}

impl<F> BodyFetcher for F
where
    F: Fn(&RequestId) -> BoxFuture<'static, Option<FetchedBody>> + Send + Sync,
{
    fn fetch_body(&self, request_id: &RequestId) -> BoxFuture<'static, Option<FetchedBody>> {
        self(request_id)
    }
}
