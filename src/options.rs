use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::RetryPolicy;

/// Payload attached to a request by [`RequestOptions::with_body`] or
/// [`RequestOptions::with_json`].
#[derive(Debug)]
pub(crate) enum BodyPayload {
    Raw(Bytes),
    /// Encoded eagerly; a failure is reported by the request builder.
    Json(Result<Bytes, serde_json::Error>),
}

/// Per-call knobs: headers, body, timeout, retry policy and cancellation.
///
/// Setters apply in call order and the last write to a field wins.
///
/// ```
/// use std::time::Duration;
/// use reqmate::{RequestOptions, RetryPolicy};
///
/// let opts = RequestOptions::new()
///     .with_header("Accept", "application/json")
///     .with_timeout(Duration::from_secs(5))
///     .with_retry(RetryPolicy::default());
/// assert_eq!(opts.timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Default)]
pub struct RequestOptions {
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<BodyPayload>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &self.headers)
            .field("body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("cancellable", &self.cancellation.is_some())
            .finish()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one header. A later header with the same (case-insensitive) name wins.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Merges a header mapping, e.g. the resolved headers of an environment.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sends `body` verbatim.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(BodyPayload::Raw(body.into()));
        self
    }

    /// Sends `value` serialized as JSON.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.body = Some(BodyPayload::Json(serde_json::to_vec(value).map(Bytes::from)));
        self
    }

    /// End-to-end limit for the call, retries included. Zero disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            None
        } else {
            Some(timeout)
        };
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Binds the call to `token`; cancelling it aborts any attempt or backoff.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }
}
