use std::fmt;
use std::sync::Arc;

use reqwest::Method;

use crate::request::BodyMode;
use crate::{
    HttpRequest, HttpResponse, HttpTransport, RequestOptions, Result, RetryingTransport, Sleeper,
    TokioSleeper, Transport,
};

/// HTTP client composing the request builder with an (optionally retrying)
/// transport.
///
/// The client holds no per-call state: cloning it or sharing one instance
/// across tasks is cheap and safe.
///
/// ```no_run
/// use reqmate::{Client, RequestOptions, RetryPolicy};
///
/// # async fn run() -> reqmate::Result<()> {
/// let client = Client::new();
/// let response = client
///     .get(
///         "https://api.example.com/health",
///         RequestOptions::new().with_retry(RetryPolicy::default()),
///     )
///     .await?;
/// println!("{}", response.status_line());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &"<transport>")
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a client over a default `reqwest` transport.
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }

    /// Creates a client over any transport, e.g. a test double.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the backoff sleeper used for retrying calls.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Executes a pre-built request once, without option processing or retry.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        request
            .scope()
            .guard(self.transport.execute(request))
            .await
    }

    /// Sends a GET request. Any body in `options` is ignored.
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.send(Method::GET, url, options, BodyMode::Omit).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.send(Method::POST, url, options, BodyMode::Encode).await
    }

    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.send(Method::PUT, url, options, BodyMode::Encode).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.send(Method::DELETE, url, options, BodyMode::Encode).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        mode: BodyMode,
    ) -> Result<HttpResponse> {
        let request = HttpRequest::build(method, url, &options, mode)?;
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            retry = options.retry.is_some(),
            "dispatching request"
        );

        match options.retry {
            Some(policy) => {
                let retrying = RetryingTransport::new(Arc::clone(&self.transport), policy)
                    .with_sleeper(Arc::clone(&self.sleeper));
                request.scope().guard(retrying.execute(&request)).await
            }
            None => self.execute(&request).await,
        }
    }
}
