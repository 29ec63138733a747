use std::sync::Arc;

use async_trait::async_trait;

use crate::{HttpRequest, HttpResponse, ReqmateError, Result};

/// Executes exactly one request and yields exactly one response or error.
///
/// Any response that arrives, 5xx included, is `Ok`; only transport-level
/// failures are errors. Implementations must be safe to share across calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request).await
    }
}

/// Plain transport backed by a pooled `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a caller-configured client (proxies, TLS, connect timeouts).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(ReqmateError::transport)?;
        Ok(HttpResponse::from_reqwest(response))
    }
}
