use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Url};

use crate::options::BodyPayload;
use crate::scope::CallScope;
use crate::{ReqmateError, RequestOptions, Result};

const DEFAULT_USER_AGENT: &str = concat!("reqmate/", env!("CARGO_PKG_VERSION"));

/// Whether the builder encodes the options' body into the payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BodyMode {
    /// No payload is attached, whatever the options say.
    Omit,
    /// The options' body is encoded; an absent body becomes an empty payload.
    Encode,
}

/// A fully-formed request. Re-issued unchanged on every retry attempt.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    scope: CallScope,
}

impl HttpRequest {
    /// Creates a bare request with default headers and no payload.
    pub fn new(method: &str, url: &str) -> Result<Self> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ReqmateError::InvalidRequest(format!("invalid method {method:?}")))?;
        Ok(Self {
            method,
            url: parse_url(url)?,
            headers: default_headers(),
            body: None,
            scope: CallScope::default(),
        })
    }

    /// Builds a request from `options`: encodes the body, applies headers over
    /// the defaults, and binds the call's cancellation scope.
    pub fn build(method: Method, url: &str, options: &RequestOptions, mode: BodyMode) -> Result<Self> {
        let url = parse_url(url)?;
        let mut headers = default_headers();

        let body = match mode {
            BodyMode::Omit => None,
            BodyMode::Encode => Some(encode_body(options.body.as_ref(), &mut headers)?),
        };

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                ReqmateError::InvalidRequest(format!("invalid header name {name:?}: {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                ReqmateError::InvalidRequest(format!("invalid value for header {name}: {err}"))
            })?;
            headers.insert(name, value);
        }

        Ok(Self {
            method,
            url,
            headers,
            body,
            scope: CallScope::new(options.cancellation.clone(), options.timeout),
        })
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_scope(mut self, scope: CallScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn scope(&self) -> &CallScope {
        &self.scope
    }
}

fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|err| ReqmateError::InvalidRequest(format!("invalid url {url:?}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ReqmateError::InvalidRequest(format!(
            "unsupported url scheme {other:?} in {url:?}"
        ))),
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

fn encode_body(body: Option<&BodyPayload>, headers: &mut HeaderMap) -> Result<Bytes> {
    match body {
        None => Ok(Bytes::new()),
        Some(BodyPayload::Raw(bytes)) => Ok(bytes.clone()),
        Some(BodyPayload::Json(encoded)) => {
            let encoded = encoded.as_ref().map_err(|err| {
                // serde_json::Error is not Clone; rebuild an equivalent one.
                ReqmateError::Encoding(serde::ser::Error::custom(err.to_string()))
            })?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Ok(encoded.clone())
        }
    }
}
