//! `reqmate` is a scriptable command-line HTTP client.
//!
//! The library exposes the request execution engine behind the CLI:
//! - [`RequestOptions`] collects per-call headers, body, timeout and retry policy
//! - [`Client`] builds requests and dispatches them through a [`Transport`]
//! - [`RetryingTransport`] adds exponential backoff on top of any transport
//!
//! Configuration loading and response printing live in [`config`] and [`output`].

mod client;
mod error;
mod options;
mod request;
mod response;
mod retry;
mod scope;
mod transport;

pub mod config;
pub mod logger;
pub mod output;

pub use client::Client;
pub use error::{AppError, BoxError, ConfigError, ReqmateError};
pub use options::RequestOptions;
pub use request::{BodyMode, HttpRequest};
pub use response::{HttpResponse, ResponseBody};
pub use retry::{RetryPolicy, RetryingTransport, Sleeper, TokioSleeper};
pub use scope::CallScope;
pub use transport::{HttpTransport, Transport};

pub use reqwest::{header, Method, StatusCode, Url, Version};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ReqmateError>;
