use std::path::PathBuf;
use std::time::Duration;

/// Boxed error used for transport failures that do not originate in `reqwest`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type returned by the request execution engine.
#[derive(Debug, thiserror::Error)]
pub enum ReqmateError {
    /// Malformed method, URL or header. Raised before any network I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Request body could not be serialized. Raised before any network I/O.
    #[error("failed to encode body: {0}")]
    Encoding(#[source] serde_json::Error),
    /// Connection, DNS or protocol failure during one attempt.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// The caller's cancellation token fired.
    #[error("request cancelled")]
    Cancelled,
    /// The call's timeout elapsed.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    /// Reading the response body failed.
    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),
}

impl ReqmateError {
    pub(crate) fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Whether a retry policy may absorb this error by issuing another attempt.
    ///
    /// Only transport failures qualify; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the call's cancellation scope fired.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded(_))
    }
}

/// Errors raised while loading, resolving or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write config '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("environment {0:?} not found")]
    EnvironmentNotFound(String),
}

/// Top-level error surfaced by the command-line entry point.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to load config: {0}")]
    Config(#[from] ConfigError),
    #[error("request failed: {0}")]
    Request(#[from] ReqmateError),
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
