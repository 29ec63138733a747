use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{ReqmateError, Result};

/// Cancellation and deadline shared by every suspension point of one call.
///
/// The deadline is fixed when the scope is created, so a timeout covers the
/// whole retry sequence rather than each attempt.
#[derive(Clone, Debug, Default)]
pub struct CallScope {
    token: Option<CancellationToken>,
    deadline: Option<(Instant, Duration)>,
}

impl CallScope {
    pub fn new(token: Option<CancellationToken>, timeout: Option<Duration>) -> Self {
        Self {
            token,
            deadline: timeout.and_then(|timeout| {
                Instant::now()
                    .checked_add(timeout)
                    .map(|deadline| (deadline, timeout))
            }),
        }
    }

    /// Returns the error the scope has already fired with, if any.
    pub fn check(&self) -> Result<()> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(ReqmateError::Cancelled);
        }
        match self.deadline {
            Some((deadline, timeout)) if Instant::now() >= deadline => {
                Err(ReqmateError::DeadlineExceeded(timeout))
            }
            _ => Ok(()),
        }
    }

    /// Resolves once the token is cancelled or the deadline passes.
    async fn fired(&self) -> ReqmateError {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some((deadline, _)) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => ReqmateError::Cancelled,
            () = expired => {
                let timeout = self.deadline.map_or(Duration::ZERO, |(_, t)| t);
                ReqmateError::DeadlineExceeded(timeout)
            }
        }
    }

    /// Runs `fut` unless the scope fires first, in which case `fut` is dropped.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.fired() => Err(err),
            result = fut => result,
        }
    }
}
