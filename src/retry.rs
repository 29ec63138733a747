use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{HttpRequest, HttpResponse, Result, Transport};

/// Configures retry behavior for one call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_attempts: u32,
    /// Base backoff, doubled after every retry.
    pub wait_time: Duration,
    /// Upper bound for a single backoff.
    pub max_wait_time: Duration,
    /// Statuses that trigger a retry even though the exchange succeeded.
    pub retryable_status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_time: Duration::from_millis(100),
            max_wait_time: Duration::from_secs(2),
            retryable_status_codes: [500, 502, 503, 504].into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry following attempt `attempt` (0-indexed):
    /// `min(wait_time * 2^attempt, max_wait_time)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.wait_time.checked_mul(factor))
            .map_or(self.max_wait_time, |delay| delay.min(self.max_wait_time))
    }

    /// Whether `status` is a non-2xx code in the configured set.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        !status.is_success() && self.retryable_status_codes.contains(&status.as_u16())
    }
}

/// Suspends between attempts. Injected so tests can observe delays without
/// real time passing.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Transport decorator that re-issues a request on transport errors and
/// retryable statuses.
///
/// Attempts run strictly one after another. A discarded response is dropped,
/// releasing its connection, before the backoff starts. Once attempts are
/// exhausted the caller gets exactly what the final attempt produced.
/// Cancellation of the request's scope aborts both attempts and backoffs.
#[derive(Clone)]
pub struct RetryingTransport {
    inner: Arc<dyn Transport>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("policy", &self.policy)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Transport for RetryingTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let scope = request.scope();
        let mut attempt = 0u32;
        loop {
            let outcome = scope.guard(self.inner.execute(request)).await;

            let retryable = match &outcome {
                Ok(response) => self.policy.is_retryable_status(response.status()),
                Err(err) => err.is_retryable(),
            };
            if !retryable {
                return outcome;
            }
            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    method = %request.method(),
                    url = %request.url(),
                    attempts = attempt + 1,
                    "retries exhausted"
                );
                return outcome;
            }

            let delay = self.policy.backoff(attempt);
            match &outcome {
                Ok(response) => tracing::debug!(
                    attempt,
                    status = response.status().as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "retryable status, backing off"
                ),
                Err(err) => tracing::debug!(
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "transport error, backing off"
                ),
            }
            drop(outcome);

            scope
                .guard(async {
                    self.sleeper.sleep(delay).await;
                    Ok(())
                })
                .await?;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::RetryPolicy;

    fn policy(wait_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            wait_time: Duration::from_millis(wait_ms),
            max_wait_time: Duration::from_millis(max_ms),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = policy(100, 2_000);
        let delays: Vec<u64> = (0..6).map(|n| policy.backoff(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_600, 2_000]);
    }

    #[test]
    fn backoff_saturates_on_huge_attempt_index() {
        let policy = policy(100, 2_000);
        assert_eq!(policy.backoff(40), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(2_000));
    }

    #[test]
    fn backoff_is_reproducible() {
        let policy = policy(30, 1_000);
        assert_eq!(policy.backoff(3), policy.backoff(3));
        assert_eq!(policy.backoff(3), Duration::from_millis(240));
    }

    #[test]
    fn status_set_is_matched_exactly() {
        let policy = RetryPolicy {
            retryable_status_codes: [503].into_iter().collect(),
            ..RetryPolicy::default()
        };
        assert!(policy.is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!policy.is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!policy.is_retryable_status(StatusCode::OK));
    }

    #[test]
    fn success_statuses_are_never_retried() {
        let policy = RetryPolicy {
            retryable_status_codes: [200, 429].into_iter().collect(),
            ..RetryPolicy::default()
        };
        assert!(!policy.is_retryable_status(StatusCode::OK));
        assert!(policy.is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
    }
}
