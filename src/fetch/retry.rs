//! Bounded retry with a fixed backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::FetchError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one fails.
    pub max_retries: u32,
    /// Delay before every re-attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Run `attempt`, retrying failures that [`FetchError::is_retryable`] accepts.
    pub async fn run<V, F, Fut>(&self, attempt: F) -> Result<V, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, FetchError>>,
    {
        self.run_with(attempt, FetchError::is_retryable).await
    }

    /// Run `attempt` up to `max_retries + 1` times.
    ///
    /// Failures rejected by `is_retryable` are returned immediately. Once the
    /// retries are exhausted the last error is returned.
    pub async fn run_with<V, E, F, Fut, P>(&self, mut attempt: F, is_retryable: P) -> Result<V, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: Fn(&E) -> bool,
    {
        let mut retries = 0u32;
        loop {
            match attempt().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(retries, "attempt succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if retries < self.max_retries && is_retryable(&err) => {
                    retries += 1;
                    warn!(
                        attempt = retries,
                        max_retries = self.max_retries,
                        backoff_ms = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
