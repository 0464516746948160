//! Bounded retry with linear backoff.
//!
//! Only transient errors are retried. The delay before retry `n` (1-based) is
//! `backoff * n`, so the default policy waits 500ms then 1s.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ApiError;

/// Retry policy for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Base delay; multiplied by the retry number.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before the given retry (1 for the first retry).
    #[must_use]
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(retry)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or the attempts are used up.
    ///
    /// # Errors
    ///
    /// Returns the last error seen.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay_before(attempt);
                    warn!(attempt, ?delay, error = %e, "Transient cart API error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
