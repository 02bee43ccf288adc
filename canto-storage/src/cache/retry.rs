//! Bounded exponential backoff for idempotent calls.
//!
//! Only `exists`, `read_all`, `delete` and upstream fetches go through this.
//! Increments are never retried: replaying a `HINCRBY` whose reply was lost
//! would double-count.

use std::future::Future;
use std::time::Duration;

use canto_core::CantoResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt number `attempt` (1-based, so attempt 2 is the
    /// first retry).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> CantoResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CantoResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    attempt += 1;
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
