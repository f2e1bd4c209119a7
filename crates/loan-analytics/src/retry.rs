//! Bounded exponential backoff for transient warehouse failures

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Retry bounds for one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; never below 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = if attempts == 0 { 1 } else { attempts };
        self
    }

    #[must_use]
    pub const fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Delay before attempt `attempt + 1`, given `attempt` failures so far
    ///
    /// Doubles from `base_delay` and saturates at `max_delay`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

/// Last error of a failed retry loop with the number of attempts made
#[derive(Debug)]
pub struct RetryFailure {
    pub error: Error,
    pub attempts: u32,
}

/// Run `operation`, retrying while it fails with a transient error
///
/// Non-transient errors are returned immediately.
pub async fn retry_transient<T, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_transient() => {
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                });
            }
            Err(error) => {
                if attempt >= max_attempts {
                    error!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %error,
                        "Retries exhausted"
                    );
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }
                let delay = policy.delay_after(attempt);
                #[cfg(feature = "metrics")]
                crate::observability::metrics::record_retry(operation_name);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
