//! Retry with exponential backoff for transient store failures

use crate::core::health::HealthReporter;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that may succeed when retried
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Backoff policy: `delay = base * 2^(attempt-1)`, capped at `max_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no retry
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(5))
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out
///
/// Health is reported degraded while retrying and restored on success.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &'static str,
    health: &HealthReporter,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation = label, attempts = attempt + 1, "Store write recovered");
                    health.recovered();
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = label,
                    retry_count = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient store failure, retrying"
                );
                health.degraded(attempt, e.to_string());
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::error!(operation = label, retry_count = attempt, error = %e, "Store write failed after retries");
                    health.degraded(attempt + 1, e.to_string());
                }
                return Err(e);
            }
        }
    }
}
