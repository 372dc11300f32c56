//! Retry logic for the inference call, modeled as a bounded-attempts policy
//! object instead of inline control flow so it is testable against a fake
//! completion capability.

use crate::error::{ErrorClass, InferenceError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Whether another attempt should follow `attempt` (1-based) failing
    /// with `error`. Only transient failures retry; malformed and fatal
    /// errors surface immediately.
    pub fn should_retry(&self, attempt: u32, error: &InferenceError) -> bool {
        attempt < self.max_attempts && error.class() == ErrorClass::Transient
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64;
        let exponential = base * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let mut delay = Duration::from_millis(exponential as u64).min(self.max_delay);

        if self.jitter {
            // Up to 25% extra to avoid synchronized retries.
            let jitter = (delay.as_millis() as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay += Duration::from_millis(jitter);
        }

        delay
    }
}

/// Drive an async operation under the policy. Each retry re-issues the
/// identical request; the last error is returned once attempts run out.
pub async fn retry_with_policy<T, F, Fut>(
    operation: F,
    policy: &RetryConfig,
    operation_name: &str,
) -> Result<T, InferenceError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, InferenceError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if policy.should_retry(attempt, &error) {
                    let delay = policy.delay(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    return Err(error);
                }
            }
        }
    }
}
