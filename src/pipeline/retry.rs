//! Bounded retry with exponential backoff around a single engine call

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::engine::{GenerationRequest, GenerationResult, ImageGenerator};
use crate::error::GenerationError;

/// Called before each backoff sleep with `(next_attempt, delay)`
pub type RetryObserver<'a> = &'a (dyn Fn(u32, Duration) + Send + Sync);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: settings.base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed_attempt`-th (1-based) attempt: `base * 2^failed_attempt`
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << failed_attempt.min(20))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `operation` until it succeeds, fails terminally, or the attempt
/// budget is spent. The last error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    observer: Option<RetryObserver<'_>>,
    mut operation: F,
) -> Result<T, GenerationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                debug!(attempt, kind = e.kind(), "Terminal error, not retrying");
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(attempts = attempt, error = %e, "Retry budget exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable error, backing off"
                );
                if let Some(observer) = observer {
                    observer(attempt + 1, delay);
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// One retry-wrapped generation call
pub async fn generate_with_retry(
    generator: &dyn ImageGenerator,
    request: &GenerationRequest,
    policy: &RetryPolicy,
    observer: Option<RetryObserver<'_>>,
) -> Result<GenerationResult, GenerationError> {
    retry_with_backoff(policy, observer, |_| generator.generate(request)).await
}
