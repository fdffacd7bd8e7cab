//! Retry logic with exponential backoff for provider calls.
//!
//! Retries only results classified as errors (transport failures, timeouts,
//! unusable bodies). Declines are returned immediately: resubmitting a wrong
//! OTP is never correct.

use super::response::ProviderResult;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry attempts after the initial call.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `f` until it yields a non-error result or the policy is exhausted.
pub async fn with_backoff<F, Fut>(policy: RetryPolicy, mut f: F) -> ProviderResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult>,
{
    for attempt in 0..policy.max_retries {
        match f().await {
            ProviderResult::Error { reason } => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "provider call failed, retrying in {delay:?}: {reason}"
                );
                tokio::time::sleep(delay).await;
            }
            settled => return settled,
        }
    }
    // Final attempt, no more retries.
    f().await
}
