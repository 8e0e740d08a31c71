//! Bounded exponential backoff around a single exchange.
//!
//! Only [`TransportError::Connect`] is retried. A request that may have
//! reached the authority is never resent, since a second delivery could
//! fiscalize the same invoice twice.

use std::future::Future;
use std::time::Duration;

use crate::core::TransportError;

/// How often and how patiently a failed connection is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry attempts after the initial request.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 retries, 200ms → 400ms → 800ms.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `f` up to `policy.max_retries + 1` times while it fails with a
/// retryable error.
pub(crate) async fn retry_send<F, Fut, T>(policy: RetryPolicy, f: F) -> Result<T, TransportError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    "fiscalization request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        attempts = attempt + 1,
                        "fiscalization request failed, retries exhausted: {e}"
                    );
                }
                return Err(e);
            }
        }
    }
}
