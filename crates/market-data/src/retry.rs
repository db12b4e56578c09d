use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::MarketDataError;

/// Escalating backoff: `base`, `2×base`, `4×base`, ... plus random jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base_delay.saturating_mul(factor) + Duration::from_millis(jitter)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. Returns the last error in the latter cases.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, MarketDataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketDataError>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_err = MarketDataError::Empty(what.to_string());

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            tracing::debug!("Retrying {} in {:.2}s", what, delay.as_secs_f64());
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                tracing::warn!("{} failed (attempt {}/{}): {}", what, attempt + 1, attempts, e);
                last_err = e;
            }
            Err(e) => {
                tracing::warn!("{} failed permanently: {}", what, e);
                return Err(e);
            }
        }
    }

    Err(last_err)
}
