use std::future::Future;
use std::time::Duration;

use rand::{RngExt, rng};

use crate::PlannerError;

/// Backoff for store calls: exponential with full jitter, retrying only
/// errors a later attempt can fix.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.base_delay * (1u32 << attempt.min(16));
        let cap_ms = (cap.as_millis() as u64).max(1);
        Duration::from_millis(rng().random_range(0..cap_ms))
    }

    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, PlannerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlannerError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if !e.is_transient() || attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying store call");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
