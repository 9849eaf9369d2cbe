//! Retry policy for the structured endpoint.
//!
//! A 429 that carries `Retry-After` waits exactly that long (capped). Other
//! transient failures back off exponentially from the configured base with
//! ±25% jitter. Everything else is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::error::ScraperError;

const MAX_DELAY: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(config.backoff_base_secs),
            max_delay: MAX_DELAY,
        }
    }

    /// Wait before retry number `attempt + 1` after `err`.
    pub(crate) fn delay_for(&self, attempt: u32, err: &ScraperError) -> Duration {
        if let ScraperError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } = err
        {
            return Duration::from_secs(*secs).min(self.max_delay);
        }

        let computed = self
            .backoff_base
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        computed.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
    }

    /// Runs `operation`, retrying transient failures up to `max_retries` times.
    /// The last error is returned once attempts run out.
    pub(crate) async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ScraperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScraperError>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retriable() || attempt >= self.max_retries {
                return Err(err);
            }

            let delay = self.delay_for(attempt, &err);
            tracing::warn!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "endpoint request failed, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
