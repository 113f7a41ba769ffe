//! Bounded linear backoff for redelivery.

use std::time::Duration;

use courier_common::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }

    /// Retry count for the next redelivery after a failed attempt made with
    /// `retries` redeliveries already spent, or `None` once the cap is hit.
    pub fn next_retry(&self, retries: u32) -> Option<u32> {
        (retries < self.max_retries).then(|| retries + 1)
    }

    /// Delay before redelivery number `retries` (1-based): `base * retries`.
    pub fn delay_for(&self, retries: u32) -> Duration {
        self.base_delay * retries
    }

    /// Sum of every redelivery delay; the longest a notification can stay
    /// pending, ignoring sender latency.
    pub fn worst_case_total(&self) -> Duration {
        (1..=self.max_retries).map(|n| self.delay_for(n)).sum()
    }
}
