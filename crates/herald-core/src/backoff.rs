//! Reconnection backoff policy

use std::time::Duration;

/// Exponential backoff policy for stream reconnection
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Failed attempts tolerated before giving up
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay for the given 0-indexed attempt: `base * 2^attempt`, capped at
    /// `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor)).min(self.max_delay)
    }

    /// Whether another automatic retry is allowed after `retry_count` failures.
    pub fn retries_remaining(&self, retry_count: u32) -> bool {
        retry_count < self.max_attempts
    }
}
