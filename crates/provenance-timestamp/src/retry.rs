//! Retry policy for authority requests.

use std::time::Duration;

/// Bounded retries with exponential backoff.
///
/// Attempt `n` (zero-based) that fails waits `initial_backoff * 2^n`,
/// capped at `max_backoff`, before attempt `n + 1`. Every attempt is
/// abandoned after `request_timeout`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least one is always made.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
