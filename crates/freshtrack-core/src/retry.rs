//! Retry policy for the hardware link.
//!
//! The acquisition state machine consumes a [`RetryPolicy`] instead of juggling
//! counters and timers itself, so its transition table can be tested without any
//! notion of time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay between open attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffSchedule {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt, capped at `max_backoff`.
    Exponential,
}

/// Defines a policy for retrying the hardware channel open.
///
/// # Example
///
/// ```rust
/// use freshtrack_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
/// assert!(!policy.is_exhausted(2));
/// assert!(policy.is_exhausted(3));
/// assert_eq!(policy.delay_for(1), Duration::from_secs(5));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failed opens tolerated before giving up on hardware.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub backoff_delay: Duration,

    /// Schedule applied to `backoff_delay` on later retries.
    pub schedule: BackoffSchedule,

    /// Upper bound for exponential schedules.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Constant delay between attempts.
    pub fn fixed(max_attempts: u32, backoff_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff_delay,
            schedule: BackoffSchedule::Fixed,
            max_backoff: backoff_delay,
        }
    }

    /// Whether `failed_attempts` consecutive failures exhaust the budget.
    pub fn is_exhausted(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_attempts
    }

    /// Delay to wait after the `failed_attempts`-th consecutive failure (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        match self.schedule {
            BackoffSchedule::Fixed => self.backoff_delay,
            BackoffSchedule::Exponential => {
                let exponent = failed_attempts.saturating_sub(1).min(16);
                self.backoff_delay
                    .saturating_mul(1u32 << exponent)
                    .min(self.max_backoff)
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, five seconds apart.
    fn default() -> Self {
        Self::fixed(3, crate::limits::RETRY_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_delay, Duration::from_secs(5));
        assert_eq!(policy.schedule, BackoffSchedule::Fixed);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff_delay: Duration::from_millis(100),
            schedule: BackoffSchedule::Exponential,
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }
}
