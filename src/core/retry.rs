/// Retry policy for dump tool invocations

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// `delay * n` before the n-th retry
    Linear,
    /// `delay * 2^(n-1)` before the n-th retry
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations allowed for one logical operation, at least 1
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// One retry after a fixed delay
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff,
        }
    }

    /// Single attempt, never retried
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Backoff::Fixed)
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based),
    /// `None` once the attempt budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts.max(1) {
            return None;
        }
        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.delay.saturating_mul(factor)
            }
        };
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_exactly_one_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_after(2), None);
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_backoff_growth() {
        let linear = RetryPolicy::new(4, Duration::from_secs(2), Backoff::Linear);
        assert_eq!(linear.delay_after(1), Some(Duration::from_secs(2)));
        assert_eq!(linear.delay_after(3), Some(Duration::from_secs(6)));
        assert_eq!(linear.delay_after(4), None);

        let exp = RetryPolicy::new(5, Duration::from_secs(1), Backoff::Exponential);
        let delays: Vec<_> = (1..5).filter_map(|n| exp.delay_after(n)).collect();
        assert_eq!(
            delays,
            vec![1, 2, 4, 8].into_iter().map(Duration::from_secs).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1), Backoff::Fixed);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(1), None);
        assert_eq!(RetryPolicy::no_retry().delay_after(1), None);
    }

    #[test]
    fn test_backoff_names() {
        let b: Backoff = serde_json::from_str("\"exponential\"").unwrap();
        assert_eq!(b, Backoff::Exponential);
    }
}
