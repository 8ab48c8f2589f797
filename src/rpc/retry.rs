//! Exponential backoff policy
//!
//! Built on `backoff::ExponentialBackoff` with jitter disabled, so the delay
//! sequence is fixed: base, 2x base, 4x base ... capped at the max delay.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Total attempts allowed: the first try plus every retry
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Fresh delay sequence for one operation
    pub fn schedule(&self) -> RetrySchedule {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build();

        RetrySchedule {
            inner,
            max_delay: self.max_delay,
        }
    }
}

/// Delay sequence handed out one retry at a time
pub struct RetrySchedule {
    inner: ExponentialBackoff,
    max_delay: Duration,
}

impl std::fmt::Debug for RetrySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrySchedule")
            .field("current_interval", &self.inner.current_interval)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl RetrySchedule {
    pub fn next_delay(&mut self) -> Duration {
        self.inner
            .next_backoff()
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 6);

        let mut schedule = policy.schedule();
        let delays: Vec<u128> = (0..7).map(|_| schedule.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 10000, 10000]);
    }

    #[test]
    fn test_schedules_are_independent() {
        let policy = RetryPolicy::default();
        let mut first = policy.schedule();
        first.next_delay();
        first.next_delay();

        let mut second = policy.schedule();
        assert_eq!(second.next_delay(), Duration::from_millis(500));
    }
}
