//! Endpoint health state

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Health of a single endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unreachable,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Failure counts at which an endpoint changes state
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub degraded_after: u32,
    pub unreachable_after: u32,
    /// Unreachable endpoints may be probed again once this has passed since their last failure
    pub probe_cooldown: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_after: 3,
            unreachable_after: 5,
            probe_cooldown: Duration::from_secs(30),
        }
    }
}

/// An endpoint and its health, owned by the connection manager
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    /// Lower rank is preferred; the configured primary is rank 0
    pub rank: usize,
    pub health: HealthState,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, rank: usize) -> Self {
        Self {
            url: url.into(),
            rank,
            health: HealthState::Healthy,
            consecutive_failures: 0,
            last_failure: None,
        }
    }

    pub(crate) fn record_success(&mut self) {
        if self.health != HealthState::Healthy {
            info!("Endpoint {} recovered ({} -> healthy)", self.url, self.health);
        }
        self.consecutive_failures = 0;
        self.health = HealthState::Healthy;
    }

    pub(crate) fn record_failure(&mut self, now: Instant, thresholds: &HealthThresholds) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);

        let next = if self.consecutive_failures >= thresholds.unreachable_after {
            HealthState::Unreachable
        } else if self.consecutive_failures >= thresholds.degraded_after {
            HealthState::Degraded
        } else {
            self.health
        };

        if next != self.health {
            warn!(
                "Endpoint {} marked {} after {} consecutive failures",
                self.url, next, self.consecutive_failures
            );
            self.health = next;
        }
    }

    /// Whether the endpoint may serve in degraded mode
    pub(crate) fn is_fallback_eligible(&self, now: Instant, cooldown: Duration) -> bool {
        match self.health {
            HealthState::Healthy | HealthState::Degraded => true,
            HealthState::Unreachable => self
                .last_failure
                .map(|at| now.saturating_duration_since(at) >= cooldown)
                .unwrap_or(true),
        }
    }
}

/// Lightweight reference to an acquired endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHandle {
    pub(crate) index: usize,
    pub url: String,
    pub rank: usize,
}

impl fmt::Display for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
