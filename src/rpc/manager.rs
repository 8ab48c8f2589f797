//! Connection manager - endpoint selection, health reporting, failover
//!
//! Selection is deterministic given the health table:
//! 1. the lowest-ranked healthy endpoint;
//! 2. otherwise the least-recently-failed endpoint still usable in degraded
//!    mode (degraded, or unreachable past its probe cooldown);
//! 3. otherwise wait for one to become usable, up to the acquire timeout.
//!
//! Retries skip step 3: [`ConnectionManager::acquire_for_retry`] ignores the
//! probe cooldown and never waits.
//!
//! The health table sits behind a `tokio::sync::RwLock` because concurrent
//! bundle submissions report outcomes for the same endpoints.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::endpoint::{Endpoint, EndpointHandle, HealthState, HealthThresholds};
use super::retry::RetryPolicy;
use crate::clock::Clock;
use crate::config::{Config, RpcConfig};
use crate::error::{Error, Result};

/// Tunables for endpoint acquisition
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub thresholds: HealthThresholds,
    pub acquire_timeout: Duration,
    pub acquire_poll_interval: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&RpcConfig::default())
    }
}

impl ConnectionSettings {
    pub fn from_config(config: &RpcConfig) -> Self {
        Self {
            thresholds: HealthThresholds {
                degraded_after: config.degraded_after,
                unreachable_after: config.unreachable_after,
                probe_cooldown: Duration::from_millis(config.probe_cooldown_ms),
            },
            acquire_timeout: Duration::from_millis(config.acquire_timeout_ms),
            acquire_poll_interval: Duration::from_millis(config.acquire_poll_interval_ms.max(1)),
        }
    }
}

/// Owns a ranked set of endpoints and their health
pub struct ConnectionManager {
    name: &'static str,
    endpoints: RwLock<Vec<Endpoint>>,
    settings: ConnectionSettings,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl ConnectionManager {
    /// Build a manager over `urls`, ranked in the order given
    pub fn new(
        name: &'static str,
        urls: Vec<String>,
        settings: ConnectionSettings,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if urls.is_empty() {
            return Err(Error::Config(format!("{} manager needs at least one endpoint", name)));
        }

        let endpoints: Vec<Endpoint> = urls
            .into_iter()
            .enumerate()
            .map(|(rank, url)| Endpoint::new(url, rank))
            .collect();

        info!("{} connection manager initialized with {} endpoints", name, endpoints.len());
        for endpoint in &endpoints {
            debug!("  [{}] {}", endpoint.rank, endpoint.url);
        }

        Ok(Self {
            name,
            endpoints: RwLock::new(endpoints),
            settings,
            policy,
            clock,
        })
    }

    /// Solana RPC endpoints: the primary, then every backup
    pub fn for_rpc(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(
            "rpc",
            config.rpc.endpoint_urls(),
            ConnectionSettings::from_config(&config.rpc),
            RetryPolicy::from_config(&config.retry),
            clock,
        )
    }

    /// Jito block engines, one per configured region
    pub fn for_relay(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(
            "relay",
            config.jito.block_engine_urls.clone(),
            ConnectionSettings::from_config(&config.rpc),
            RetryPolicy::from_config(&config.retry),
            clock,
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Select an endpoint, waiting up to the acquire timeout if none is usable
    pub async fn acquire_endpoint(&self) -> Result<EndpointHandle> {
        let started = self.clock.now();

        loop {
            {
                let endpoints = self.endpoints.read().await;
                let now = self.clock.now();
                let cooldown = self.settings.thresholds.probe_cooldown;
                if let Some(index) = select(&endpoints, now, cooldown, false) {
                    return Ok(self.handle(&endpoints, index));
                }
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if waited >= self.settings.acquire_timeout {
                warn!("{}: every endpoint exhausted after {:?}", self.name, waited);
                return Err(Error::NoEndpointAvailable {
                    waited_ms: waited.as_millis() as u64,
                });
            }

            let remaining = self.settings.acquire_timeout - waited;
            self.clock
                .sleep(self.settings.acquire_poll_interval.min(remaining))
                .await;
        }
    }

    /// Select an endpoint for a retry, without waiting
    ///
    /// Unreachable endpoints still in their probe cooldown are eligible here,
    /// so a caller inside its retry budget always gets its next attempt.
    pub async fn acquire_for_retry(&self) -> EndpointHandle {
        let endpoints = self.endpoints.read().await;
        let now = self.clock.now();
        let cooldown = self.settings.thresholds.probe_cooldown;
        // Never empty: `new` rejects an empty url list
        let index = select(&endpoints, now, cooldown, true).unwrap_or(0);
        self.handle(&endpoints, index)
    }

    fn handle(&self, endpoints: &[Endpoint], index: usize) -> EndpointHandle {
        let endpoint = &endpoints[index];
        if endpoint.health != HealthState::Healthy {
            debug!(
                "{}: no healthy endpoint, using {} ({})",
                self.name, endpoint.url, endpoint.health
            );
        }
        EndpointHandle {
            index,
            url: endpoint.url.clone(),
            rank: endpoint.rank,
        }
    }

    /// Record the result of a call made against `endpoint`
    pub async fn report_outcome(&self, endpoint: &EndpointHandle, success: bool) {
        let now = self.clock.now();
        let mut endpoints = self.endpoints.write().await;
        let Some(entry) = endpoints.get_mut(endpoint.index) else {
            return;
        };

        if success {
            entry.record_success();
        } else {
            entry.record_failure(now, &self.settings.thresholds);
        }
    }

    /// Run `op` against acquired endpoints, retrying transient failures
    ///
    /// Each failure is reported before the next acquisition, so a failing
    /// endpoint drops out of rotation as soon as it crosses a threshold.
    pub async fn call<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T>
    where
        F: FnMut(EndpointHandle) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut schedule = self.policy.schedule();
        let mut attempt: u32 = 0;

        loop {
            let endpoint = if attempt == 0 {
                self.acquire_endpoint().await?
            } else {
                self.acquire_for_retry().await
            };
            match f(endpoint.clone()).await {
                Ok(value) => {
                    self.report_outcome(&endpoint, true).await;
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    self.report_outcome(&endpoint, false).await;
                    if attempt >= self.policy.max_retries {
                        warn!("{} failed on {} after {} attempts: {}", op, endpoint, attempt + 1, e);
                        return Err(e);
                    }
                    let delay = schedule.next_delay();
                    warn!(
                        "{} failed on {} (attempt {}/{}): {}. Retrying in {:?}",
                        op,
                        endpoint,
                        attempt + 1,
                        self.policy.max_attempts(),
                        e,
                        delay
                    );
                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Copy of the current health table
    pub async fn snapshot(&self) -> Vec<Endpoint> {
        self.endpoints.read().await.clone()
    }

    /// Handles for every endpoint, in rank order
    pub async fn handles(&self) -> Vec<EndpointHandle> {
        self.endpoints
            .read()
            .await
            .iter()
            .enumerate()
            .map(|(index, e)| EndpointHandle {
                index,
                url: e.url.clone(),
                rank: e.rank,
            })
            .collect()
    }
}

fn select(
    endpoints: &[Endpoint],
    now: std::time::Instant,
    cooldown: Duration,
    for_retry: bool,
) -> Option<usize> {
    let healthy = endpoints
        .iter()
        .enumerate()
        .filter(|(_, e)| e.health == HealthState::Healthy)
        .min_by_key(|(index, e)| (e.rank, *index))
        .map(|(index, _)| index);

    if healthy.is_some() {
        return healthy;
    }

    endpoints
        .iter()
        .enumerate()
        .filter(|(_, e)| for_retry || e.is_fallback_eligible(now, cooldown))
        .min_by_key(|(index, e)| (e.last_failure, e.rank, *index))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn manager(urls: &[&str], clock: Arc<ManualClock>) -> ConnectionManager {
        ConnectionManager::new(
            "test",
            urls.iter().map(|u| u.to_string()).collect(),
            ConnectionSettings::default(),
            RetryPolicy::default(),
            clock,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_prefers_primary() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a", "https://b"], clock);

        let endpoint = manager.acquire_endpoint().await.unwrap();
        assert_eq!(endpoint.url, "https://a");
    }

    #[tokio::test]
    async fn test_fails_over_to_backup() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a", "https://b"], clock);

        let mut acquired = Vec::new();
        for _ in 0..6 {
            let endpoint = manager.acquire_endpoint().await.unwrap();
            acquired.push(endpoint.url.clone());
            if endpoint.url == "https://a" {
                manager.report_outcome(&endpoint, false).await;
            } else {
                manager.report_outcome(&endpoint, true).await;
            }
        }

        // Degraded after the third failure, so the fourth acquisition moves to B
        assert_eq!(&acquired[..3], &["https://a", "https://a", "https://a"]);
        assert!(acquired[3..].iter().all(|u| u == "https://b"));
    }

    #[tokio::test]
    async fn test_primary_restored_on_success() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a", "https://b"], clock);
        let primary = manager.acquire_endpoint().await.unwrap();

        for _ in 0..3 {
            manager.report_outcome(&primary, false).await;
        }
        assert_eq!(manager.acquire_endpoint().await.unwrap().url, "https://b");

        manager.report_outcome(&primary, true).await;
        assert_eq!(manager.acquire_endpoint().await.unwrap().url, "https://a");
    }

    #[tokio::test]
    async fn test_degraded_mode_uses_least_recently_failed() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a", "https://b"], clock.clone());
        let handles = manager.handles().await;

        // B fails first, A fails later: B is the least recently failed
        for _ in 0..3 {
            manager.report_outcome(&handles[1], false).await;
        }
        clock.advance(Duration::from_secs(1));
        for _ in 0..3 {
            manager.report_outcome(&handles[0], false).await;
        }

        let endpoint = manager.acquire_endpoint().await.unwrap();
        assert_eq!(endpoint.url, "https://b");
    }

    #[tokio::test]
    async fn test_no_endpoint_available_after_timeout() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a"], clock.clone());
        let endpoint = manager.acquire_endpoint().await.unwrap();

        for _ in 0..5 {
            manager.report_outcome(&endpoint, false).await;
        }

        let err = manager.acquire_endpoint().await.unwrap_err();
        assert!(matches!(err, Error::NoEndpointAvailable { .. }));
        assert!(clock.elapsed() >= ConnectionSettings::default().acquire_timeout);
    }

    #[tokio::test]
    async fn test_retry_ignores_cooldown() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a", "https://b"], clock.clone());
        let handles = manager.handles().await;

        for _ in 0..5 {
            manager.report_outcome(&handles[0], false).await;
        }
        clock.advance(Duration::from_secs(1));
        for _ in 0..5 {
            manager.report_outcome(&handles[1], false).await;
        }

        let endpoint = manager.acquire_for_retry().await;
        assert_eq!(endpoint.url, "https://a");
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_call_retries_single_unreachable_endpoint() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a"], clock.clone());
        let calls = AtomicU32::new(0);

        let result: Result<()> = manager
            .call("get_health", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Rpc("connection refused".into())) }
            })
            .await;

        assert!(matches!(result, Err(Error::Rpc(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_unreachable_probed_after_cooldown() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a"], clock.clone());
        let endpoint = manager.acquire_endpoint().await.unwrap();

        for _ in 0..5 {
            manager.report_outcome(&endpoint, false).await;
        }
        clock.advance(Duration::from_secs(30));

        assert_eq!(manager.acquire_endpoint().await.unwrap().url, "https://a");
    }

    #[tokio::test]
    async fn test_call_retries_then_succeeds() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a", "https://b"], clock.clone());
        let calls = AtomicU32::new(0);

        let url = manager
            .call("get_health", |endpoint| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(Error::Rpc("connection refused".into()))
                    } else {
                        Ok(endpoint.url)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(url, "https://b");
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000)
            ]
        );
    }

    #[tokio::test]
    async fn test_call_does_not_retry_permanent_errors() {
        let clock = Arc::new(ManualClock::new());
        let manager = manager(&["https://a"], clock);
        let calls = AtomicU32::new(0);

        let result: Result<()> = manager
            .call("get_health", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::InvalidInstruction("bad".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
