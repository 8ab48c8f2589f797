//! Bundle submission state machine
//!
//! `Pending -> { Accepted, Rejected, TimedOut, Cancelled }`
//!
//! Transport failures are retried with backoff, up to the retry ceiling,
//! against whichever relay endpoint the connection manager hands out. A relay
//! verdict (rejection, or a failed bundle) is terminal: the bundle is bound to
//! one blockhash and must be re-assembled by the caller. The same signed
//! bundle is resent on every attempt; it is never re-signed or mutated.
//!
//! Cancellation is checked before every attempt, while waiting for an
//! endpoint, during backoff and while polling. A bundle already sent may
//! still land after cancellation.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bundle::Bundle;
use super::jito::{BundleStatus, RelayResponse, RelayTransport};
use crate::clock::Clock;
use crate::config::JitoConfig;
use crate::error::{Error, Result};
use crate::rpc::{ConnectionManager, EndpointHandle};

/// Outcome of a single send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Transport failed or the outcome was left unresolved
    Pending,
    Accepted,
    Rejected,
    TimedOut,
}

/// One recorded send attempt
#[derive(Debug, Clone)]
pub struct SubmissionAttempt {
    pub attempt: u32,
    pub endpoint: String,
    pub outcome: AttemptOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Why a submission ended in rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The relay refused the bundle or reported it failed
    Relay(String),
    RetriesExhausted,
    NoEndpointAvailable,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Relay(reason) => write!(f, "relay rejected: {}", reason),
            RejectReason::RetriesExhausted => write!(f, "retries exhausted"),
            RejectReason::NoEndpointAvailable => write!(f, "no relay endpoint available"),
        }
    }
}

/// Terminal state of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted {
        relay_bundle_id: String,
        slot: Option<u64>,
    },
    Rejected(RejectReason),
    TimedOut,
    Cancelled,
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Accepted { slot: Some(slot), .. } => write!(f, "landed in slot {}", slot),
            SubmissionOutcome::Accepted { slot: None, .. } => write!(f, "landed"),
            SubmissionOutcome::Rejected(reason) => write!(f, "rejected ({})", reason),
            SubmissionOutcome::TimedOut => write!(f, "timed out awaiting confirmation"),
            SubmissionOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Everything the caller gets back from [`BundleSubmitter::submit`]
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub submission_id: Uuid,
    pub bundle_id: String,
    pub outcome: SubmissionOutcome,
    pub attempts: Vec<SubmissionAttempt>,
}

impl SubmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, SubmissionOutcome::Accepted { .. })
    }

    /// Map the terminal outcome onto the error taxonomy
    pub fn into_result(self, confirmation_timeout: Duration) -> Result<String> {
        match self.outcome {
            SubmissionOutcome::Accepted { relay_bundle_id, .. } => Ok(relay_bundle_id),
            SubmissionOutcome::Rejected(RejectReason::Relay(reason)) => {
                Err(Error::RelayRejected { reason })
            }
            SubmissionOutcome::Rejected(RejectReason::RetriesExhausted) => Err(Error::RetriesExhausted {
                attempts: self.attempts.len() as u32,
            }),
            SubmissionOutcome::Rejected(RejectReason::NoEndpointAvailable) => {
                Err(Error::NoEndpointAvailable { waited_ms: 0 })
            }
            SubmissionOutcome::TimedOut => Err(Error::ConfirmationTimeout(
                confirmation_timeout.as_millis() as u64,
            )),
            SubmissionOutcome::Cancelled => Err(Error::Cancelled),
        }
    }
}

/// Confirmation polling tunables
#[derive(Debug, Clone, Copy)]
pub struct SubmitterSettings {
    pub confirmation_timeout: Duration,
    pub status_poll_interval: Duration,
}

impl SubmitterSettings {
    pub fn from_config(config: &JitoConfig) -> Self {
        Self {
            confirmation_timeout: Duration::from_millis(config.confirmation_timeout_ms),
            status_poll_interval: Duration::from_millis(config.status_poll_interval_ms),
        }
    }
}

impl Default for SubmitterSettings {
    fn default() -> Self {
        Self::from_config(&JitoConfig::default())
    }
}

pub struct BundleSubmitter {
    connections: Arc<ConnectionManager>,
    relay: Arc<dyn RelayTransport>,
    clock: Arc<dyn Clock>,
    settings: SubmitterSettings,
}

impl BundleSubmitter {
    /// `connections` must manage relay (block engine) endpoints
    pub fn new(
        connections: Arc<ConnectionManager>,
        relay: Arc<dyn RelayTransport>,
        settings: SubmitterSettings,
    ) -> Self {
        let clock = connections.clock();
        Self {
            connections,
            relay,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> SubmitterSettings {
        self.settings
    }

    /// Submit `bundle` and drive it to a terminal outcome
    pub async fn submit(&self, bundle: &Bundle, cancel: &CancellationToken) -> SubmissionResult {
        let submission_id = Uuid::new_v4();
        let mut attempts = Vec::new();
        let outcome = self.run(bundle, cancel, &mut attempts).await;

        match &outcome {
            SubmissionOutcome::Accepted { .. } => info!(
                "Bundle {} {} after {} attempt(s)",
                bundle.id(),
                outcome,
                attempts.len()
            ),
            _ => warn!(
                "Bundle {} {} after {} attempt(s)",
                bundle.id(),
                outcome,
                attempts.len()
            ),
        }

        SubmissionResult {
            submission_id,
            bundle_id: bundle.id().to_string(),
            outcome,
            attempts,
        }
    }

    async fn run(
        &self,
        bundle: &Bundle,
        cancel: &CancellationToken,
        attempts: &mut Vec<SubmissionAttempt>,
    ) -> SubmissionOutcome {
        let policy = *self.connections.policy();
        let mut schedule = policy.schedule();

        for attempt in 1..=policy.max_attempts() {
            if cancel.is_cancelled() {
                return SubmissionOutcome::Cancelled;
            }

            let endpoint = if attempt == 1 {
                match self.acquire_or_cancel(cancel).await {
                    Some(Ok(endpoint)) => endpoint,
                    Some(Err(e)) => {
                        warn!("Cannot submit bundle {}: {}", bundle.id(), e);
                        return SubmissionOutcome::Rejected(RejectReason::NoEndpointAvailable);
                    }
                    None => return SubmissionOutcome::Cancelled,
                }
            } else {
                self.connections.acquire_for_retry().await
            };

            match self.relay.send_bundle(&endpoint.url, bundle).await {
                Ok(RelayResponse::Accepted { bundle_id }) => {
                    self.connections.report_outcome(&endpoint, true).await;
                    info!("Relay {} accepted bundle {} as {}", endpoint, bundle.id(), bundle_id);

                    let outcome = self.await_landing(&bundle_id, endpoint.clone(), cancel).await;
                    let recorded = match &outcome {
                        SubmissionOutcome::Accepted { .. } => AttemptOutcome::Accepted,
                        SubmissionOutcome::Rejected(_) => AttemptOutcome::Rejected,
                        SubmissionOutcome::TimedOut => AttemptOutcome::TimedOut,
                        SubmissionOutcome::Cancelled => AttemptOutcome::Pending,
                    };
                    attempts.push(record(attempt, &endpoint, recorded));
                    return outcome;
                }
                Ok(RelayResponse::Rejected { reason }) => {
                    // The relay answered, so the endpoint itself is fine
                    self.connections.report_outcome(&endpoint, true).await;
                    attempts.push(record(attempt, &endpoint, AttemptOutcome::Rejected));
                    return SubmissionOutcome::Rejected(RejectReason::Relay(reason));
                }
                Err(e) => {
                    self.connections.report_outcome(&endpoint, false).await;
                    attempts.push(record(attempt, &endpoint, AttemptOutcome::Pending));

                    if !e.is_retryable() {
                        return SubmissionOutcome::Rejected(RejectReason::Relay(e.to_string()));
                    }
                    if attempt == policy.max_attempts() {
                        warn!("Send to {} failed on final attempt {}: {}", endpoint, attempt, e);
                        break;
                    }

                    let delay = schedule.next_delay();
                    warn!(
                        "Send to {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        endpoint,
                        attempt,
                        policy.max_attempts(),
                        e,
                        delay
                    );
                    if self.sleep_or_cancel(delay, cancel).await {
                        return SubmissionOutcome::Cancelled;
                    }
                }
            }
        }

        SubmissionOutcome::Rejected(RejectReason::RetriesExhausted)
    }

    async fn await_landing(
        &self,
        relay_bundle_id: &str,
        mut endpoint: EndpointHandle,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        let deadline = self.clock.now() + self.settings.confirmation_timeout;
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                warn!("Stopped polling bundle {}; it may still land", relay_bundle_id);
                return SubmissionOutcome::Cancelled;
            }

            polls += 1;
            match self.relay.bundle_status(&endpoint.url, relay_bundle_id).await {
                Ok(BundleStatus::Landed { slot }) => {
                    self.connections.report_outcome(&endpoint, true).await;
                    return SubmissionOutcome::Accepted {
                        relay_bundle_id: relay_bundle_id.to_string(),
                        slot,
                    };
                }
                Ok(BundleStatus::Failed(reason)) => {
                    self.connections.report_outcome(&endpoint, true).await;
                    return SubmissionOutcome::Rejected(RejectReason::Relay(reason));
                }
                Ok(status) => {
                    self.connections.report_outcome(&endpoint, true).await;
                    debug!("Bundle {} poll {}: {:?}", relay_bundle_id, polls, status);
                }
                Err(e) => {
                    warn!("Status poll {} for {} failed on {}: {}", polls, relay_bundle_id, endpoint, e);
                    self.connections.report_outcome(&endpoint, false).await;
                    endpoint = self.connections.acquire_for_retry().await;
                }
            }

            let now = self.clock.now();
            if now >= deadline {
                return SubmissionOutcome::TimedOut;
            }
            let wait = self.settings.status_poll_interval.min(deadline - now);
            // A cancelled sleep is picked up at the top of the loop
            self.sleep_or_cancel(wait, cancel).await;
        }
    }

    /// `None` if cancelled while waiting for an endpoint
    async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Option<Result<EndpointHandle>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            acquired = self.connections.acquire_endpoint() => Some(acquired),
        }
    }

    /// Returns true if cancelled before the sleep finished
    async fn sleep_or_cancel(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = self.clock.sleep(duration) => false,
        }
    }
}

fn record(attempt: u32, endpoint: &EndpointHandle, outcome: AttemptOutcome) -> SubmissionAttempt {
    SubmissionAttempt {
        attempt,
        endpoint: endpoint.url.clone(),
        outcome,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::rpc::{ConnectionSettings, RetryPolicy};
    use crate::trading::assembler::BundleAssembler;
    use crate::trading::bundle::WalletInstructionSet;
    use crate::trading::fees::{FeeStrategy, FeeTier, Network};
    use crate::rpc::RpcTransport;
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use solana_sdk::system_instruction;
    use solana_sdk::signer::Signer;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted relay: send failures first, then statuses in order
    #[derive(Default)]
    struct FakeRelay {
        send_failures: u32,
        reject_with: Option<String>,
        statuses: Mutex<Vec<BundleStatus>>,
        sends: AtomicU32,
        polls: AtomicU32,
        seen: Mutex<HashMap<String, String>>,
    }

    impl FakeRelay {
        fn landing_after(polls: usize) -> Self {
            let mut statuses = vec![BundleStatus::Pending; polls - 1];
            statuses.push(BundleStatus::Landed { slot: Some(42) });
            Self {
                statuses: Mutex::new(statuses),
                ..Default::default()
            }
        }

        fn always_failing() -> Self {
            Self {
                send_failures: u32::MAX,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RelayTransport for FakeRelay {
        async fn send_bundle(&self, _endpoint: &str, bundle: &Bundle) -> Result<RelayResponse> {
            let n = self.sends.fetch_add(1, Ordering::SeqCst);
            if n < self.send_failures {
                return Err(Error::RelayTransport("503 Service Unavailable".into()));
            }
            if let Some(reason) = &self.reject_with {
                return Ok(RelayResponse::Rejected { reason: reason.clone() });
            }
            // Deduplicate by bundle id, like the block engine
            let mut seen = self.seen.lock().unwrap();
            let relay_id = seen
                .entry(bundle.id().to_string())
                .or_insert_with(|| format!("relay-{}", bundle.id()))
                .clone();
            Ok(RelayResponse::Accepted { bundle_id: relay_id })
        }

        async fn bundle_status(&self, _endpoint: &str, _bundle_id: &str) -> Result<BundleStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                return Ok(BundleStatus::Pending);
            }
            let status = statuses.remove(0);
            // Keep reporting a terminal status once reached
            if matches!(status, BundleStatus::Landed { .. } | BundleStatus::Failed(_)) {
                statuses.insert(0, status.clone());
            }
            Ok(status)
        }
    }

    struct FixedBlockhash(Hash);

    #[async_trait]
    impl RpcTransport for FixedBlockhash {
        async fn latest_blockhash(&self, _endpoint: &str) -> Result<Hash> {
            Ok(self.0)
        }

        async fn balance(&self, _endpoint: &str, _account: &Pubkey) -> Result<u64> {
            Ok(0)
        }

        async fn account_data(&self, _endpoint: &str, _account: &Pubkey) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn health(&self, _endpoint: &str) -> Result<()> {
            Ok(())
        }
    }

    fn relay_manager(clock: Arc<ManualClock>) -> Arc<ConnectionManager> {
        Arc::new(
            ConnectionManager::new(
                "relay",
                vec!["https://ny".into(), "https://amsterdam".into()],
                ConnectionSettings::default(),
                RetryPolicy::default(),
                clock,
            )
            .unwrap(),
        )
    }

    fn single_relay_manager(clock: Arc<ManualClock>) -> Arc<ConnectionManager> {
        Arc::new(
            ConnectionManager::new(
                "relay",
                vec!["https://frankfurt".into()],
                ConnectionSettings::default(),
                RetryPolicy::default(),
                clock,
            )
            .unwrap(),
        )
    }

    fn submitter(relay: Arc<FakeRelay>, clock: Arc<ManualClock>) -> BundleSubmitter {
        BundleSubmitter::new(relay_manager(clock), relay, SubmitterSettings::default())
    }

    fn test_bundle(wallets: &[Keypair], fee_payer: &Keypair) -> Bundle {
        let config = Config::default();
        let clock = Arc::new(ManualClock::new());
        let assembler = BundleAssembler::new(
            Arc::new(ConnectionManager::for_rpc(&config, clock).unwrap()),
            Arc::new(FixedBlockhash(Hash::new_unique())),
            Arc::new(FeeStrategy::from_config(&config).unwrap()),
            config.bundle.size_limit,
        );
        let sets = wallets
            .iter()
            .map(|w| {
                WalletInstructionSet::new(
                    w.pubkey().to_string(),
                    w,
                    vec![system_instruction::transfer(&w.pubkey(), &Pubkey::new_unique(), 1)],
                )
            })
            .collect();
        assembler
            .assemble_with_blockhash(sets, FeeTier::Medium, Network::Mainnet, fee_payer, Hash::new_unique())
            .unwrap()
    }

    fn keypairs(n: usize) -> Vec<Keypair> {
        (0..n).map(|_| Keypair::new()).collect()
    }

    #[tokio::test]
    async fn test_lands_after_two_polls() {
        let relay = Arc::new(FakeRelay::landing_after(2));
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay.clone(), clock);
        let wallets = keypairs(3);
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&wallets, &fee_payer);
        assert_eq!(bundle.len(), 4);

        let result = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert_eq!(
            result.outcome,
            SubmissionOutcome::Accepted {
                relay_bundle_id: format!("relay-{}", bundle.id()),
                slot: Some(42)
            }
        );
        assert_eq!(relay.sends.load(Ordering::SeqCst), 1);
        assert_eq!(relay.polls.load(Ordering::SeqCst), 2);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_retry_ceiling_respected() {
        let relay = Arc::new(FakeRelay::always_failing());
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay.clone(), clock.clone());
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(1), &fee_payer);

        let result = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert_eq!(result.outcome, SubmissionOutcome::Rejected(RejectReason::RetriesExhausted));
        assert_eq!(relay.sends.load(Ordering::SeqCst), 6);
        assert_eq!(result.attempts.len(), 6);
        assert!(result.attempts.iter().all(|a| a.outcome == AttemptOutcome::Pending));
        assert_eq!(
            clock.sleeps(),
            [500, 1000, 2000, 4000, 8000]
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect::<Vec<_>>()
        );
        assert!(matches!(
            result.into_result(Duration::from_secs(60)),
            Err(Error::RetriesExhausted { attempts: 6 })
        ));
    }

    #[tokio::test]
    async fn test_retry_ceiling_with_single_block_engine() {
        let relay = Arc::new(FakeRelay::always_failing());
        let clock = Arc::new(ManualClock::new());
        let submitter = BundleSubmitter::new(
            single_relay_manager(clock.clone()),
            relay.clone(),
            SubmitterSettings::default(),
        );
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(1), &fee_payer);

        let result = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert_eq!(result.outcome, SubmissionOutcome::Rejected(RejectReason::RetriesExhausted));
        assert_eq!(relay.sends.load(Ordering::SeqCst), 6);
        assert!(result.attempts.iter().all(|a| a.endpoint == "https://frankfurt"));
        // Only backoff sleeps; the cooldown never forces a wait
        assert_eq!(clock.sleeps().len(), 5);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_endpoint() {
        let relay = Arc::new(FakeRelay::landing_after(1));
        let clock = Arc::new(ManualClock::new());
        let manager = single_relay_manager(clock.clone());
        let endpoint = manager.acquire_endpoint().await.unwrap();
        for _ in 0..5 {
            manager.report_outcome(&endpoint, false).await;
        }
        let submitter = BundleSubmitter::new(manager, relay.clone(), SubmitterSettings::default());
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(1), &fee_payer);

        let cancel = CancellationToken::new();
        let (result, _) = tokio::join!(submitter.submit(&bundle, &cancel), async {
            tokio::task::yield_now().await;
            cancel.cancel();
        });

        assert_eq!(result.outcome, SubmissionOutcome::Cancelled);
        assert_eq!(relay.sends.load(Ordering::SeqCst), 0);
        assert!(clock.elapsed() < ConnectionSettings::default().acquire_timeout);
    }

    #[tokio::test]
    async fn test_transport_failures_fail_over_between_regions() {
        let relay = Arc::new(FakeRelay {
            send_failures: 3,
            statuses: Mutex::new(vec![BundleStatus::Landed { slot: None }]),
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay.clone(), clock);
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(2), &fee_payer);

        let result = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert!(result.is_accepted());
        let endpoints: Vec<&str> = result.attempts.iter().map(|a| a.endpoint.as_str()).collect();
        assert_eq!(
            endpoints,
            vec!["https://ny", "https://ny", "https://ny", "https://amsterdam"]
        );
    }

    #[tokio::test]
    async fn test_relay_rejection_is_not_retried() {
        let relay = Arc::new(FakeRelay {
            reject_with: Some("bundle contains an expired blockhash".into()),
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay.clone(), clock);
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(1), &fee_payer);

        let result = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert_eq!(relay.sends.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.outcome,
            SubmissionOutcome::Rejected(RejectReason::Relay(ref r)) if r.contains("expired")
        ));
    }

    #[tokio::test]
    async fn test_failed_bundle_is_rejected() {
        let relay = Arc::new(FakeRelay {
            statuses: Mutex::new(vec![
                BundleStatus::Pending,
                BundleStatus::Failed("simulation failed".into()),
            ]),
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay, clock);
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(1), &fee_payer);

        let result = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert_eq!(
            result.outcome,
            SubmissionOutcome::Rejected(RejectReason::Relay("simulation failed".into()))
        );
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_times_out_when_never_landing() {
        let relay = Arc::new(FakeRelay::default());
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay, clock.clone());
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(1), &fee_payer);

        let result = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert_eq!(result.outcome, SubmissionOutcome::TimedOut);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::TimedOut);
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
        assert!(matches!(
            result.into_result(Duration::from_secs(60)),
            Err(Error::ConfirmationTimeout(60000))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let relay = Arc::new(FakeRelay::landing_after(1));
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay.clone(), clock);
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(1), &fee_payer);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = submitter.submit(&bundle, &cancel).await;

        assert_eq!(result.outcome, SubmissionOutcome::Cancelled);
        assert!(result.attempts.is_empty());
        assert_eq!(relay.sends.load(Ordering::SeqCst), 0);
        assert_eq!(relay.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resubmitting_same_bundle_is_idempotent() {
        let relay = Arc::new(FakeRelay::landing_after(1));
        let clock = Arc::new(ManualClock::new());
        let submitter = submitter(relay.clone(), clock);
        let fee_payer = Keypair::new();
        let bundle = test_bundle(&keypairs(2), &fee_payer);
        let signatures = bundle.signatures();

        let first = submitter.submit(&bundle, &CancellationToken::new()).await;
        let second = submitter.submit(&bundle, &CancellationToken::new()).await;

        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.bundle_id, second.bundle_id);
        assert_ne!(first.submission_id, second.submission_id);
        assert_eq!(bundle.signatures(), signatures);
        assert_eq!(relay.seen.lock().unwrap().len(), 1);
    }
}
