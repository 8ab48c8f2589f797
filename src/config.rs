//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Jito accepts at most this many transactions per bundle, tip leg included
pub const RELAY_MAX_BUNDLE_TRANSACTIONS: usize = 5;

/// Main configuration structure
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub jito: JitoConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    /// Backup endpoints, tried in order once the primary degrades
    #[serde(default = "default_backup_endpoints")]
    pub backup_endpoints: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    /// Consecutive failures before an endpoint is marked degraded
    #[serde(default = "default_degraded_after")]
    pub degraded_after: u32,
    /// Consecutive failures before an endpoint is marked unreachable
    #[serde(default = "default_unreachable_after")]
    pub unreachable_after: u32,
    /// How long an unreachable endpoint sits out before it may be probed again
    #[serde(default = "default_probe_cooldown_ms")]
    pub probe_cooldown_ms: u64,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_acquire_poll_interval_ms")]
    pub acquire_poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            backup_endpoints: default_backup_endpoints(),
            timeout_ms: default_timeout_ms(),
            commitment: default_commitment(),
            degraded_after: default_degraded_after(),
            unreachable_after: default_unreachable_after(),
            probe_cooldown_ms: default_probe_cooldown_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            acquire_poll_interval_ms: default_acquire_poll_interval_ms(),
        }
    }
}

impl RpcConfig {
    /// Primary endpoint followed by backups, in priority order
    ///
    /// A backup repeating an earlier URL is dropped so each endpoint has a
    /// single health row.
    pub fn endpoint_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(1 + self.backup_endpoints.len());
        for url in std::iter::once(&self.endpoint).chain(self.backup_endpoints.iter()) {
            let normalized = url.trim_end_matches('/');
            if !urls.iter().any(|u| u.trim_end_matches('/') == normalized) {
                urls.push(url.clone());
            }
        }
        urls
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Compute-unit price per fee tier, in micro-lamports
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_fee_low")]
    pub low: u64,
    #[serde(default = "default_fee_medium")]
    pub medium: u64,
    #[serde(default = "default_fee_high")]
    pub high: u64,
    #[serde(default = "default_tier")]
    pub default_tier: String,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            low: default_fee_low(),
            medium: default_fee_medium(),
            high: default_fee_high(),
            default_tier: default_tier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JitoConfig {
    /// One block engine URL per region; the first is preferred
    #[serde(default = "default_block_engine_urls")]
    pub block_engine_urls: Vec<String>,
    #[serde(default = "default_network")]
    pub network: String,
    /// Tip account per network identifier
    #[serde(default = "default_tip_accounts")]
    pub tip_accounts: HashMap<String, String>,
    #[serde(default = "default_tip_lamports")]
    pub tip_lamports: u64,
    #[serde(default = "default_min_tip")]
    pub min_tip_lamports: u64,
    #[serde(default = "default_max_tip")]
    pub max_tip_lamports: u64,
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional block engine auth UUID (sent as `x-jito-auth`)
    #[serde(default)]
    pub uuid: Option<String>,
}

impl Default for JitoConfig {
    fn default() -> Self {
        Self {
            block_engine_urls: default_block_engine_urls(),
            network: default_network(),
            tip_accounts: default_tip_accounts(),
            tip_lamports: default_tip_lamports(),
            min_tip_lamports: default_min_tip(),
            max_tip_lamports: default_max_tip(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            uuid: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleConfig {
    /// Maximum wallet transactions per bundle (the tip leg comes on top)
    #[serde(default = "default_bundle_size_limit")]
    pub size_limit: usize,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            size_limit: default_bundle_size_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Keypair file of the deployer (creates the pool)
    #[serde(default)]
    pub deployer_keypair: String,
    /// Keypair file of the wallet paying relay tips
    #[serde(default)]
    pub fee_payer_keypair: String,
    /// Keypair files of the buyer wallets, in bundle order
    #[serde(default)]
    pub buyer_keypairs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchConfig {
    /// SOL spent by the deployer followed by each buyer, in order
    #[serde(default = "default_buy_amounts_sol")]
    pub buy_amounts_sol: Vec<f64>,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    /// pump.fun mints use 6 decimals
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// SOL each wallet must keep beyond what a bundle spends (rent, account creation)
    #[serde(default = "default_min_sol_balance")]
    pub min_sol_balance: f64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            buy_amounts_sol: default_buy_amounts_sol(),
            slippage_bps: default_slippage_bps(),
            decimals: default_decimals(),
            min_sol_balance: default_min_sol_balance(),
        }
    }
}

// Default value functions

fn default_rpc_endpoint() -> String {
    std::env::var("RPC_URL").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_backup_endpoints() -> Vec<String> {
    vec![
        "https://solana-api.projectserum.com".into(),
        "https://api.mainnet-beta.solana.com".into(),
    ]
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_commitment() -> String {
    "confirmed".into()
}

fn default_degraded_after() -> u32 {
    3
}

fn default_unreachable_after() -> u32 {
    5
}

fn default_probe_cooldown_ms() -> u64 {
    30000
}

fn default_acquire_timeout_ms() -> u64 {
    5000
}

fn default_acquire_poll_interval_ms() -> u64 {
    250
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10000
}

fn default_fee_low() -> u64 {
    5000
}

fn default_fee_medium() -> u64 {
    100000
}

fn default_fee_high() -> u64 {
    1000000
}

fn default_tier() -> String {
    "medium".into()
}

fn default_block_engine_urls() -> Vec<String> {
    match std::env::var("JITO_BLOCK_ENGINE_URL") {
        Ok(url) => vec![url],
        Err(_) => vec![
            "https://ny.mainnet.block-engine.jito.wtf".into(),
            "https://amsterdam.mainnet.block-engine.jito.wtf".into(),
        ],
    }
}

fn default_network() -> String {
    std::env::var("NETWORK").unwrap_or_else(|_| "mainnet".into())
}

fn default_tip_accounts() -> HashMap<String, String> {
    HashMap::from([
        (
            "mainnet".to_string(),
            "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5".to_string(),
        ),
        (
            "testnet".to_string(),
            "BXWsTqpS8LZ9ixpNt42WdJDkxYQJFReVWJy5xgFSLnQu".to_string(),
        ),
    ])
}

fn default_tip_lamports() -> u64 {
    100000
}

fn default_min_tip() -> u64 {
    10000
}

fn default_max_tip() -> u64 {
    1000000
}

fn default_confirmation_timeout_ms() -> u64 {
    60000
}

fn default_status_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    10000
}

fn default_bundle_size_limit() -> usize {
    RELAY_MAX_BUNDLE_TRANSACTIONS - 1
}

fn default_buy_amounts_sol() -> Vec<f64> {
    vec![0.5, 0.25, 0.25, 0.25]
}

fn default_slippage_bps() -> u32 {
    2500
}

fn default_decimals() -> u8 {
    6
}

fn default_min_sol_balance() -> f64 {
    0.05
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix BUNDLER_)
            .add_source(
                config::Environment::with_prefix("BUNDLER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for endpoint in self.rpc.endpoint_urls() {
            url::Url::parse(&endpoint)
                .with_context(|| format!("Invalid RPC endpoint: {}", endpoint))?;
        }

        if self.jito.block_engine_urls.is_empty() {
            anyhow::bail!("At least one Jito block engine URL is required");
        }
        for endpoint in &self.jito.block_engine_urls {
            url::Url::parse(endpoint)
                .with_context(|| format!("Invalid block engine URL: {}", endpoint))?;
        }

        if self.rpc.degraded_after == 0 || self.rpc.degraded_after > self.rpc.unreachable_after {
            anyhow::bail!(
                "degraded_after ({}) must be between 1 and unreachable_after ({})",
                self.rpc.degraded_after,
                self.rpc.unreachable_after
            );
        }

        if self.retry.base_delay_ms == 0 || self.retry.base_delay_ms > self.retry.max_delay_ms {
            anyhow::bail!(
                "retry base_delay_ms ({}) must be positive and not exceed max_delay_ms ({})",
                self.retry.base_delay_ms,
                self.retry.max_delay_ms
            );
        }

        // Fee tiers must be strictly increasing
        if !(self.fees.low < self.fees.medium && self.fees.medium < self.fees.high) {
            anyhow::bail!(
                "fee tiers must satisfy low < medium < high, got {} / {} / {}",
                self.fees.low,
                self.fees.medium,
                self.fees.high
            );
        }

        if self.bundle.size_limit == 0 || self.bundle.size_limit >= RELAY_MAX_BUNDLE_TRANSACTIONS {
            anyhow::bail!(
                "bundle size_limit must be between 1 and {}, got {}",
                RELAY_MAX_BUNDLE_TRANSACTIONS - 1,
                self.bundle.size_limit
            );
        }

        if self.jito.min_tip_lamports > self.jito.max_tip_lamports {
            anyhow::bail!("min_tip_lamports cannot exceed max_tip_lamports");
        }

        if self.jito.status_poll_interval_ms == 0 {
            anyhow::bail!("status_poll_interval_ms must be positive");
        }

        if self.launch.slippage_bps > 10000 {
            anyhow::bail!("slippage_bps cannot exceed 10000 (100%)");
        }

        if self.launch.buy_amounts_sol.iter().any(|sol| *sol <= 0.0) {
            anyhow::bail!("buy_amounts_sol entries must be positive");
        }

        if !self.launch.min_sol_balance.is_finite() || self.launch.min_sol_balance < 0.0 {
            anyhow::bail!("min_sol_balance must be a non-negative amount of SOL");
        }

        Ok(())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.jito.confirmation_timeout_ms)
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let backups: Vec<String> = self
            .rpc
            .backup_endpoints
            .iter()
            .map(|u| mask_url(u))
            .collect();
        let engines: Vec<String> = self
            .jito
            .block_engine_urls
            .iter()
            .map(|u| mask_url(u))
            .collect();

        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    backups: {:?}
    timeout: {}ms
    degraded_after: {} / unreachable_after: {}
  Retry:
    max_retries: {}
    delay: {}ms .. {}ms
  Fees (micro-lamports per CU):
    low: {} / medium: {} / high: {}
    default tier: {}
  Jito:
    block engines: {:?}
    network: {}
    tip: {} lamports (clamped to {}..{})
    confirmation timeout: {}ms
    auth uuid: {}
  Bundle:
    size_limit: {} wallet transactions
  Launch:
    buy amounts: {:?} SOL
    slippage: {} bps
    min balance per wallet: {} SOL
  Wallets:
    deployer: {}
    fee payer: {}
    buyers: {}"#,
            mask_url(&self.rpc.endpoint),
            backups,
            self.rpc.timeout_ms,
            self.rpc.degraded_after,
            self.rpc.unreachable_after,
            self.retry.max_retries,
            self.retry.base_delay_ms,
            self.retry.max_delay_ms,
            self.fees.low,
            self.fees.medium,
            self.fees.high,
            self.fees.default_tier,
            engines,
            self.jito.network,
            self.jito.tip_lamports,
            self.jito.min_tip_lamports,
            self.jito.max_tip_lamports,
            self.jito.confirmation_timeout_ms,
            if self.jito.uuid.is_some() { "***" } else { "(none)" },
            self.bundle.size_limit,
            self.launch.buy_amounts_sol,
            self.launch.slippage_bps,
            self.launch.min_sol_balance,
            self.wallet.deployer_keypair,
            self.wallet.fee_payer_keypair,
            self.wallet.buyer_keypairs.len(),
        )
    }
}

/// Hide query strings and long path segments, which usually carry API keys
pub fn mask_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.query().is_some() {
                parsed.set_query(Some("***"));
            }
            let masked_path: Vec<String> = parsed
                .path_segments()
                .map(|segments| {
                    segments
                        .map(|s| if s.len() >= 20 { "***".to_string() } else { s.to_string() })
                        .collect()
                })
                .unwrap_or_default();
            parsed.set_path(&masked_path.join("/"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
