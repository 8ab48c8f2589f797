//! Fee strategy: compute-unit price per tier, relay tip account per network
//!
//! Everything here is immutable after construction and safe to share across
//! concurrent submissions without locking.

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{Error, Result};

/// Base fee the runtime charges per signature
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

/// Compute units a single transaction may consume
pub const MAX_COMPUTE_UNITS_PER_TRANSACTION: u64 = 1_400_000;

/// Priority tier requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Low,
    Medium,
    High,
}

impl FromStr for FeeTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(FeeTier::Low),
            "medium" => Ok(FeeTier::Medium),
            "high" => Ok(FeeTier::High),
            other => Err(Error::Config(format!("Unknown fee tier: {}", other))),
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeTier::Low => write!(f, "low"),
            FeeTier::Medium => write!(f, "medium"),
            FeeTier::High => write!(f, "high"),
        }
    }
}

/// Cluster a bundle is destined for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "localnet" => Ok(Network::Localnet),
            other => Err(Error::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Devnet => write!(f, "devnet"),
            Network::Localnet => write!(f, "localnet"),
        }
    }
}

/// Relay tip destination selected for one bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipAccount {
    pub network: Network,
    pub address: Pubkey,
}

/// Compute-unit price (micro-lamports) per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeThresholds {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

/// Tip amount and the bounds it is clamped to, in lamports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipAmount {
    pub lamports: u64,
    pub min_lamports: u64,
    pub max_lamports: u64,
}

#[derive(Debug, Clone)]
pub struct FeeStrategy {
    thresholds: FeeThresholds,
    tip_accounts: HashMap<Network, Pubkey>,
    tip: TipAmount,
}

impl FeeStrategy {
    pub fn new(
        thresholds: FeeThresholds,
        tip_accounts: HashMap<Network, Pubkey>,
        tip: TipAmount,
    ) -> Result<Self> {
        if !(thresholds.low < thresholds.medium && thresholds.medium < thresholds.high) {
            return Err(Error::Config(format!(
                "Fee tiers must be strictly increasing, got {:?}",
                thresholds
            )));
        }

        if tip.min_lamports > tip.max_lamports {
            return Err(Error::Config(format!(
                "Tip bounds inverted: min {} > max {}",
                tip.min_lamports, tip.max_lamports
            )));
        }

        Ok(Self {
            thresholds,
            tip_accounts,
            tip,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut tip_accounts = HashMap::new();
        for (network, address) in &config.jito.tip_accounts {
            let network = Network::from_str(network)?;
            let address = Pubkey::from_str(address)
                .map_err(|e| Error::Config(format!("Invalid tip account {}: {}", address, e)))?;
            tip_accounts.insert(network, address);
        }

        Self::new(
            FeeThresholds {
                low: config.fees.low,
                medium: config.fees.medium,
                high: config.fees.high,
            },
            tip_accounts,
            TipAmount {
                lamports: config.jito.tip_lamports,
                min_lamports: config.jito.min_tip_lamports,
                max_lamports: config.jito.max_tip_lamports,
            },
        )
    }

    /// Compute-unit price for `tier`
    pub fn select_fee(&self, tier: FeeTier) -> u64 {
        match tier {
            FeeTier::Low => self.thresholds.low,
            FeeTier::Medium => self.thresholds.medium,
            FeeTier::High => self.thresholds.high,
        }
    }

    pub fn select_tip_account(&self, network: Network) -> Result<TipAccount> {
        self.tip_accounts
            .get(&network)
            .map(|address| TipAccount {
                network,
                address: *address,
            })
            .ok_or_else(|| Error::UnknownNetwork(network.to_string()))
    }

    /// Configured tip, clamped to bounds
    pub fn tip_lamports(&self) -> u64 {
        self.clamp_tip(self.tip.lamports)
    }

    pub fn clamp_tip(&self, tip: u64) -> u64 {
        tip.clamp(self.tip.min_lamports, self.tip.max_lamports)
    }

    /// Upper bound on the network fee of one transaction at `tier`
    pub fn max_transaction_fee(&self, tier: FeeTier, signatures: u64) -> u64 {
        // Compute-unit price is in micro-lamports
        let priority = (self.select_fee(tier) as u128 * MAX_COMPUTE_UNITS_PER_TRANSACTION as u128)
            .div_ceil(1_000_000);
        let priority = u64::try_from(priority).unwrap_or(u64::MAX);

        signatures
            .saturating_mul(LAMPORTS_PER_SIGNATURE)
            .saturating_add(priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_strategy() -> FeeStrategy {
        FeeStrategy::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_fee_lookup_is_monotonic() {
        let strategy = test_strategy();
        assert_eq!(strategy.select_fee(FeeTier::Low), 5000);
        assert_eq!(strategy.select_fee(FeeTier::Medium), 100000);
        assert_eq!(strategy.select_fee(FeeTier::High), 1000000);
        assert!(strategy.select_fee(FeeTier::Low) < strategy.select_fee(FeeTier::Medium));
        assert!(strategy.select_fee(FeeTier::Medium) < strategy.select_fee(FeeTier::High));
    }

    #[test]
    fn test_rejects_non_increasing_tiers() {
        let tip = TipAmount {
            lamports: 1,
            min_lamports: 1,
            max_lamports: 1,
        };
        for (low, medium, high) in [(5, 5, 10), (10, 5, 20), (1, 20, 20)] {
            let result = FeeStrategy::new(FeeThresholds { low, medium, high }, HashMap::new(), tip);
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_tip_account_per_network() {
        let strategy = test_strategy();

        let mainnet = strategy.select_tip_account(Network::Mainnet).unwrap();
        assert_eq!(
            mainnet.address,
            Pubkey::from_str("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5").unwrap()
        );

        let err = strategy.select_tip_account(Network::Devnet).unwrap_err();
        assert!(matches!(err, Error::UnknownNetwork(n) if n == "devnet"));
    }

    #[test]
    fn test_tip_clamping() {
        let strategy = test_strategy();

        assert_eq!(strategy.clamp_tip(5000), 10000); // Below min
        assert_eq!(strategy.clamp_tip(50000), 50000); // In range
        assert_eq!(strategy.clamp_tip(2000000), 1000000); // Above max
        assert_eq!(strategy.tip_lamports(), 100000);
    }

    #[test]
    fn test_max_transaction_fee() {
        let strategy = test_strategy();

        // 100_000 micro-lamports per CU over 1.4M CU is 140_000 lamports
        assert_eq!(strategy.max_transaction_fee(FeeTier::Medium, 1), 145_000);
        assert_eq!(strategy.max_transaction_fee(FeeTier::Medium, 2), 150_000);
        assert!(
            strategy.max_transaction_fee(FeeTier::High, 1) > strategy.max_transaction_fee(FeeTier::Low, 1)
        );
    }

    #[test]
    fn test_parse_network_and_tier() {
        assert_eq!("mainnet-beta".parse::<Network>().unwrap(), Network::Mainnet);
        assert!(matches!(
            "solana-moon".parse::<Network>(),
            Err(Error::UnknownNetwork(_))
        ));
        assert_eq!("HIGH".parse::<FeeTier>().unwrap(), FeeTier::High);
        assert!("urgent".parse::<FeeTier>().is_err());
    }
}
