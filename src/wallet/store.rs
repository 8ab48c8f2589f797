//! Keypair store for the wallets taking part in a bundle
//!
//! Keys are read from Solana CLI keypair files (a JSON array of 64 bytes).
//! `DEPLOYER_KEY` and `FEEPAYER_KEY` hold base58 secret keys and take
//! precedence over the deployer / fee-payer files. Keys are never generated
//! or written back.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::path::Path;
use tracing::{debug, info};

use crate::config::WalletConfig;
use crate::error::{Error, Result};

pub const DEPLOYER_KEY_ENV: &str = "DEPLOYER_KEY";
pub const FEE_PAYER_KEY_ENV: &str = "FEEPAYER_KEY";

/// A keypair with a display label
#[derive(Debug)]
pub struct NamedWallet {
    pub name: String,
    pub keypair: Keypair,
}

impl NamedWallet {
    pub fn new(name: impl Into<String>, keypair: Keypair) -> Self {
        Self {
            name: name.into(),
            keypair,
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

/// Deployer, fee payer and buyers, in bundle order
#[derive(Debug)]
pub struct WalletStore {
    deployer: NamedWallet,
    fee_payer: NamedWallet,
    buyers: Vec<NamedWallet>,
}

impl WalletStore {
    /// Load every configured wallet
    pub fn load(config: &WalletConfig) -> Result<Self> {
        let deployer = load_role("deployer", DEPLOYER_KEY_ENV, &config.deployer_keypair)?;
        let fee_payer = load_role("fee-payer", FEE_PAYER_KEY_ENV, &config.fee_payer_keypair)?;

        let buyers = config
            .buyer_keypairs
            .iter()
            .enumerate()
            .map(|(i, path)| {
                read_keypair_file(path).map(|kp| NamedWallet::new(format!("buyer-{}", i + 1), kp))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Loaded deployer {}, fee payer {} and {} buyer wallet(s)",
            deployer.pubkey(),
            fee_payer.pubkey(),
            buyers.len()
        );

        Ok(Self {
            deployer,
            fee_payer,
            buyers,
        })
    }

    pub fn from_keypairs(deployer: Keypair, fee_payer: Keypair, buyers: Vec<Keypair>) -> Self {
        Self {
            deployer: NamedWallet::new("deployer", deployer),
            fee_payer: NamedWallet::new("fee-payer", fee_payer),
            buyers: buyers
                .into_iter()
                .enumerate()
                .map(|(i, kp)| NamedWallet::new(format!("buyer-{}", i + 1), kp))
                .collect(),
        }
    }

    pub fn deployer(&self) -> &NamedWallet {
        &self.deployer
    }

    pub fn fee_payer(&self) -> &NamedWallet {
        &self.fee_payer
    }

    pub fn buyers(&self) -> &[NamedWallet] {
        &self.buyers
    }
}

fn load_role(role: &str, env_var: &str, path: &str) -> Result<NamedWallet> {
    if let Ok(encoded) = std::env::var(env_var) {
        if !encoded.trim().is_empty() {
            debug!("Using {} key from {}", role, env_var);
            return parse_base58_keypair(encoded.trim()).map(|kp| NamedWallet::new(role, kp));
        }
    }

    if path.is_empty() {
        return Err(Error::InvalidKeypair(format!(
            "No {} key: set {} or configure a keypair file",
            role, env_var
        )));
    }

    read_keypair_file(path).map(|kp| NamedWallet::new(role, kp))
}

/// Read a Solana CLI keypair file
pub fn read_keypair_file<P: AsRef<Path>>(path: P) -> Result<Keypair> {
    let path = path.as_ref();
    let keypair_data = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidKeypair(format!("Failed to read keypair file {}: {}", path.display(), e))
    })?;

    let secret_key: Vec<u8> = serde_json::from_str(&keypair_data).map_err(|e| {
        Error::InvalidKeypair(format!("Failed to parse keypair JSON {}: {}", path.display(), e))
    })?;

    Keypair::from_bytes(&secret_key).map_err(|e| {
        Error::InvalidKeypair(format!("Invalid keypair bytes in {}: {}", path.display(), e))
    })
}

/// Decode a base58 secret key (64 bytes)
pub fn parse_base58_keypair(encoded: &str) -> Result<Keypair> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| Error::InvalidKeypair(format!("Invalid base58 secret key: {}", e)))?;

    Keypair::from_bytes(&bytes)
        .map_err(|e| Error::InvalidKeypair(format!("Invalid secret key bytes: {}", e)))
}
