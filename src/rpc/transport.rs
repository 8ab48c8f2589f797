//! Solana RPC transport
//!
//! The bundler only needs a handful of reads from a node. They sit behind
//! [`RpcTransport`] so the assembler and commands can run against fakes.

use async_trait::async_trait;
use dashmap::DashMap;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::RpcConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn latest_blockhash(&self, endpoint: &str) -> Result<Hash>;

    /// Lamport balance of `account`
    async fn balance(&self, endpoint: &str, account: &Pubkey) -> Result<u64>;

    /// Raw account data, `None` if the account does not exist
    async fn account_data(&self, endpoint: &str, account: &Pubkey) -> Result<Option<Vec<u8>>>;

    async fn health(&self, endpoint: &str) -> Result<()>;
}

/// [`RpcTransport`] over the nonblocking `RpcClient`, one client per URL
pub struct SolanaRpc {
    clients: DashMap<String, Arc<RpcClient>>,
    timeout: Duration,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let commitment = CommitmentConfig::from_str(&config.commitment)
            .map_err(|e| Error::Config(format!("Invalid commitment {}: {}", config.commitment, e)))?;

        Ok(Self {
            clients: DashMap::new(),
            timeout: Duration::from_millis(config.timeout_ms),
            commitment,
        })
    }

    fn client(&self, endpoint: &str) -> Arc<RpcClient> {
        self.clients
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                debug!("Creating RPC client for {}", endpoint);
                Arc::new(RpcClient::new_with_timeout_and_commitment(
                    endpoint.to_string(),
                    self.timeout,
                    self.commitment,
                ))
            })
            .clone()
    }
}

#[async_trait]
impl RpcTransport for SolanaRpc {
    async fn latest_blockhash(&self, endpoint: &str) -> Result<Hash> {
        let (blockhash, _last_valid_height) = self
            .client(endpoint)
            .get_latest_blockhash_with_commitment(self.commitment)
            .await?;
        Ok(blockhash)
    }

    async fn balance(&self, endpoint: &str, account: &Pubkey) -> Result<u64> {
        Ok(self.client(endpoint).get_balance(account).await?)
    }

    async fn account_data(&self, endpoint: &str, account: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .client(endpoint)
            .get_account_with_commitment(account, self.commitment)
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn health(&self, endpoint: &str) -> Result<()> {
        self.client(endpoint).get_health().await?;
        Ok(())
    }
}
