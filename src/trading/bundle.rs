//! Bundle value types

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::Transaction;

use super::fees::TipAccount;
use crate::error::Result;

/// Instructions for one wallet, to be compiled into one transaction
///
/// Keypairs are borrowed from the wallet store; `payer` pays the transaction
/// fee and signs first.
pub struct WalletInstructionSet<'a> {
    pub label: String,
    pub payer: &'a Keypair,
    pub extra_signers: Vec<&'a Keypair>,
    pub instructions: Vec<Instruction>,
}

impl<'a> WalletInstructionSet<'a> {
    pub fn new(label: impl Into<String>, payer: &'a Keypair, instructions: Vec<Instruction>) -> Self {
        Self {
            label: label.into(),
            payer,
            extra_signers: Vec::new(),
            instructions,
        }
    }

    /// Add a co-signer, e.g. a fresh mint keypair for pool creation
    pub fn with_signer(mut self, signer: &'a Keypair) -> Self {
        self.extra_signers.push(signer);
        self
    }
}

/// Signed, ordered, immutable group of transactions for atomic inclusion
///
/// The tip leg is always the last transaction and every transaction shares
/// one recent blockhash.
#[derive(Debug, Clone)]
pub struct Bundle {
    transactions: Vec<Transaction>,
    blockhash: Hash,
    tip: TipAccount,
    tip_lamports: u64,
    id: String,
}

impl Bundle {
    pub(crate) fn new(
        transactions: Vec<Transaction>,
        blockhash: Hash,
        tip: TipAccount,
        tip_lamports: u64,
    ) -> Self {
        let id = bundle_id(&transactions);
        Self {
            transactions,
            blockhash,
            tip,
            tip_lamports,
            id,
        }
    }

    /// Bundle id as the block engine derives it from the signatures
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn tip_account(&self) -> TipAccount {
        self.tip
    }

    pub fn tip_lamports(&self) -> u64 {
        self.tip_lamports
    }

    pub fn tip_transaction(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    pub fn signatures(&self) -> Vec<Signature> {
        self.transactions
            .iter()
            .map(|tx| tx.signatures.first().copied().unwrap_or_default())
            .collect()
    }

    /// Base64 wire encoding of each transaction, in bundle order
    pub fn encode(&self) -> Result<Vec<String>> {
        self.transactions
            .iter()
            .map(|tx| Ok(BASE64.encode(bincode::serialize(tx)?)))
            .collect()
    }
}

/// SHA-256 over the comma-joined first signatures, hex encoded
pub fn bundle_id(transactions: &[Transaction]) -> String {
    let joined = transactions
        .iter()
        .map(|tx| tx.signatures.first().copied().unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join(",");

    format!("{:x}", Sha256::digest(joined.as_bytes()))
}
