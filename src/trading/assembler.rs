//! Bundle assembly
//!
//! Turns per-wallet instruction sets into a signed [`Bundle`]: one shared
//! blockhash, a compute-unit price on every wallet transaction, and a tip
//! transaction from the fee payer appended last. Input order is kept as given;
//! pool creation must already precede the buys that depend on it.

use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tracing::{debug, info};

use super::bundle::{Bundle, WalletInstructionSet};
use super::fees::{FeeStrategy, FeeTier, Network};
use crate::error::{Error, Result};
use crate::rpc::{ConnectionManager, RpcTransport};

pub struct BundleAssembler {
    connections: Arc<ConnectionManager>,
    rpc: Arc<dyn RpcTransport>,
    fees: Arc<FeeStrategy>,
    size_limit: usize,
}

impl BundleAssembler {
    pub fn new(
        connections: Arc<ConnectionManager>,
        rpc: Arc<dyn RpcTransport>,
        fees: Arc<FeeStrategy>,
        size_limit: usize,
    ) -> Self {
        Self {
            connections,
            rpc,
            fees,
            size_limit,
        }
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// Assemble and sign a bundle on a freshly fetched blockhash
    pub async fn assemble(
        &self,
        sets: Vec<WalletInstructionSet<'_>>,
        tier: FeeTier,
        network: Network,
        fee_payer: &Keypair,
    ) -> Result<Bundle> {
        self.check_size(sets.len())?;
        // Resolve the tip account before any I/O so configuration errors surface first
        self.fees.select_tip_account(network)?;

        let rpc = self.rpc.clone();
        let blockhash = self
            .connections
            .call("getLatestBlockhash", |endpoint| {
                let rpc = rpc.clone();
                async move { rpc.latest_blockhash(&endpoint.url).await }
            })
            .await
            .map_err(|e| Error::BlockhashUnavailable(e.to_string()))?;
        debug!("Fetched blockhash {} for bundle", blockhash);

        self.assemble_with_blockhash(sets, tier, network, fee_payer, blockhash)
    }

    /// Assemble and sign against a known blockhash; no I/O
    pub fn assemble_with_blockhash(
        &self,
        sets: Vec<WalletInstructionSet<'_>>,
        tier: FeeTier,
        network: Network,
        fee_payer: &Keypair,
        blockhash: Hash,
    ) -> Result<Bundle> {
        self.check_size(sets.len())?;
        let tip = self.fees.select_tip_account(network)?;
        let compute_unit_price = self.fees.select_fee(tier);
        let tip_lamports = self.fees.tip_lamports();

        let mut transactions = Vec::with_capacity(sets.len() + 1);

        for set in sets {
            // The runtime reads compute budget instructions wherever they sit; keep them first
            let mut instructions = Vec::with_capacity(set.instructions.len() + 1);
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(compute_unit_price));
            instructions.extend(set.instructions);

            let mut signers: Vec<&Keypair> = Vec::with_capacity(1 + set.extra_signers.len());
            signers.push(set.payer);
            signers.extend(set.extra_signers.iter().copied());

            transactions.push(sign(&set.label, &instructions, set.payer, &signers, blockhash)?);
        }

        let tip_instructions = [
            ComputeBudgetInstruction::set_compute_unit_price(compute_unit_price),
            system_instruction::transfer(&fee_payer.pubkey(), &tip.address, tip_lamports),
        ];
        transactions.push(sign(
            "fee-payer",
            &tip_instructions,
            fee_payer,
            &[fee_payer],
            blockhash,
        )?);

        let bundle = Bundle::new(transactions, blockhash, tip, tip_lamports);
        info!(
            "Assembled bundle {} with {} transactions on {} (tier={}, cu_price={}, tip={} lamports -> {})",
            bundle.id(),
            bundle.len(),
            bundle.blockhash(),
            tier,
            compute_unit_price,
            tip_lamports,
            tip.address
        );

        Ok(bundle)
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len == 0 || len > self.size_limit {
            return Err(Error::BundleTooLarge {
                len,
                limit: self.size_limit,
            });
        }
        Ok(())
    }
}

fn sign(
    label: &str,
    instructions: &[solana_sdk::instruction::Instruction],
    payer: &Keypair,
    signers: &[&Keypair],
    blockhash: Hash,
) -> Result<Transaction> {
    let mut transaction = Transaction::new_with_payer(instructions, Some(&payer.pubkey()));
    transaction
        .try_sign(signers, blockhash)
        .map_err(|e| Error::SigningFailed {
            wallet: label.to_string(),
            reason: e.to_string(),
        })?;
    Ok(transaction)
}
