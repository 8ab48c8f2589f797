//! CLI command implementations

use anyhow::{anyhow, Result};
use dialoguer::Confirm;
use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use spl_token::solana_program::program_pack::Pack;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::config::{mask_url, Config};
use crate::error::Error;
use crate::pump::accounts::BondingCurve;
use crate::pump::price::{
    lamports_to_sol, max_sol_with_slippage, min_sol_with_slippage, percent_of, sol_to_lamports,
    tokens_to_human,
};
use crate::pump::program::{derive_ata, derive_bonding_curve};
use crate::pump::{InstructionBuilder, Operation, PumpInstructionBuilder};
use crate::rpc::{ConnectionManager, RpcTransport, SolanaRpc};
use crate::trading::{
    Bundle, BundleAssembler, BundleSubmitter, FeeStrategy, FeeTier, JitoRelay, Network,
    SubmissionResult, SubmitterSettings, WalletInstructionSet,
};
use crate::wallet::{NamedWallet, WalletStore};

/// Buy sized and bounded for one wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyQuote {
    pub sol_lamports: u64,
    pub tokens: u64,
    pub max_sol_cost: u64,
}

/// Sell bounded for one wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellQuote {
    pub tokens: u64,
    pub min_sol_output: u64,
}

/// Quote the buys of a launch bundle against a fresh curve
///
/// Buys land in bundle order, so each quote sees the curve as moved by the
/// ones before it. Wallets beyond the configured amounts reuse the last one.
pub fn quote_launch_buys(
    amounts_sol: &[f64],
    wallets: usize,
    slippage_bps: u32,
) -> crate::Result<Vec<BuyQuote>> {
    let last = *amounts_sol
        .last()
        .ok_or_else(|| Error::Config("launch.buy_amounts_sol is empty".to_string()))?;

    let mut curve = BondingCurve::initial();
    let mut quotes = Vec::with_capacity(wallets);

    for i in 0..wallets {
        let sol_lamports = sol_to_lamports(amounts_sol.get(i).copied().unwrap_or(last));
        let tokens = curve.calculate_buy_tokens(sol_lamports)?;
        quotes.push(BuyQuote {
            sol_lamports,
            tokens,
            max_sol_cost: max_sol_with_slippage(sol_lamports, slippage_bps)?,
        });
        curve = curve.apply_buy(sol_lamports, tokens)?;
    }

    Ok(quotes)
}

/// Quote sells that execute one after another against `curve`
pub fn quote_sells(
    curve: &BondingCurve,
    amounts: &[u64],
    slippage_bps: u32,
) -> crate::Result<Vec<SellQuote>> {
    let mut curve = curve.clone();
    let mut quotes = Vec::with_capacity(amounts.len());

    for &tokens in amounts {
        let sol = curve.calculate_sell_sol(tokens)?;
        quotes.push(SellQuote {
            tokens,
            min_sol_output: min_sol_with_slippage(sol, slippage_bps),
        });
        curve = curve.apply_sell(tokens, sol)?;
    }

    Ok(quotes)
}

/// Lamports a bundle draws from one wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingNeed {
    pub wallet: String,
    pub address: Pubkey,
    pub lamports: u64,
}

/// A wallet whose balance cannot cover its need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub wallet: String,
    pub address: Pubkey,
    pub required: u64,
    pub balance: u64,
}

/// Spend on top of what the instructions themselves move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleCosts {
    /// Upper bound on one transaction's network fee
    pub network_fee: u64,
    pub tip: u64,
    /// Left in every wallet for rent and account creation
    pub reserve: u64,
}

/// What a launch bundle draws from each participant and the fee payer
pub fn launch_needs(
    participants: &[&NamedWallet],
    quotes: &[BuyQuote],
    fee_payer: &NamedWallet,
    costs: BundleCosts,
) -> Vec<FundingNeed> {
    let mut needs: Vec<FundingNeed> = participants
        .iter()
        .zip(quotes)
        .map(|(wallet, quote)| FundingNeed {
            wallet: wallet.name.clone(),
            address: wallet.pubkey(),
            lamports: quote
                .max_sol_cost
                .saturating_add(costs.network_fee)
                .saturating_add(costs.reserve),
        })
        .collect();

    needs.push(FundingNeed {
        wallet: fee_payer.name.clone(),
        address: fee_payer.pubkey(),
        lamports: costs.tip.saturating_add(costs.network_fee).saturating_add(costs.reserve),
    });

    merge_needs(needs)
}

/// What `bundles` sell bundles draw from the sellers and the fee payer
///
/// Sellers only pay their transaction fee; the fee payer tips once per bundle.
pub fn sell_needs(
    sellers: &[&NamedWallet],
    bundles: usize,
    fee_payer: &NamedWallet,
    costs: BundleCosts,
) -> Vec<FundingNeed> {
    let mut needs: Vec<FundingNeed> = sellers
        .iter()
        .map(|wallet| FundingNeed {
            wallet: wallet.name.clone(),
            address: wallet.pubkey(),
            lamports: costs.network_fee,
        })
        .collect();

    let per_bundle = costs.tip.saturating_add(costs.network_fee);
    needs.push(FundingNeed {
        wallet: fee_payer.name.clone(),
        address: fee_payer.pubkey(),
        lamports: per_bundle
            .saturating_mul(bundles as u64)
            .saturating_add(costs.reserve),
    });

    merge_needs(needs)
}

/// Merge needs that share an address, keeping first-seen order
///
/// A fee payer that is also the deployer pays both shares from one balance.
pub fn merge_needs(needs: Vec<FundingNeed>) -> Vec<FundingNeed> {
    let mut merged: Vec<FundingNeed> = Vec::with_capacity(needs.len());
    for need in needs {
        match merged.iter_mut().find(|m| m.address == need.address) {
            Some(existing) => {
                existing.wallet = format!("{}+{}", existing.wallet, need.wallet);
                existing.lamports = existing.lamports.saturating_add(need.lamports);
            }
            None => merged.push(need),
        }
    }
    merged
}

/// Needs the matching balance does not cover; `balances` follows `needs`
pub fn find_shortfalls(needs: &[FundingNeed], balances: &[u64]) -> Vec<Shortfall> {
    needs
        .iter()
        .zip(balances)
        .filter(|(need, balance)| **balance < need.lamports)
        .map(|(need, balance)| Shortfall {
            wallet: need.wallet.clone(),
            address: need.address,
            required: need.lamports,
            balance: *balance,
        })
        .collect()
}

/// Everything a command needs to build and submit bundles
struct Services {
    rpc_connections: Arc<ConnectionManager>,
    relay_connections: Arc<ConnectionManager>,
    rpc: Arc<dyn RpcTransport>,
    fees: Arc<FeeStrategy>,
    assembler: BundleAssembler,
    submitter: BundleSubmitter,
    network: Network,
    confirmation_timeout: Duration,
    reserve: u64,
}

impl Services {
    fn build(config: &Config) -> Result<Self> {
        let network: Network = config.jito.network.parse()?;
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);

        let rpc_connections = Arc::new(ConnectionManager::for_rpc(config, clock.clone())?);
        let relay_connections = Arc::new(ConnectionManager::for_relay(config, clock)?);
        let rpc: Arc<dyn RpcTransport> = Arc::new(SolanaRpc::new(&config.rpc)?);

        let fees = Arc::new(FeeStrategy::from_config(config)?);
        let assembler = BundleAssembler::new(
            rpc_connections.clone(),
            rpc.clone(),
            fees.clone(),
            config.bundle.size_limit,
        );
        let submitter = BundleSubmitter::new(
            relay_connections.clone(),
            Arc::new(JitoRelay::new(&config.jito)?),
            SubmitterSettings::from_config(&config.jito),
        );

        Ok(Self {
            rpc_connections,
            relay_connections,
            rpc,
            fees,
            assembler,
            submitter,
            network,
            confirmation_timeout: config.confirmation_timeout(),
            reserve: sol_to_lamports(config.launch.min_sol_balance),
        })
    }

    fn costs(&self, tier: FeeTier) -> BundleCosts {
        BundleCosts {
            // The deployer's transaction carries the mint's signature too
            network_fee: self.fees.max_transaction_fee(tier, 2),
            tip: self.fees.tip_lamports(),
            reserve: self.reserve,
        }
    }

    /// Print each wallet's need against its balance; fail on any shortfall
    async fn check_funding(&self, needs: &[FundingNeed]) -> Result<()> {
        let mut balances = Vec::with_capacity(needs.len());
        for need in needs {
            balances.push(self.balance(need.address).await?);
        }

        println!("\nFunding:");
        for (need, balance) in needs.iter().zip(&balances) {
            println!(
                "  {:<16} needs {:.4} SOL, holds {:.4} SOL",
                need.wallet,
                lamports_to_sol(need.lamports),
                lamports_to_sol(*balance)
            );
        }

        let shortfalls = find_shortfalls(needs, &balances);
        if shortfalls.is_empty() {
            return Ok(());
        }

        for shortfall in &shortfalls {
            warn!(
                "{} ({}) is short {:.4} SOL",
                shortfall.wallet,
                shortfall.address,
                lamports_to_sol(shortfall.required - shortfall.balance)
            );
        }
        anyhow::bail!(
            "{} wallet(s) cannot cover the bundle; fund them or lower the configured amounts",
            shortfalls.len()
        )
    }

    async fn account_data(&self, account: Pubkey) -> crate::Result<Option<Vec<u8>>> {
        let rpc = self.rpc.clone();
        self.rpc_connections
            .call("getAccountInfo", |endpoint| {
                let rpc = rpc.clone();
                async move { rpc.account_data(&endpoint.url, &account).await }
            })
            .await
    }

    async fn balance(&self, account: Pubkey) -> crate::Result<u64> {
        let rpc = self.rpc.clone();
        self.rpc_connections
            .call("getBalance", |endpoint| {
                let rpc = rpc.clone();
                async move { rpc.balance(&endpoint.url, &account).await }
            })
            .await
    }

    /// Token balance of `owner`'s associated account; zero if it does not exist
    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> crate::Result<u64> {
        let Some(data) = self.account_data(derive_ata(owner, mint)).await? else {
            return Ok(0);
        };

        spl_token::state::Account::unpack(&data)
            .map(|account| account.amount)
            .map_err(|e| Error::Serialization(format!("Invalid token account for {}: {}", owner, e)))
    }
}

/// Create a pool and buy into it from every wallet in one bundle
pub async fn launch(
    config: &Config,
    name: &str,
    symbol: &str,
    uri: &str,
    tier: Option<&str>,
    yes: bool,
) -> Result<()> {
    let tier = resolve_tier(config, tier)?;
    let wallets = WalletStore::load(&config.wallet)?;
    let services = Services::build(config)?;
    let builder = PumpInstructionBuilder::new();

    let participants: Vec<&NamedWallet> = std::iter::once(wallets.deployer())
        .chain(wallets.buyers().iter())
        .collect();
    if participants.len() > services.assembler.size_limit() {
        return Err(Error::BundleTooLarge {
            len: participants.len(),
            limit: services.assembler.size_limit(),
        }
        .into());
    }

    let quotes = quote_launch_buys(
        &config.launch.buy_amounts_sol,
        participants.len(),
        config.launch.slippage_bps,
    )?;

    // Fresh mint address; it co-signs the create instruction
    let mint = Keypair::new();
    let mint_pubkey = mint.pubkey();

    println!("\n=== LAUNCH ===\n");
    println!("Token: {} ({})", name, symbol);
    println!("Mint: {}", mint_pubkey);
    println!("Network: {}, fee tier: {}", services.network, tier);
    for (wallet, quote) in participants.iter().zip(&quotes) {
        println!(
            "  {:<10} {} buys {:.4} SOL -> ~{:.0} tokens (max cost {:.4} SOL)",
            wallet.name,
            wallet.pubkey(),
            lamports_to_sol(quote.sol_lamports),
            tokens_to_human(quote.tokens, config.launch.decimals),
            lamports_to_sol(quote.max_sol_cost)
        );
    }

    let needs = launch_needs(&participants, &quotes, wallets.fee_payer(), services.costs(tier));
    services.check_funding(&needs).await?;

    if !yes && !confirm(&format!("Launch {} with {} wallets?", symbol, participants.len()))? {
        info!("Launch cancelled by user");
        return Ok(());
    }

    let mut sets = Vec::with_capacity(participants.len());
    for (i, (wallet, quote)) in participants.iter().copied().zip(&quotes).enumerate() {
        let owner = wallet.pubkey();
        let mut instructions = Vec::new();

        if i == 0 {
            instructions.extend(builder.build(
                &owner,
                &Operation::CreatePool {
                    mint: mint_pubkey,
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    uri: uri.to_string(),
                },
            )?);
        }
        instructions.extend(builder.build(
            &owner,
            &Operation::Buy {
                mint: mint_pubkey,
                token_amount: quote.tokens,
                max_sol_cost: quote.max_sol_cost,
            },
        )?);

        let set = WalletInstructionSet::new(wallet.name.clone(), &wallet.keypair, instructions);
        sets.push(if i == 0 { set.with_signer(&mint) } else { set });
    }

    let bundle = services
        .assembler
        .assemble(sets, tier, services.network, &wallets.fee_payer().keypair)
        .await?;

    let cancel = cancel_on_ctrl_c();
    let result = services.submitter.submit(&bundle, &cancel).await;
    print_result("Launch", &result);

    let relay_bundle_id = result.into_result(services.confirmation_timeout)?;
    println!("\nLaunched {} at {}", symbol, mint_pubkey);
    println!("Relay bundle id: {}", relay_bundle_id);

    Ok(())
}

/// Sell a percentage of every buyer's holdings
pub async fn sell(config: &Config, mint: &str, percent: u8, tier: Option<&str>, yes: bool) -> Result<()> {
    if percent == 0 || percent > 100 {
        anyhow::bail!("Percentage must be between 1 and 100");
    }
    let mint = Pubkey::from_str(mint).map_err(|e| anyhow!("Invalid mint address: {}", e))?;

    let tier = resolve_tier(config, tier)?;
    let wallets = WalletStore::load(&config.wallet)?;
    let services = Services::build(config)?;
    let builder = PumpInstructionBuilder::new();

    let curve_data = services
        .account_data(derive_bonding_curve(&mint))
        .await?
        .ok_or_else(|| anyhow!("No bonding curve found for mint {}", mint))?;
    let curve = BondingCurve::try_from_slice(&curve_data)?;
    if curve.complete {
        anyhow::bail!("Bonding curve for {} is complete; the token has migrated", mint);
    }

    let mut holders = Vec::new();
    for wallet in wallets.buyers() {
        let balance = services.token_balance(&wallet.pubkey(), &mint).await?;
        let amount = percent_of(balance, percent);
        if amount == 0 {
            debug!("{} holds nothing to sell", wallet.name);
            continue;
        }
        holders.push((wallet, amount));
    }

    if holders.is_empty() {
        println!("No buyer wallet holds {}", mint);
        return Ok(());
    }

    let amounts: Vec<u64> = holders.iter().map(|(_, amount)| *amount).collect();
    let quotes = quote_sells(&curve, &amounts, config.launch.slippage_bps)?;

    println!("\n=== SELL {}% OF {} ===\n", percent, mint);
    println!(
        "Curve price: {:.10} SOL per token",
        lamports_to_sol(1) * curve.get_price()? * 10f64.powi(config.launch.decimals as i32)
    );
    for ((wallet, _), quote) in holders.iter().zip(&quotes) {
        println!(
            "  {:<10} sells {:.2} tokens (min {:.4} SOL)",
            wallet.name,
            tokens_to_human(quote.tokens, config.launch.decimals),
            lamports_to_sol(quote.min_sol_output)
        );
    }

    let sellers: Vec<&NamedWallet> = holders.iter().map(|(wallet, _)| *wallet).collect();
    let bundle_count = sellers.len().div_ceil(services.assembler.size_limit());
    let needs = sell_needs(&sellers, bundle_count, wallets.fee_payer(), services.costs(tier));
    services.check_funding(&needs).await?;

    if !yes && !confirm(&format!("Sell from {} wallets? This cannot be undone.", holders.len()))? {
        info!("Sell cancelled by user");
        return Ok(());
    }

    let planned: Vec<(&NamedWallet, SellQuote)> = sellers.into_iter().zip(quotes).collect();

    let mut bundles: Vec<Bundle> = Vec::new();
    for chunk in planned.chunks(services.assembler.size_limit()) {
        let mut sets = Vec::with_capacity(chunk.len());
        for (wallet, quote) in chunk {
            let instructions = builder.build(
                &wallet.pubkey(),
                &Operation::Sell {
                    mint,
                    token_amount: quote.tokens,
                    min_sol_output: quote.min_sol_output,
                },
            )?;
            sets.push(WalletInstructionSet::new(wallet.name.clone(), &wallet.keypair, instructions));
        }

        bundles.push(
            services
                .assembler
                .assemble(sets, tier, services.network, &wallets.fee_payer().keypair)
                .await?,
        );
    }

    info!("Submitting {} sell bundle(s)", bundles.len());
    let cancel = cancel_on_ctrl_c();
    let results = join_all(bundles.iter().map(|bundle| services.submitter.submit(bundle, &cancel))).await;

    let mut failed = 0;
    for (i, result) in results.iter().enumerate() {
        print_result(&format!("Sell bundle {}/{}", i + 1, results.len()), result);
        if !result.is_accepted() {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} sell bundles did not land", failed, results.len());
    }

    println!("\nAll {} sell bundle(s) landed", results.len());
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health
pub async fn health(config: &Config) -> Result<()> {
    let services = Services::build(config)?;
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    for endpoint in services.rpc_connections.handles().await {
        print!("RPC [{}] {}... ", endpoint.rank, mask_url(&endpoint.url));
        let started = Instant::now();
        match services.rpc.health(&endpoint.url).await {
            Ok(()) => {
                services.rpc_connections.report_outcome(&endpoint, true).await;
                println!("OK ({}ms)", started.elapsed().as_millis());
            }
            Err(e) => {
                services.rpc_connections.report_outcome(&endpoint, false).await;
                println!("FAILED: {}", e);
                all_healthy = false;
            }
        }
    }

    for endpoint in services.relay_connections.snapshot().await {
        println!(
            "Block engine [{}] {}... {}",
            endpoint.rank,
            mask_url(&endpoint.url),
            endpoint.health
        );
    }

    print!("Fee payer... ");
    match WalletStore::load(&config.wallet) {
        Ok(wallets) => match services.balance(wallets.fee_payer().pubkey()).await {
            Ok(lamports) => println!("OK (balance: {:.4} SOL)", lamports_to_sol(lamports)),
            Err(e) => {
                println!("FAILED: {}", e);
                all_healthy = false;
            }
        },
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    println!();
    if all_healthy {
        println!("All systems healthy!");
    } else {
        println!("Some systems are unhealthy. Check the errors above.");
    }

    Ok(())
}

fn resolve_tier(config: &Config, tier: Option<&str>) -> Result<FeeTier> {
    Ok(tier.unwrap_or(&config.fees.default_tier).parse()?)
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

/// Token cancelled on Ctrl-C; shared by every submission of the command
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling in-flight submissions");
            on_signal.cancel();
        }
    });
    token
}

fn print_result(label: &str, result: &SubmissionResult) {
    println!("\n{}: bundle {} {}", label, result.bundle_id, result.outcome);
    for attempt in &result.attempts {
        println!(
            "  attempt {} via {} at {}: {:?}",
            attempt.attempt,
            mask_url(&attempt.endpoint),
            attempt.timestamp.format("%H:%M:%S%.3f"),
            attempt.outcome
        );
    }
}
