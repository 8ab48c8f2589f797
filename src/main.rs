//! Pump.fun bundler - multi-wallet launches and sells landed atomically through Jito
//!
//! # WARNING
//! - Bundles spend real SOL from every configured wallet.
//! - A bundle already sent may still land after Ctrl-C.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use pump_bundler::cli::commands;
use pump_bundler::config::Config;

/// Pump.fun bundler - atomic multi-wallet launches and sells
#[derive(Parser)]
#[command(name = "bundler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a token and buy from every wallet in one bundle
    Launch {
        /// Token name (max 32 bytes)
        #[arg(long)]
        name: String,

        /// Token symbol (max 10 bytes)
        #[arg(long)]
        symbol: String,

        /// Metadata URI (max 200 bytes)
        #[arg(long)]
        uri: String,

        /// Fee tier: low, medium, high (default from config)
        #[arg(long)]
        tier: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Sell a percentage of every buyer wallet's holdings
    Sell {
        /// Token mint address
        #[arg(long)]
        mint: String,

        /// Percentage of each balance to sell (1-100)
        #[arg(long, default_value = "100")]
        percent: u8,

        /// Fee tier: low, medium, high (default from config)
        #[arg(long)]
        tier: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Probe RPC endpoints and the fee payer
    Health,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = startup_checks(&config) {
        error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Launch {
            name,
            symbol,
            uri,
            tier,
            yes,
        } => commands::launch(&config, &name, &symbol, &uri, tier.as_deref(), yes).await,
        Commands::Sell {
            mint,
            percent,
            tier,
            yes,
        } => commands::sell(&config, &mint, percent, tier.as_deref(), yes).await,
        Commands::Health => commands::health(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pump_bundler=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Refuse keypair files other users can read
fn startup_checks(config: &Config) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let files = [&config.wallet.deployer_keypair, &config.wallet.fee_payer_keypair]
            .into_iter()
            .chain(config.wallet.buyer_keypairs.iter())
            .filter(|path| !path.is_empty());

        for path in files {
            let Ok(metadata) = std::fs::metadata(path) else {
                // Missing files are reported when the wallet store loads them
                continue;
            };

            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                anyhow::bail!(
                    "Keypair file {} has insecure permissions {:o}. Run 'chmod 600 {}' to fix.",
                    path,
                    mode & 0o777,
                    path
                );
            }
        }

        info!("Keypair permissions OK");
    }

    Ok(())
}
