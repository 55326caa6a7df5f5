//! AntBot Colony Core
//!
//! An autonomous colony-structured trading engine for Solana that:
//! - Routes RPC traffic across providers with circuit-breaker failover
//! - Screens tokens through a rug detector and an AI oracle gate
//! - Takes profit through configurable multiplier tiers
//! - Scales its worker count from rolling performance metrics
//! - Exposes a status/event API for the external dashboard

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use antbot_core::api::{self, ApiState};
use antbot_core::colony::Colony;
use antbot_core::config::AppConfig;
use antbot_core::feeds::PaperFeed;
use antbot_core::network::EventBus;
use antbot_core::state::SharedState;
use antbot_core::telemetry::{init_logging, init_metrics};
use antbot_core::utils::helpers::load_keypair_from_env_or_file;

/// AntBot Colony Core - autonomous colony trading engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration directory (settings.toml + rpc.toml)
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,

    /// Path to the treasury keypair file
    #[arg(long, default_value = "wallet.json")]
    keypair: PathBuf,

    /// Enable paper trading mode (no real transactions)
    #[arg(long)]
    paper: bool,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration errors are fatal at startup; never run on defaults
    let mut config = AppConfig::load(&args.config_dir)?;
    if args.paper {
        config.paper_trading = true;
    }
    if let Some(level) = args.log_level {
        config.telemetry.log_level = level;
    }

    // The runtime is sized before anything async runs
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if config.colony.max_threads > 0 {
        builder.worker_threads(config.colony.max_threads);
    }
    let runtime = builder.build().context("Failed to build runtime")?;
    runtime.block_on(run(config, args.keypair))
}

async fn run(config: AppConfig, keypair_path: PathBuf) -> Result<()> {
    let _log_guard = init_logging(&config.telemetry)?;

    info!("Starting AntBot Colony Core v{}", env!("CARGO_PKG_VERSION"));
    info!("Paper trading: {}", config.paper_trading);

    if config.telemetry.enable_metrics {
        init_metrics(config.telemetry.metrics_port)?;
    }

    let paper_trading = config.paper_trading;
    let config = Arc::new(ArcSwap::from_pointee(config));
    let state = Arc::new(SharedState::new());
    let bus = EventBus::default();

    let wallet = if paper_trading {
        // Paper runs never sign anything real
        Arc::new(solana_sdk::signature::Keypair::new())
    } else {
        Arc::new(
            load_keypair_from_env_or_file("ANTBOT_KEYPAIR", &keypair_path)
                .context("Failed to load treasury keypair")?,
        )
    };

    let feed = Arc::new(PaperFeed::new());
    let colony = Arc::new(Colony::build(
        config.clone(),
        state.clone(),
        feed,
        wallet,
        bus.sender(),
    )?);
    colony.start().await?;

    let api_state = Arc::new(ApiState {
        config: config.clone(),
        state: state.clone(),
        capital: colony.capital(),
        event_tx: bus.sender(),
    });
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state).await {
            error!("Status API failed: {:#}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping colony"),
        Err(err) => error!("Error listening for shutdown signal: {}", err),
    }

    colony.shutdown().await;
    info!("AntBot Colony Core stopped");
    Ok(())
}
