//! Integration Tests for the AntBot Colony Core
//!
//! Drives the full colony through paper-trading ticks and checks the
//! system-level properties: ledger conservation, the tier ratchet, the
//! rug short-circuit, provider exhaustion and worker count bounds.

use std::sync::Arc;

use arc_swap::ArcSwap;
use proptest::prelude::*;
use solana_sdk::signature::Keypair;
use tokio::sync::broadcast;

use antbot_core::capital::{CapitalManager, DenialReason};
use antbot_core::colony::{Colony, QueenState};
use antbot_core::config::{AppConfig, SharedConfig};
use antbot_core::feeds::PaperFeed;
use antbot_core::monitor::{PerformanceMonitor, TradeLog, TradeRecord};
use antbot_core::network::gateway::{GatewayError, RpcGateway};
use antbot_core::network::EventBus;
use antbot_core::risk::oracle::OracleScore;
use antbot_core::state::SharedState;
use antbot_core::telemetry::AlertManager;
use antbot_core::utils::types::{ContractAnalysis, OperationClass, Role, TokenSnapshot};

const TOKEN: &str = "So11111111111111111111111111111111111111112";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.paper_trading = true;
    config.colony.watchlist = vec![TOKEN.to_string()];
    config.capital_manager.min_active_workers = 1;
    config
}

fn snapshot(price: f64) -> TokenSnapshot {
    TokenSnapshot {
        token_address: TOKEN.to_string(),
        price,
        volume: 10_000.0,
        liquidity: 5_000.0,
        holder_count: 500,
        contract: ContractAnalysis::default(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

struct Harness {
    colony: Arc<Colony>,
    feed: Arc<PaperFeed>,
    state: Arc<SharedState>,
    config: SharedConfig,
}

fn harness(config: AppConfig) -> Harness {
    let config: SharedConfig = Arc::new(ArcSwap::from_pointee(config));
    let state = Arc::new(SharedState::new());
    let feed = Arc::new(PaperFeed::new());
    let bus = EventBus::default();

    let colony = Arc::new(
        Colony::build(
            config.clone(),
            state.clone(),
            feed.clone(),
            Arc::new(Keypair::new()),
            bus.sender(),
        )
        .unwrap(),
    );

    // A confident oracle score so the drone gate passes without a network
    colony.oracle().prime_cache(
        TOKEN,
        OracleScore {
            confidence: 0.9,
            risk: 0.1,
        },
    );

    Harness {
        colony,
        feed,
        state,
        config,
    }
}

async fn open_position(h: &Harness) {
    h.feed.register(snapshot(1.0));
    h.colony.activate();
    h.colony.tick().await;
    assert_eq!(h.state.open_positions.len(), 1, "entry should open a position");
}

#[tokio::test]
async fn test_full_entry_and_tier_exit_cycle() {
    let h = harness(test_config());
    open_position(&h).await;

    let position = h.state.open_positions.iter().next().unwrap().clone();
    assert_eq!(position.current_tier, 0);
    let original = position.original_size;

    // Scenario A: price ratio hits exactly the first tier multiplier
    h.feed.set_price(TOKEN, 1.5);
    h.colony.tick().await;

    let position = h.state.open_positions.iter().next().unwrap().clone();
    assert_eq!(position.current_tier, 1);
    assert!((position.size - original * 0.75).abs() < 1e-9);

    // Same price again: the ratchet holds, nothing more is sold
    h.colony.tick().await;
    let position = h.state.open_positions.iter().next().unwrap().clone();
    assert_eq!(position.current_tier, 1);
    assert!((position.size - original * 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn test_tier_index_never_regresses() {
    let h = harness(test_config());
    open_position(&h).await;

    let mut last_tier = 0;
    for price in [1.5, 1.2, 2.0, 1.4, 3.0, 0.9_f64] {
        h.feed.set_price(TOKEN, price.max(0.8));
        h.colony.tick().await;
        if let Some(position) = h.state.open_positions.iter().next() {
            assert!(
                position.current_tier >= last_tier,
                "tier regressed from {} at price {}",
                last_tier,
                price
            );
            last_tier = position.current_tier;
        }
    }
}

#[tokio::test]
async fn test_honeypot_triggers_emergency_exit() {
    let h = harness(test_config());
    open_position(&h).await;

    // Scenario D: honeypot flag with a flat price
    h.feed.update(TOKEN, |s| s.contract.honeypot = true);
    h.colony.tick().await;

    assert_eq!(h.state.open_positions.len(), 0, "position must be force-closed");
    assert_eq!(
        h.state
            .emergency_exits
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_queen_pauses_on_colony_risk_and_recovers() {
    let mut config = test_config();
    // A sub-critical drawdown (0.45 ratio) must still out-risk this queen
    config.colony.risk_threshold = 0.4;
    let h = harness(config);
    open_position(&h).await;
    assert_eq!(h.colony.queen_state(), QueenState::Active);

    // Drop to 0.55: a 45% drawdown, flagged but below the critical ladder,
    // so the position survives while colony risk crosses the threshold
    h.feed.set_price(TOKEN, 0.55);
    h.colony.tick().await;
    assert_eq!(h.state.open_positions.len(), 1);
    assert_eq!(h.colony.queen_state(), QueenState::RiskPaused);

    // Recovery: price returns, risk decays under the resume threshold
    h.feed.set_price(TOKEN, 1.0);
    for _ in 0..3 {
        h.colony.tick().await;
    }
    assert_eq!(h.colony.queen_state(), QueenState::Active);
}

#[tokio::test]
async fn test_paused_queen_blocks_new_entries() {
    const TOKEN2: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    let mut config = test_config();
    config.colony.risk_threshold = 0.4;
    config.capital_manager.min_active_workers = 2;
    let h = harness(config.clone());
    open_position(&h).await;

    // Pause the queen via a deep (sub-critical) drawdown on the held token
    h.feed.set_price(TOKEN, 0.55);
    h.colony.tick().await;
    assert_eq!(h.colony.queen_state(), QueenState::RiskPaused);

    // A second, perfectly healthy candidate with a ready agent appears
    let mut snap = snapshot(1.0);
    snap.token_address = TOKEN2.to_string();
    h.feed.register(snap);
    h.colony.oracle().prime_cache(
        TOKEN2,
        OracleScore {
            confidence: 0.9,
            risk: 0.1,
        },
    );
    let mut updated = config;
    updated.colony.watchlist = vec![TOKEN.to_string(), TOKEN2.to_string()];
    h.config.store(Arc::new(updated));

    // While paused, no new trade initiation happens colony-wide
    h.colony.tick().await;
    assert_eq!(h.colony.queen_state(), QueenState::RiskPaused);
    assert_eq!(h.state.open_positions.len(), 1);
}

#[tokio::test]
async fn test_shutdown_is_terminal() {
    let h = harness(test_config());
    h.colony.activate();
    h.colony.shutdown().await;
    assert_eq!(h.colony.queen_state(), QueenState::Shutdown);

    // Ticks become no-ops; nothing opens
    h.feed.register(snapshot(1.0));
    h.colony.tick().await;
    assert_eq!(h.state.open_positions.len(), 0);
}

#[test]
fn test_gateway_exhaustion_scenario() {
    // Scenario B: all providers circuit-open -> selection fails, no send
    let config: SharedConfig = Arc::new(ArcSwap::from_pointee(AppConfig::default()));
    let gateway = RpcGateway::new(config);

    for provider in ["helius", "triton", "jito"] {
        for _ in 0..3 {
            gateway.report_probe(provider, false, 100);
        }
    }

    for class in [
        OperationClass::Monitoring,
        OperationClass::Trading,
        OperationClass::Mev,
    ] {
        let err = gateway.select(class).unwrap_err();
        assert!(matches!(err, GatewayError::NoAvailableProvider(_)));
    }
}

#[tokio::test]
async fn test_scale_down_scenario() {
    // Scenario C: success rate 0.25 under threshold 0.3 -> 10 * 0.7 = 7
    let mut config = AppConfig::default().performance_monitor;
    config.min_scale_interval_mins = 0;
    let log = Arc::new(TradeLog::new());
    let bus = EventBus::default();
    let alerts = Arc::new(AlertManager::new(
        &AppConfig::default().telemetry,
        bus.sender(),
    ));
    let monitor = PerformanceMonitor::new(config, log.clone(), alerts);

    for i in 0..8 {
        log.record(TradeRecord {
            timestamp: chrono::Utc::now().timestamp_millis(),
            success: i % 4 == 0,
            execution_time_ms: 40,
            gas_fee: 0.001,
            profit: 0.0,
        });
    }

    let decision = monitor.tick(10).await.expect("scale-down expected");
    assert_eq!(decision.target_workers, 7);
}

#[test]
fn test_shipped_config_files_parse() {
    let settings = include_str!("../config/settings.toml");
    let rpc = include_str!("../config/rpc.toml");
    let config = AppConfig::parse(settings, rpc).expect("shipped config must be valid");
    assert!(config.paper_trading);
    assert_eq!(config.profit_manager.tiers.len(), 4);
    assert!((config.profit_manager.tiers[0].multiplier - 1.5).abs() < 1e-9);
}

#[test]
fn test_config_round_trip_preserves_tunables() {
    let config = AppConfig::default();
    let (settings, rpc) = antbot_core::config::to_toml_pair(&config).unwrap();
    let reloaded = AppConfig::parse(&settings, &rpc).unwrap();
    assert_eq!(config, reloaded);
}

proptest! {
    /// Ledger conservation: any interleaving of allocations, releases with
    /// pnl, and reserve sweeps keeps allocated + reserve + available == total.
    #[test]
    fn prop_ledger_conservation(ops in prop::collection::vec(0u8..3, 1..40),
                                amounts in prop::collection::vec(0.1f64..5.0, 1..40),
                                pnls in prop::collection::vec(-1.0f64..2.0, 1..40)) {
        let (tx, _rx) = broadcast::channel(64);
        let manager = CapitalManager::new(AppConfig::default().capital_manager, tx);
        let mut live: Vec<String> = Vec::new();

        for ((op, amount), pnl) in ops.iter().zip(amounts.iter().cycle()).zip(pnls.iter().cycle()) {
            match op {
                0 => {
                    if let Ok(allocation) =
                        manager.request_allocation("agent", Role::Worker, *amount)
                    {
                        live.push(allocation.id);
                    }
                }
                1 => {
                    if let Some(id) = live.pop() {
                        manager.release(&id, *pnl);
                    }
                }
                _ => {
                    manager.sweep_to_reserve(*amount);
                }
            }
            prop_assert!(manager.snapshot().conserved());
        }
    }

    /// Worker bounds: any sequence of success-rate regimes keeps the
    /// scaled worker count inside [min_workers, max_workers].
    #[test]
    fn prop_worker_count_stays_bounded(regimes in prop::collection::vec(prop::bool::ANY, 1..25)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut config = AppConfig::default().performance_monitor;
            config.min_scale_interval_mins = 0;
            config.max_scale_interval_mins = 0;
            let min = config.min_workers;
            let max = config.max_workers;

            let log = Arc::new(TradeLog::new());
            let bus = EventBus::default();
            let alerts = Arc::new(AlertManager::new(
                &AppConfig::default().telemetry,
                bus.sender(),
            ));
            let monitor = PerformanceMonitor::new(config, log.clone(), alerts);

            let mut workers = 5usize;
            for good_regime in regimes {
                for _ in 0..5 {
                    log.record(TradeRecord {
                        timestamp: chrono::Utc::now().timestamp_millis(),
                        success: good_regime,
                        execution_time_ms: 40,
                        gas_fee: 0.001,
                        profit: 0.0,
                    });
                }
                if let Some(decision) = monitor.tick(workers).await {
                    workers = decision.target_workers;
                }
                assert!(workers >= min && workers <= max);
            }
        });
    }
}

#[test]
fn test_capital_denials_are_typed() {
    let (tx, _rx) = broadcast::channel(64);
    let manager = CapitalManager::new(AppConfig::default().capital_manager, tx);

    let err = manager
        .request_allocation("w", Role::Worker, 100.0)
        .unwrap_err();
    assert!(matches!(err, DenialReason::BudgetExceeded { .. }));

    let err = manager
        .request_allocation("s", Role::Sentry, 1.0)
        .unwrap_err();
    assert!(matches!(err, DenialReason::NonTradingRole(Role::Sentry)));
}
