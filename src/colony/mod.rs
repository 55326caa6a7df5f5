//! Colony Coordinator
//!
//! The top-level control loop tying the colony together:
//! - Queen state machine gates new trade initiation colony-wide
//! - Sentry duty re-scans held tokens and fires emergency exits
//! - Drone duty scouts watchlist tokens through the oracle gate
//! - Profit tiers, autoscaling and reinvestment run on the same tick
//!
//! State transitions are decided serially inside `tick`; snapshot fetches
//! and submissions are the only awaited I/O and are bounded by semaphores.

pub mod agent;
pub mod state_machine;

pub use agent::Agent;
pub use state_machine::{QueenState, QueenStateMachine, WorkerState, WorkerStateMachine};

use anyhow::{Context, Result};
use futures::future::join_all;
use parking_lot::Mutex;
use solana_sdk::signature::Keypair;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::capital::{CapitalManager, DenialReason};
use crate::config::SharedConfig;
use crate::execution::TransactionHandler;
use crate::feeds::MarketFeed;
use crate::monitor::{PerformanceMonitor, TradeLog, TradeRecord};
use crate::network::event_bus::ColonyEvent;
use crate::network::gateway::RpcGateway;
use crate::profit::ProfitManager;
use crate::reinvest::ReinvestmentManager;
use crate::risk::{OracleClient, RugDetector};
use crate::state::SharedState;
use crate::telemetry::{metrics, AlertManager};
use crate::utils::helpers::current_timestamp_millis;
use crate::utils::types::{
    ExitAction, Position, RiskVerdict, Role, TokenSnapshot, TradeIntent, TradeSide, TxResult,
    Urgency, WalletSummary,
};

/// Hysteresis on queen resume: risk must fall this far below the pause
/// threshold before trading resumes
const RESUME_FACTOR: f64 = 0.8;

pub struct Colony {
    config: SharedConfig,
    state: Arc<SharedState>,
    gateway: Arc<RpcGateway>,
    detector: Arc<RugDetector>,
    oracle: Arc<OracleClient>,
    tx_handler: Arc<TransactionHandler>,
    profit: ProfitManager,
    capital: Arc<CapitalManager>,
    reinvest: Arc<ReinvestmentManager>,
    monitor: Arc<PerformanceMonitor>,
    trade_log: Arc<TradeLog>,
    feed: Arc<dyn MarketFeed>,
    event_tx: broadcast::Sender<ColonyEvent>,
    queen: Mutex<QueenStateMachine>,
    agents: Mutex<HashMap<String, Agent>>,
    /// High-priority verdict queue; drained before anything else each tick
    emergencies: Mutex<VecDeque<RiskVerdict>>,
    scan_semaphore: Arc<Semaphore>,
    last_reinvest: Mutex<Instant>,
    running: Arc<RwLock<bool>>,
}

impl Colony {
    /// Wire the full colony from configuration.
    pub fn build(
        config: SharedConfig,
        state: Arc<SharedState>,
        feed: Arc<dyn MarketFeed>,
        wallet: Arc<Keypair>,
        event_tx: broadcast::Sender<ColonyEvent>,
    ) -> Result<Self> {
        let snapshot = config.load_full();

        let gateway = Arc::new(RpcGateway::new(config.clone()));
        let detector = Arc::new(RugDetector::new(snapshot.rug_detector.clone()));
        let oracle = Arc::new(OracleClient::new(&snapshot.oracle)?);
        let tx_handler = Arc::new(TransactionHandler::new(
            config.clone(),
            gateway.clone(),
            wallet,
            state.clone(),
            event_tx.clone(),
        )?);
        let profit = ProfitManager::new(snapshot.profit_manager.clone());
        let capital = Arc::new(CapitalManager::new(
            snapshot.capital_manager.clone(),
            event_tx.clone(),
        ));
        let trade_log = Arc::new(TradeLog::new());
        let alerts = Arc::new(AlertManager::new(&snapshot.telemetry, event_tx.clone()));
        let monitor = Arc::new(PerformanceMonitor::new(
            snapshot.performance_monitor.clone(),
            trade_log.clone(),
            alerts,
        ));
        let reinvest = Arc::new(ReinvestmentManager::new(
            snapshot.reinvestment.clone(),
            capital.clone(),
            trade_log.clone(),
            event_tx.clone(),
        ));
        let scan_semaphore = Arc::new(Semaphore::new(snapshot.colony.max_concurrent_scans));

        Ok(Self {
            config,
            state,
            gateway,
            detector,
            oracle,
            tx_handler,
            profit,
            capital,
            reinvest,
            monitor,
            trade_log,
            feed,
            event_tx,
            queen: Mutex::new(QueenStateMachine::new()),
            agents: Mutex::new(HashMap::new()),
            emergencies: Mutex::new(VecDeque::new()),
            scan_semaphore,
            last_reinvest: Mutex::new(Instant::now()),
            running: Arc::new(RwLock::new(false)),
        })
    }

    pub fn gateway(&self) -> Arc<RpcGateway> {
        self.gateway.clone()
    }

    pub fn capital(&self) -> Arc<CapitalManager> {
        self.capital.clone()
    }

    pub fn detector(&self) -> Arc<RugDetector> {
        self.detector.clone()
    }

    pub fn tx_handler(&self) -> Arc<TransactionHandler> {
        self.tx_handler.clone()
    }

    pub fn oracle(&self) -> Arc<OracleClient> {
        self.oracle.clone()
    }

    pub fn queen_state(&self) -> QueenState {
        self.queen.lock().current_state()
    }

    pub fn active_workers(&self) -> usize {
        self.capital.active_workers()
    }

    /// Bring the queen active and staff the worker floor. Split from
    /// `start` so tests can drive ticks without the background tasks.
    pub fn activate(&self) {
        let snapshot = self.config.load_full();
        for _ in 0..snapshot.colony.drone_count {
            self.register_scout(Role::Drone);
        }
        for _ in 0..snapshot.colony.sentry_count {
            self.register_scout(Role::Sentry);
        }

        self.transition_queen(QueenState::Active, None);
        self.ensure_minimum_workers();
    }

    /// Initialize the colony: queen goes active, the worker floor is
    /// staffed, background loops start.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        *self.running.write().await = true;
        self.activate();

        self.gateway.start_health_probes().await;
        self.tx_handler.start_fee_sampler().await;

        let colony = self.clone();
        tokio::spawn(async move {
            let interval = Duration::from_millis(colony.config.load_full().colony.tick_interval_ms);
            let mut ticker = tokio::time::interval(interval);
            while *colony.running.read().await {
                ticker.tick().await;
                colony.tick().await;
            }
            info!("Colony loop stopped");
        });

        info!("Colony started");
        Ok(())
    }

    /// One coordinator pass. Public so tests can drive the colony
    /// deterministically without the timer.
    pub async fn tick(&self) {
        if self.queen_state() == QueenState::Shutdown {
            return;
        }

        self.drain_emergencies().await;
        self.scan_positions().await;
        self.update_queen_risk();

        // Guard is released before any await below
        let accepting = self.queen.lock().accepting_trades();
        if accepting {
            self.ensure_minimum_workers();
            self.scout_and_open().await;
        }

        self.autoscale().await;
        self.maybe_reinvest();
        self.refresh_gauges();
    }

    /// External risk signal entry point (sentry subsystems, API).
    pub fn push_emergency(&self, verdict: RiskVerdict) {
        self.emergencies.lock().push_back(verdict);
    }

    /// Queen shutdown is terminal and requires an external restart.
    pub async fn shutdown(&self) {
        self.transition_queen(QueenState::Shutdown, Some("shutdown requested".to_string()));
        *self.running.write().await = false;
        self.gateway.stop().await;
        self.tx_handler.stop().await;
    }

    // ------------------------------------------------------------------
    // Emergency path
    // ------------------------------------------------------------------

    async fn drain_emergencies(&self) {
        loop {
            let verdict = match self.emergencies.lock().pop_front() {
                Some(v) => v,
                None => break,
            };
            self.handle_emergency(&verdict).await;
        }
    }

    async fn handle_emergency(&self, verdict: &RiskVerdict) {
        self.state.risk_level.store(verdict.score.max(self.state.risk_level.load()));
        let _ = self.event_tx.send(ColonyEvent::RugVerdict {
            verdict: verdict.clone(),
        });

        let affected: Vec<Position> = self
            .state
            .open_positions
            .iter()
            .filter(|entry| entry.token_address == verdict.token_address)
            .map(|entry| entry.clone())
            .collect();

        for position in affected {
            self.emergency_close(position).await;
        }
    }

    async fn emergency_close(&self, mut position: Position) {
        warn!(
            "Emergency exit for position {} ({})",
            position.id, position.token_address
        );

        // Bump the epoch so in-flight normal submissions for this position
        // are ignored once the emergency completes
        position.epoch += 1;
        if let Some(mut entry) = self.state.open_positions.get_mut(&position.id) {
            entry.epoch = position.epoch;
        }

        self.transition_agent(&position.agent_id, WorkerState::Closing, Some("emergency".into()));
        metrics::record_emergency_exit();
        self.state
            .emergency_exits
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let _ = self.event_tx.send(ColonyEvent::EmergencyExit {
            token_address: position.token_address.clone(),
            position_id: position.id.clone(),
        });

        let mut intent = TradeIntent::new(
            position.agent_id.clone(),
            position.token_address.clone(),
            TradeSide::Sell,
            position.size,
            0.0, // overridden by the emergency slippage ceiling
        );
        intent.position_id = Some(position.id.clone());
        intent.urgency = Urgency::Emergency;
        intent.epoch = position.epoch;

        match self.tx_handler.submit(intent).await {
            // Emergency fills have no reliable price; pnl settles at zero
            Ok(result) => self.apply_exit_result(&position, &result, true, 0.0),
            Err(e) => {
                // Provider exhaustion: the attempt fails, the colony lives
                error!("Emergency submission failed outright: {}", e);
                self.state.increment_error_count();
                let _ = self.event_tx.send(ColonyEvent::Error {
                    source: "emergency_exit".to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Sentry duty: scan held tokens, evaluate tiers
    // ------------------------------------------------------------------

    async fn scan_positions(&self) {
        let positions: Vec<Position> = self
            .state
            .open_positions
            .iter()
            .map(|entry| entry.clone())
            .collect();
        if positions.is_empty() {
            return;
        }

        // Bounded concurrent snapshot fetches; transitions stay serial below
        let fetches = positions.iter().map(|position| {
            let token = position.token_address.clone();
            let feed = self.feed.clone();
            let semaphore = self.scan_semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                feed.snapshot(&token).await.ok()
            }
        });
        let snapshots: Vec<Option<TokenSnapshot>> = join_all(fetches).await;

        for (position, snapshot) in positions.into_iter().zip(snapshots) {
            let snapshot = match snapshot {
                Some(s) => s,
                None => {
                    debug!("No snapshot for {}", position.token_address);
                    continue;
                }
            };

            // Skip positions already superseded by an emergency this tick
            let current = match self.state.open_positions.get(&position.id) {
                Some(entry) => entry.clone(),
                None => continue,
            };

            let verdict = self.detector.observe(snapshot.clone());
            if verdict.emergency_exit {
                self.emergency_close(current).await;
                continue;
            }

            self.evaluate_position(current, &snapshot).await;
        }
    }

    async fn evaluate_position(&self, position: Position, snapshot: &TokenSnapshot) {
        let volatility = self.detector.volatility(&position.token_address);
        let gas_cost = self
            .tx_handler
            .fees()
            .fee_for(Urgency::Normal) as f64
            / 1e9;

        match self
            .profit
            .evaluate(&position, snapshot.price, volatility, gas_cost)
        {
            Some(ExitAction::PartialClose {
                tier,
                amount,
                gas_buffer,
            }) => {
                let mut intent = TradeIntent::new(
                    position.agent_id.clone(),
                    position.token_address.clone(),
                    TradeSide::Sell,
                    amount,
                    self.config.load_full().transaction_handler.default_slippage_pct,
                );
                intent.position_id = Some(position.id.clone());
                intent.gas_buffer = gas_buffer;
                intent.epoch = position.epoch;

                let _ = self.event_tx.send(ColonyEvent::TierTriggered {
                    position_id: position.id.clone(),
                    tier,
                    amount,
                });

                match self.tx_handler.submit(intent).await {
                    Ok(result) if result.success => {
                        self.apply_tier_close(&position, tier, amount, snapshot.price, &result);
                    }
                    Ok(result) => {
                        debug!(
                            "Tier close for {} failed: {:?}",
                            position.id, result.error
                        );
                        self.record_trade_outcome(&result, 0.0);
                    }
                    Err(e) => {
                        warn!("Tier close submission error: {}", e);
                        self.state.increment_error_count();
                    }
                }
            }
            Some(ExitAction::ForcedReview) => {
                info!(
                    "Position {} stale beyond max age, forcing close",
                    position.id
                );
                self.transition_agent(
                    &position.agent_id,
                    WorkerState::Closing,
                    Some("forced review".into()),
                );
                let _ = self.event_tx.send(ColonyEvent::Alert {
                    level: "warning".to_string(),
                    title: "forced review".to_string(),
                    message: format!("position {} exceeded max trade age", position.id),
                });
                self.close_position_fully(position, snapshot.price, Urgency::Normal)
                    .await;
            }
            None => {}
        }
    }

    fn apply_tier_close(
        &self,
        position: &Position,
        tier: usize,
        amount: f64,
        price: f64,
        result: &TxResult,
    ) {
        let mut remove = false;
        if let Some(mut entry) = self.state.open_positions.get_mut(&position.id) {
            if result.epoch != entry.epoch {
                debug!("Dropping stale tier result for {}", position.id);
                return;
            }
            self.profit.apply_partial_close(&mut entry, tier, amount);
            remove = entry.is_closed();
        }

        let pnl = amount * (price - position.entry_price);
        self.record_trade_outcome(result, pnl);
        self.state.realized_profit.add(pnl);

        if remove {
            self.state.open_positions.remove(&position.id);
            self.detector.forget(&position.token_address);
            self.finish_agent_position(&position.agent_id, &position.id, pnl);
        }
    }

    async fn close_position_fully(&self, position: Position, price: f64, urgency: Urgency) {
        let mut intent = TradeIntent::new(
            position.agent_id.clone(),
            position.token_address.clone(),
            TradeSide::Sell,
            position.size,
            self.config.load_full().transaction_handler.default_slippage_pct,
        );
        intent.position_id = Some(position.id.clone());
        intent.urgency = urgency;
        intent.epoch = position.epoch;

        match self.tx_handler.submit(intent).await {
            Ok(result) if result.success => {
                let pnl = position.size * (price - position.entry_price);
                self.apply_exit_result(&position, &result, false, pnl);
                self.state.realized_profit.add(pnl);
            }
            Ok(result) => {
                debug!("Full close failed for {}: {:?}", position.id, result.error);
                self.record_trade_outcome(&result, 0.0);
            }
            Err(e) => {
                warn!("Close submission error: {}", e);
                self.state.increment_error_count();
            }
        }
    }

    /// Bookkeeping after a position-ending submission (emergency or full
    /// close). Stale results from an older epoch are discarded.
    fn apply_exit_result(&self, position: &Position, result: &TxResult, emergency: bool, pnl: f64) {
        if let Some(entry) = self.state.open_positions.get(&position.id) {
            if result.epoch < entry.epoch {
                debug!("Ignoring stale exit result for {}", position.id);
                return;
            }
        }

        if !result.success {
            self.record_trade_outcome(result, 0.0);
            if emergency {
                error!(
                    "Emergency exit for {} reported failed: {:?}",
                    position.id, result.error
                );
            }
            return;
        }

        self.record_trade_outcome(result, pnl);
        self.state.open_positions.remove(&position.id);
        self.detector.forget(&position.token_address);
        self.finish_agent_position(&position.agent_id, &position.id, pnl);
    }

    fn finish_agent_position(&self, agent_id: &str, position_id: &str, pnl: f64) {
        let _ = self.event_tx.send(ColonyEvent::PositionClosed {
            position_id: position_id.to_string(),
            pnl,
        });

        let mut agents = self.agents.lock();
        if let Some(agent) = agents.get_mut(agent_id) {
            agent.open_positions.remove(position_id);
            if agent.open_positions.is_empty() {
                if agent.state() == WorkerState::Trading {
                    agent.machine.transition_to(WorkerState::Closing, None);
                }
                if agent.state() == WorkerState::Closing {
                    agent.machine.transition_to(WorkerState::Idle, None);
                    self.publish_agent_state(agent, "closing", "idle", None);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Queen risk gating
    // ------------------------------------------------------------------

    fn update_queen_risk(&self) {
        // Aggregate colony risk is the worst live verdict across held tokens
        let mut risk: f64 = 0.0;
        for entry in self.state.open_positions.iter() {
            if let Some(verdict) = self.detector.latest_verdict(&entry.token_address) {
                risk = risk.max(verdict.score);
            }
        }
        self.state.risk_level.store(risk);

        let threshold = self.config.load_full().colony.risk_threshold;
        let current = self.queen_state();

        if current == QueenState::Active && risk > threshold {
            self.transition_queen(
                QueenState::RiskPaused,
                Some(format!("colony risk {:.2} above {:.2}", risk, threshold)),
            );
            let _ = self.event_tx.send(ColonyEvent::ColonyPaused {
                reason: format!("risk level {:.2}", risk),
            });
        } else if current == QueenState::RiskPaused && risk < threshold * RESUME_FACTOR {
            self.transition_queen(QueenState::Active, Some("risk subsided".to_string()));
            let _ = self.event_tx.send(ColonyEvent::ColonyResumed);
        }
    }

    // ------------------------------------------------------------------
    // Drone duty: scout candidates and open positions
    // ------------------------------------------------------------------

    async fn scout_and_open(&self) {
        let snapshot = self.config.load_full();
        let watchlist = snapshot.colony.watchlist.clone();
        if watchlist.is_empty() {
            return;
        }

        let held: Vec<String> = self
            .state
            .open_positions
            .iter()
            .map(|p| p.token_address.clone())
            .collect();

        for token in watchlist {
            if held.contains(&token) {
                continue;
            }

            let ready_agent = {
                let agents = self.agents.lock();
                agents
                    .values()
                    .find(|a| a.ready_to_trade())
                    .map(|a| (a.id.clone(), a.allocated_capital))
            };
            let (agent_id, budget) = match ready_agent {
                Some(found) => found,
                None => break,
            };

            if let Err(e) = self.try_open_position(&token, &agent_id, budget).await {
                debug!("Scout pass on {}: {}", token, e);
            }
        }
    }

    async fn try_open_position(&self, token: &str, agent_id: &str, budget: f64) -> Result<()> {
        // Oracle confidence gate first, cheapest check
        let score = self.oracle.score(token).await.context("oracle unavailable")?;
        if !self.oracle.passes_gate(&score) {
            anyhow::bail!("confidence {:.2} below gate", score.confidence);
        }

        let snapshot = {
            let _permit = self
                .scan_semaphore
                .acquire()
                .await
                .context("scan semaphore closed")?;
            self.feed.snapshot(token).await?
        };

        let verdict = self.detector.observe(snapshot.clone());
        if verdict.emergency_exit || verdict.score >= self.config.load_full().colony.risk_threshold
        {
            anyhow::bail!("rug verdict score {:.2} blocks entry", verdict.score);
        }
        if snapshot.price <= 0.0 {
            anyhow::bail!("no price for token");
        }

        let amount = budget / snapshot.price;
        let intent = TradeIntent::new(
            agent_id.to_string(),
            token.to_string(),
            TradeSide::Buy,
            amount,
            self.config.load_full().transaction_handler.default_slippage_pct,
        );

        let result = self.tx_handler.submit(intent).await?;
        if !result.success {
            self.record_trade_outcome(&result, 0.0);
            anyhow::bail!("entry submission failed: {:?}", result.error);
        }

        let position = Position::new(
            token,
            format!("{}/SOL", &token[..token.len().min(6)]),
            snapshot.price,
            amount,
            agent_id,
        );

        self.record_trade_outcome(&result, 0.0);
        self.state
            .open_positions
            .insert(position.id.clone(), position.clone());

        {
            let mut agents = self.agents.lock();
            if let Some(agent) = agents.get_mut(agent_id) {
                agent.open_positions.insert(position.id.clone());
                agent
                    .machine
                    .transition_to(WorkerState::Trading, Some("position opened".into()));
                self.publish_agent_state(agent, "idle", "trading", Some("position opened"));
            }
        }

        info!(
            "Opened {:.4} of {} at {:.6} for agent {}",
            amount, token, snapshot.price, agent_id
        );
        let _ = self.event_tx.send(ColonyEvent::PositionOpened {
            position_id: position.id,
            token_address: token.to_string(),
            size: amount,
            price: snapshot.price,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scaling and capital
    // ------------------------------------------------------------------

    fn ensure_minimum_workers(&self) {
        while self.capital.active_workers() < self.capital.min_active_workers() {
            match self.spawn_worker() {
                Ok(_) => {}
                Err(e) => {
                    debug!("Cannot staff worker floor: {}", e);
                    break;
                }
            }
        }
    }

    fn spawn_worker(&self) -> Result<String, DenialReason> {
        let agent = Agent::new(Role::Worker);
        let allocation =
            self.capital
                .request_allocation(&agent.id, Role::Worker, self.capital.worker_budget())?;

        let mut agent = agent;
        agent.allocation_id = Some(allocation.id.clone());
        agent.allocated_capital = self.capital.worker_budget();

        self.state.wallets.insert(
            agent.id.clone(),
            WalletSummary {
                id: agent.id.clone(),
                name: agent.display_name(),
                balance: agent.allocated_capital,
                value: agent.allocated_capital,
            },
        );

        let _ = self.event_tx.send(ColonyEvent::AgentSpawned {
            agent_id: agent.id.clone(),
            role: agent.role.to_string(),
        });

        let id = agent.id.clone();
        self.agents.lock().insert(id.clone(), agent);
        Ok(id)
    }

    fn register_scout(&self, role: Role) {
        let agent = Agent::new(role);
        let _ = self.event_tx.send(ColonyEvent::AgentSpawned {
            agent_id: agent.id.clone(),
            role: role.to_string(),
        });
        self.agents.lock().insert(agent.id.clone(), agent);
    }

    async fn autoscale(&self) {
        let current = self.capital.active_workers();
        let decision = match self.monitor.tick(current).await {
            Some(d) => d,
            None => return,
        };

        if decision.target_workers > current {
            let mut spawned = 0;
            for _ in current..decision.target_workers {
                match self.spawn_worker() {
                    Ok(_) => spawned += 1,
                    Err(e) => {
                        // Typed denial, not a crash; the colony stays put
                        info!("Scale-up halted: {}", e);
                        break;
                    }
                }
            }
            if spawned > 0 {
                let _ = self.event_tx.send(ColonyEvent::WorkersScaled {
                    from: current,
                    to: current + spawned,
                    reason: decision.reason,
                });
            }
        } else {
            let mut to_retire = current - decision.target_workers;
            let mut agents = self.agents.lock();
            let retirable: Vec<String> = agents
                .values()
                .filter(|a| a.role.is_trading() && a.can_retire())
                .map(|a| a.id.clone())
                .collect();

            let mut retired = 0;
            for agent_id in retirable {
                if to_retire == 0 {
                    break;
                }
                if let Some(agent) = agents.get_mut(&agent_id) {
                    agent.machine.transition_to(WorkerState::Retired, None);
                    let reclaimed = agent
                        .allocation_id
                        .take()
                        .and_then(|alloc| self.capital.release(&alloc, 0.0))
                        .map(|d| {
                            use rust_decimal::prelude::ToPrimitive;
                            d.to_f64().unwrap_or(0.0)
                        })
                        .unwrap_or(0.0);
                    self.state.wallets.remove(&agent_id);
                    let _ = self.event_tx.send(ColonyEvent::AgentRetired {
                        agent_id: agent_id.clone(),
                        reclaimed_capital: reclaimed,
                    });
                    agents.remove(&agent_id);
                    to_retire -= 1;
                    retired += 1;
                }
            }

            if retired > 0 {
                let _ = self.event_tx.send(ColonyEvent::WorkersScaled {
                    from: current,
                    to: current - retired,
                    reason: decision.reason,
                });
            }
        }
    }

    fn maybe_reinvest(&self) {
        let interval = Duration::from_secs(self.reinvest.check_interval_secs());
        {
            let last = self.last_reinvest.lock();
            if last.elapsed() < interval {
                return;
            }
        }
        *self.last_reinvest.lock() = Instant::now();
        self.reinvest.rebalance(self.state.realized_profit.load());
    }

    // ------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------

    fn record_trade_outcome(&self, result: &TxResult, profit: f64) {
        self.trade_log.record(TradeRecord {
            timestamp: current_timestamp_millis(),
            success: result.success,
            execution_time_ms: result.execution_time_ms,
            gas_fee: result.priority_fee as f64 / 1e9,
            profit,
        });
    }

    fn transition_queen(&self, target: QueenState, reason: Option<String>) {
        let mut queen = self.queen.lock();
        let from = queen.current_state();
        if queen.transition_to(target, reason.clone()) {
            *self.state.queen_state.write() = target;
            let _ = self.event_tx.send(ColonyEvent::AgentStateChanged {
                agent_id: "queen".to_string(),
                role: Role::Queen.to_string(),
                from: from.to_string(),
                to: target.to_string(),
                reason,
            });
        }
    }

    fn transition_agent(&self, agent_id: &str, target: WorkerState, reason: Option<String>) {
        let mut agents = self.agents.lock();
        if let Some(agent) = agents.get_mut(agent_id) {
            let from = agent.state().to_string();
            if agent.machine.transition_to(target, reason.clone()) {
                let to = target.to_string();
                drop(agents);
                let _ = self.event_tx.send(ColonyEvent::AgentStateChanged {
                    agent_id: agent_id.to_string(),
                    role: "worker".to_string(),
                    from,
                    to,
                    reason,
                });
            }
        }
    }

    fn publish_agent_state(&self, agent: &Agent, from: &str, to: &str, reason: Option<&str>) {
        let _ = self.event_tx.send(ColonyEvent::AgentStateChanged {
            agent_id: agent.id.clone(),
            role: agent.role.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.map(str::to_string),
        });
    }

    fn refresh_gauges(&self) {
        metrics::record_colony_risk(self.state.risk_level.load());
        metrics::record_worker_count(self.capital.active_workers());
        metrics::record_open_positions(self.state.open_positions.len());
        metrics::record_realized_profit(self.state.realized_profit.load());

        // Wallet values track remaining allocation plus held position cost
        let agents = self.agents.lock();
        for agent in agents.values() {
            if !agent.role.is_trading() {
                continue;
            }
            let held: f64 = agent
                .open_positions
                .iter()
                .filter_map(|pid| self.state.open_positions.get(pid))
                .map(|p| p.size * p.entry_price)
                .sum();
            if let Some(mut wallet) = self.state.wallets.get_mut(&agent.id) {
                wallet.balance = agent.allocated_capital;
                wallet.value = agent.allocated_capital + held;
            }
        }
    }
}
