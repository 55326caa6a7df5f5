//! Transaction Handler
//!
//! Builds, prioritizes, bundles and submits trades through the RPC
//! gateway:
//! - Retry with fixed delay, re-selecting the provider every attempt
//! - MEV-protected bundles with single-transaction fallback
//! - Emergency exits with widened slippage, doubled gas and a hard deadline
//! - Every attempt reported to the gateway and the metrics stream

use anyhow::{Context, Result};
use solana_sdk::signature::Keypair;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::SharedConfig;
use crate::execution::bundler::group_into_bundles;
use crate::execution::fees::PriorityFeeEstimator;
use crate::execution::tx_builder::TransactionBuilder;
use crate::network::event_bus::ColonyEvent;
use crate::network::gateway::{ProviderHandle, RpcGateway};
use crate::state::SharedState;
use crate::telemetry::metrics;
use crate::utils::helpers::elapsed_ms;
use crate::utils::types::{OperationClass, TradeIntent, TxResult, Urgency};

pub struct TransactionHandler {
    config: SharedConfig,
    gateway: Arc<RpcGateway>,
    fees: Arc<PriorityFeeEstimator>,
    builder: TransactionBuilder,
    wallet: Arc<Keypair>,
    state: Arc<SharedState>,
    event_tx: broadcast::Sender<ColonyEvent>,
    tx_semaphore: Arc<Semaphore>,
    running: Arc<tokio::sync::RwLock<bool>>,
}

impl TransactionHandler {
    pub fn new(
        config: SharedConfig,
        gateway: Arc<RpcGateway>,
        wallet: Arc<Keypair>,
        state: Arc<SharedState>,
        event_tx: broadcast::Sender<ColonyEvent>,
    ) -> Result<Self> {
        let snapshot = config.load_full();
        let fees = Arc::new(PriorityFeeEstimator::new(&snapshot.transaction_handler));
        let builder = TransactionBuilder::new(&snapshot.transaction_handler.swap_program_id)?;
        let tx_semaphore = Arc::new(Semaphore::new(snapshot.colony.max_concurrent_transactions));

        Ok(Self {
            config,
            gateway,
            fees,
            builder,
            wallet,
            state,
            event_tx,
            tx_semaphore,
            running: Arc::new(tokio::sync::RwLock::new(false)),
        })
    }

    pub fn fees(&self) -> Arc<PriorityFeeEstimator> {
        self.fees.clone()
    }

    /// Submit a single trade. Provider exhaustion is the only hard error;
    /// retry exhaustion and emergency deadlines come back as a failed
    /// [`TxResult`], never silently dropped.
    pub async fn submit(&self, intent: TradeIntent) -> Result<TxResult> {
        let _permit = self
            .tx_semaphore
            .acquire()
            .await
            .context("Transaction semaphore closed")?;

        let snapshot = self.config.load_full();
        let handler_cfg = &snapshot.transaction_handler;

        let mut intent = intent;
        let deadline = match intent.urgency {
            Urgency::Emergency => {
                // Emergency exits trade cost for certainty
                intent.slippage_pct = handler_cfg.emergency.max_slippage_pct;
                Some(Instant::now() + Duration::from_secs(handler_cfg.emergency.timeout_seconds))
            }
            Urgency::Normal => None,
        };

        let priority_fee = self.fees.fee_for(intent.urgency);
        let start = Instant::now();
        let mut attempts = 0;
        let mut last_error = None;
        let mut last_provider = String::new();

        while attempts < handler_cfg.max_retries {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break;
                }
            }
            attempts += 1;

            // Re-select every attempt so an opened circuit fails us over
            let handle = self.gateway.select(OperationClass::Trading)?;
            last_provider = handle.name.clone();

            match self
                .attempt(
                    &handle,
                    &intent,
                    priority_fee,
                    deadline,
                    snapshot.paper_trading,
                    handle.transaction_timeout,
                )
                .await
            {
                Ok(signature) => {
                    let result = TxResult {
                        intent_id: intent.id.clone(),
                        signature: Some(signature),
                        success: true,
                        error: None,
                        execution_time_ms: elapsed_ms(start),
                        priority_fee,
                        provider: handle.name.clone(),
                        attempts,
                        epoch: intent.epoch,
                    };
                    if !snapshot.paper_trading {
                        self.gateway
                            .report_outcome(&handle.name, true, result.execution_time_ms);
                    }
                    self.finish(&result, snapshot.paper_trading);
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "Submission attempt {} via '{}' failed: {}",
                        attempts, handle.name, e
                    );
                    if !snapshot.paper_trading {
                        self.gateway
                            .report_outcome(&handle.name, false, elapsed_ms(start));
                    }
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(handler_cfg.retry_delay_ms)).await;
                }
            }
        }

        let error = match (intent.urgency, deadline) {
            (Urgency::Emergency, Some(deadline)) if Instant::now() >= deadline => {
                error!("Emergency exit for intent {} timed out", intent.id);
                "emergency exit deadline exceeded".to_string()
            }
            _ => last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "max retries exceeded".to_string()),
        };

        let result = TxResult {
            intent_id: intent.id.clone(),
            signature: None,
            success: false,
            error: Some(error),
            execution_time_ms: elapsed_ms(start),
            priority_fee,
            provider: last_provider,
            attempts,
            epoch: intent.epoch,
        };
        self.finish(&result, snapshot.paper_trading);
        Ok(result)
    }

    /// Submit a batch with MEV protection. Falls back to single-transaction
    /// submission when no MEV provider is available or bundling is off.
    pub async fn submit_batch(&self, intents: Vec<TradeIntent>) -> Result<Vec<TxResult>> {
        let snapshot = self.config.load_full();
        let handler_cfg = &snapshot.transaction_handler;

        if !handler_cfg.use_mev_protection {
            return self.submit_each(intents).await;
        }

        let handle = match self.gateway.select(OperationClass::Mev) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("No MEV provider available ({}), falling back to single submission", e);
                return self.submit_each(intents).await;
            }
        };

        let mut results = Vec::with_capacity(intents.len());
        for bundle in group_into_bundles(intents, handler_cfg.bundle_size) {
            debug!(
                "Submitting bundle of {} via '{}'",
                bundle.len(),
                handle.name
            );
            for intent in bundle {
                // Bundle members share the provider selection; each still
                // reports its own outcome
                let priority_fee = self.fees.fee_for(intent.urgency);
                let start = Instant::now();
                let outcome = self
                    .attempt(
                        &handle,
                        &intent,
                        priority_fee,
                        None,
                        snapshot.paper_trading,
                        handle.bundle_timeout,
                    )
                    .await;

                let result = match outcome {
                    Ok(signature) => TxResult {
                        intent_id: intent.id.clone(),
                        signature: Some(signature),
                        success: true,
                        error: None,
                        execution_time_ms: elapsed_ms(start),
                        priority_fee,
                        provider: handle.name.clone(),
                        attempts: 1,
                        epoch: intent.epoch,
                    },
                    Err(e) => TxResult {
                        intent_id: intent.id.clone(),
                        signature: None,
                        success: false,
                        error: Some(e.to_string()),
                        execution_time_ms: elapsed_ms(start),
                        priority_fee,
                        provider: handle.name.clone(),
                        attempts: 1,
                        epoch: intent.epoch,
                    },
                };
                if !snapshot.paper_trading {
                    self.gateway.report_outcome(
                        &handle.name,
                        result.success,
                        result.execution_time_ms,
                    );
                }
                self.finish(&result, snapshot.paper_trading);
                results.push(result);
            }
        }
        Ok(results)
    }

    async fn submit_each(&self, intents: Vec<TradeIntent>) -> Result<Vec<TxResult>> {
        let mut results = Vec::with_capacity(intents.len());
        for intent in intents {
            results.push(self.submit(intent).await?);
        }
        Ok(results)
    }

    /// One submission attempt against one provider.
    async fn attempt(
        &self,
        handle: &ProviderHandle,
        intent: &TradeIntent,
        priority_fee: u64,
        deadline: Option<Instant>,
        paper: bool,
        timeout: Duration,
    ) -> Result<String> {
        if paper {
            debug!("Paper trading: simulated fill for intent {}", intent.id);
            return Ok(format!("paper-{}", uuid::Uuid::new_v4()));
        }

        let mut timeout = timeout;
        if let Some(deadline) = deadline {
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }

        let blockhash = tokio::time::timeout(timeout, handle.client.get_latest_blockhash())
            .await
            .context("Blockhash fetch timed out")?
            .context("Failed to get recent blockhash")?;

        let tx = self
            .builder
            .build_swap_transaction(&self.wallet, intent, priority_fee, blockhash)?;

        let signature =
            tokio::time::timeout(timeout, handle.client.send_and_confirm_transaction(&tx))
                .await
                .context("Transaction confirmation timed out")?
                .context("Transaction failed")?;

        Ok(signature.to_string())
    }

    /// Shared bookkeeping for every finished submission.
    fn finish(&self, result: &TxResult, paper: bool) {
        let gas_fee = result.priority_fee as f64 / 1e9;
        self.state.record_trade(result.success, gas_fee);
        metrics::record_trade(result.success, result.execution_time_ms, result.priority_fee);

        if result.success {
            info!(
                "Trade {} confirmed via '{}' in {} ms ({} attempts{})",
                result.intent_id,
                result.provider,
                result.execution_time_ms,
                result.attempts,
                if paper { ", paper" } else { "" }
            );
        } else {
            self.state.increment_error_count();
        }

        let _ = self.event_tx.send(ColonyEvent::TradeExecuted {
            result: result.clone(),
        });
    }

    /// Background sampler feeding the fee estimator from recent network
    /// prioritization fees. Skipped entirely in paper mode.
    pub async fn start_fee_sampler(self: &Arc<Self>) {
        let snapshot = self.config.load_full();
        if snapshot.paper_trading {
            return;
        }
        *self.running.write().await = true;

        let handler = self.clone();
        let interval = Duration::from_secs(snapshot.transaction_handler.fee_update_interval_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while *handler.running.read().await {
                ticker.tick().await;
                let handle = match handler.gateway.select(OperationClass::Monitoring) {
                    Ok(handle) => handle,
                    Err(e) => {
                        debug!("Fee sampler: {}", e);
                        continue;
                    }
                };
                match handle.client.get_recent_prioritization_fees(&[]).await {
                    Ok(fees) => {
                        for fee in fees {
                            handler.fees.record_sample(fee.prioritization_fee);
                        }
                    }
                    Err(e) => debug!("Fee sampler fetch failed: {}", e),
                }
            }
        });
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::network::event_bus::EventBus;
    use arc_swap::ArcSwap;

    fn handler() -> (Arc<TransactionHandler>, EventBus) {
        let mut config = AppConfig::default();
        config.paper_trading = true;
        let config: SharedConfig = Arc::new(ArcSwap::from_pointee(config));
        let gateway = Arc::new(RpcGateway::new(config.clone()));
        let state = Arc::new(SharedState::new());
        let bus = EventBus::new(64);
        let handler = TransactionHandler::new(
            config,
            gateway,
            Arc::new(Keypair::new()),
            state,
            bus.sender(),
        )
        .unwrap();
        (Arc::new(handler), bus)
    }

    fn sell_intent() -> TradeIntent {
        TradeIntent::new(
            "agent",
            "So11111111111111111111111111111111111111112",
            crate::utils::types::TradeSide::Sell,
            1.0,
            0.5,
        )
    }

    #[tokio::test]
    async fn test_paper_submission_succeeds() {
        let (handler, _bus) = handler();
        let result = handler.submit(sell_intent()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert!(result.signature.unwrap().starts_with("paper-"));
    }

    #[tokio::test]
    async fn test_submission_publishes_trade_event() {
        let (handler, bus) = handler();
        let mut rx = bus.subscribe();
        handler.submit(sell_intent()).await.unwrap();
        match rx.recv().await.unwrap() {
            ColonyEvent::TradeExecuted { result } => assert!(result.success),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emergency_overrides_slippage() {
        let (handler, _bus) = handler();
        let mut intent = sell_intent();
        intent.urgency = Urgency::Emergency;
        // Paper mode still exercises the emergency path and deadline setup
        let result = handler.submit(intent).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_batch_submission_covers_all_intents() {
        let (handler, _bus) = handler();
        let results = handler
            .submit_batch(vec![sell_intent(), sell_intent()])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
    }
}
