//! Reinvestment Manager
//!
//! Periodically sweeps realized profit into reserve vs. reinvestment:
//! - Split by the configured reinvestment / reserve rates
//! - Reinvestment capped per rolling UTC day and per allocation
//! - Circuit breaker: poor trailing performance routes the entire sweep
//!   to reserve

use parking_lot::Mutex;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::capital::CapitalManager;
use crate::config::ReinvestmentConfig;
use crate::monitor::TradeLog;
use crate::network::event_bus::ColonyEvent;

/// Outcome of one rebalance pass
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub profit: f64,
    pub reinvested: f64,
    pub reserved: f64,
    pub breaker_tripped: bool,
}

struct SweepState {
    /// Realized profit already processed by earlier sweeps
    swept_profit: Decimal,
    /// Rolling-day reinvestment accounting
    day: i64,
    reinvested_today: f64,
}

pub struct ReinvestmentManager {
    config: ReinvestmentConfig,
    capital: Arc<CapitalManager>,
    trade_log: Arc<TradeLog>,
    event_tx: broadcast::Sender<ColonyEvent>,
    state: Mutex<SweepState>,
}

impl ReinvestmentManager {
    pub fn new(
        config: ReinvestmentConfig,
        capital: Arc<CapitalManager>,
        trade_log: Arc<TradeLog>,
        event_tx: broadcast::Sender<ColonyEvent>,
    ) -> Self {
        Self {
            config,
            capital,
            trade_log,
            event_tx,
            state: Mutex::new(SweepState {
                swept_profit: Decimal::ZERO,
                day: today(),
                reinvested_today: 0.0,
            }),
        }
    }

    pub fn check_interval_secs(&self) -> u64 {
        self.config.check_interval_secs
    }

    /// One rebalance pass over realized profit since the last run.
    ///
    /// `total_realized_profit` is the cumulative realized PnL; the manager
    /// keeps its own high-water mark so each unit of profit is swept once.
    pub fn rebalance(&self, total_realized_profit: f64) -> Option<SweepOutcome> {
        let total = Decimal::from_f64(total_realized_profit).unwrap_or_default();
        let mut state = self.state.lock();

        let day = today();
        if day != state.day {
            state.day = day;
            state.reinvested_today = 0.0;
        }

        let fresh = total - state.swept_profit;
        if fresh <= Decimal::ZERO {
            return None;
        }
        state.swept_profit = total;
        let fresh = fresh.to_f64().unwrap_or(0.0);

        let metrics = self
            .trade_log
            .metrics_over(self.config.performance_window_hours);

        let breaker_tripped = metrics.total_trades > 0
            && (metrics.success_rate < self.config.min_success_rate
                || metrics.loss_rate > self.config.max_loss_rate);

        let (reinvested, reserved) = if breaker_tripped {
            warn!(
                "Reinvestment breaker tripped (success {:.1}%, loss {:.1}%), routing {:.4} to reserve",
                metrics.success_rate * 100.0,
                metrics.loss_rate * 100.0,
                fresh
            );
            (0.0, fresh)
        } else {
            let mut reinvested = fresh * self.config.reinvestment_rate;

            // Per-allocation and per-day caps; whatever is trimmed off the
            // reinvestment side goes to reserve instead
            reinvested = reinvested.min(self.config.max_position_size);
            let day_headroom =
                (self.config.max_daily_reinvestment - state.reinvested_today).max(0.0);
            reinvested = reinvested.min(day_headroom);

            (reinvested, fresh - reinvested)
        };

        state.reinvested_today += reinvested;
        drop(state);

        if reserved > 0.0 {
            self.capital.sweep_to_reserve(reserved);
        }

        info!(
            "Profit sweep: {:.4} realized, {:.4} reinvested, {:.4} to reserve",
            fresh, reinvested, reserved
        );
        let _ = self.event_tx.send(ColonyEvent::ProfitSwept {
            reinvested,
            reserved,
        });

        Some(SweepOutcome {
            profit: fresh,
            reinvested,
            reserved,
            breaker_tripped,
        })
    }
}

fn today() -> i64 {
    chrono::Utc::now().timestamp() / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::monitor::TradeRecord;
    use crate::utils::helpers::current_timestamp_millis;

    fn setup(config: ReinvestmentConfig) -> (ReinvestmentManager, Arc<TradeLog>) {
        let (tx, _rx) = broadcast::channel(64);
        let capital = Arc::new(CapitalManager::new(
            AppConfig::default().capital_manager,
            tx.clone(),
        ));
        let log = Arc::new(TradeLog::new());
        (
            ReinvestmentManager::new(config, capital, log.clone(), tx),
            log,
        )
    }

    fn healthy_trades(log: &TradeLog) {
        for _ in 0..10 {
            log.record(TradeRecord {
                timestamp: current_timestamp_millis(),
                success: true,
                execution_time_ms: 40,
                gas_fee: 0.001,
                profit: 0.5,
            });
        }
    }

    #[test]
    fn test_split_follows_configured_rates() {
        let (manager, log) = setup(AppConfig::default().reinvestment);
        healthy_trades(&log);

        let outcome = manager.rebalance(10.0).unwrap();
        assert!((outcome.reinvested - 7.0).abs() < 1e-9);
        assert!((outcome.reserved - 3.0).abs() < 1e-9);
        assert!(!outcome.breaker_tripped);
    }

    #[test]
    fn test_profit_swept_only_once() {
        let (manager, log) = setup(AppConfig::default().reinvestment);
        healthy_trades(&log);

        assert!(manager.rebalance(10.0).is_some());
        // Same cumulative total: nothing fresh to sweep
        assert!(manager.rebalance(10.0).is_none());
        // New profit sweeps the delta only
        let outcome = manager.rebalance(12.0).unwrap();
        assert!((outcome.profit - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_breaker_routes_everything_to_reserve() {
        let (manager, log) = setup(AppConfig::default().reinvestment);
        // 40% success rate is below the 0.5 floor
        for i in 0..10 {
            log.record(TradeRecord {
                timestamp: current_timestamp_millis(),
                success: i < 4,
                execution_time_ms: 40,
                gas_fee: 0.001,
                profit: if i < 4 { 0.5 } else { -0.5 },
            });
        }

        let outcome = manager.rebalance(10.0).unwrap();
        assert!(outcome.breaker_tripped);
        assert_eq!(outcome.reinvested, 0.0);
        assert!((outcome.reserved - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_loss_rate_alone_trips_breaker() {
        let mut config = AppConfig::default().reinvestment;
        config.max_loss_rate = 0.2;
        let (manager, log) = setup(config);
        // All succeed but 30% lose money
        for i in 0..10 {
            log.record(TradeRecord {
                timestamp: current_timestamp_millis(),
                success: true,
                execution_time_ms: 40,
                gas_fee: 0.001,
                profit: if i < 3 { -0.5 } else { 0.5 },
            });
        }

        let outcome = manager.rebalance(5.0).unwrap();
        assert!(outcome.breaker_tripped);
    }

    #[test]
    fn test_per_allocation_cap() {
        let mut config = AppConfig::default().reinvestment;
        config.max_position_size = 2.0;
        let (manager, log) = setup(config);
        healthy_trades(&log);

        let outcome = manager.rebalance(10.0).unwrap();
        assert!((outcome.reinvested - 2.0).abs() < 1e-9);
        assert!((outcome.reserved - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_cap_accumulates() {
        let mut config = AppConfig::default().reinvestment;
        config.max_daily_reinvestment = 8.0;
        let (manager, log) = setup(config);
        healthy_trades(&log);

        let first = manager.rebalance(10.0).unwrap();
        assert!((first.reinvested - 7.0).abs() < 1e-9);

        // Another 10 of profit: only 1.0 of daily headroom remains
        let second = manager.rebalance(20.0).unwrap();
        assert!((second.reinvested - 1.0).abs() < 1e-9);
        assert!((second.reserved - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_fresh_profit_ignored() {
        let (manager, log) = setup(AppConfig::default().reinvestment);
        healthy_trades(&log);
        manager.rebalance(10.0).unwrap();
        assert!(manager.rebalance(8.0).is_none());
    }
}
