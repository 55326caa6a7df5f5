//! Performance Monitor
//!
//! Rolling success-rate / execution-time / gas metrics over a configured
//! window, driving worker autoscaling and advisory alerts:
//! - Scale down when the success rate drops below the low threshold, at
//!   most once per min interval
//! - Scale up when it clears the high threshold, at most once per max
//!   interval
//! - Worker targets always clamped to the configured bounds
//! - Alerts are advisory and never mutate agent state

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::PerformanceMonitorConfig;
use crate::telemetry::{Alert, AlertManager};
use crate::utils::helpers::current_timestamp_millis;

/// One finished trade, as the monitor sees it
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub timestamp: i64,
    pub success: bool,
    pub execution_time_ms: u64,
    pub gas_fee: f64,
    pub profit: f64,
}

/// Aggregates over a trailing window
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub success_rate: f64,
    pub loss_rate: f64,
    pub avg_execution_time_ms: u64,
    pub avg_gas_fee: f64,
    pub total_trades: u64,
    pub successful_trades: u64,
    pub failed_trades: u64,
    pub total_profit: f64,
}

/// Shared rolling log of trade outcomes. Written by the coordinator,
/// read by the performance monitor and the reinvestment circuit breaker.
#[derive(Default)]
pub struct TradeLog {
    records: Mutex<VecDeque<TradeRecord>>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: TradeRecord) {
        self.records.lock().push_back(record);
    }

    pub fn prune(&self, window_hours: i64) {
        let cutoff = current_timestamp_millis() - window_hours * 3_600_000;
        let mut records = self.records.lock();
        while records.front().map(|r| r.timestamp < cutoff).unwrap_or(false) {
            records.pop_front();
        }
    }

    /// Aggregate over the trailing `window_hours`.
    pub fn metrics_over(&self, window_hours: i64) -> PerformanceMetrics {
        let cutoff = current_timestamp_millis() - window_hours * 3_600_000;
        let records = self.records.lock();
        let recent: Vec<&TradeRecord> =
            records.iter().filter(|r| r.timestamp >= cutoff).collect();

        if recent.is_empty() {
            return PerformanceMetrics {
                success_rate: 1.0,
                ..Default::default()
            };
        }

        let total = recent.len() as u64;
        let successful = recent.iter().filter(|r| r.success).count() as u64;
        let losing = recent.iter().filter(|r| r.profit < 0.0).count() as u64;

        PerformanceMetrics {
            success_rate: successful as f64 / total as f64,
            loss_rate: losing as f64 / total as f64,
            avg_execution_time_ms: recent.iter().map(|r| r.execution_time_ms).sum::<u64>()
                / total,
            avg_gas_fee: recent.iter().map(|r| r.gas_fee).sum::<f64>() / total as f64,
            total_trades: total,
            successful_trades: successful,
            failed_trades: total - successful,
            total_profit: recent.iter().map(|r| r.profit).sum(),
        }
    }
}

/// Direction and size of a worker count change
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingDecision {
    pub current_workers: usize,
    pub target_workers: usize,
    pub reason: String,
}

pub struct PerformanceMonitor {
    config: PerformanceMonitorConfig,
    trade_log: Arc<TradeLog>,
    alerts: Arc<AlertManager>,
    last_scale_down: Mutex<Option<Instant>>,
    last_scale_up: Mutex<Option<Instant>>,
}

impl PerformanceMonitor {
    pub fn new(
        config: PerformanceMonitorConfig,
        trade_log: Arc<TradeLog>,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            config,
            trade_log,
            alerts,
            last_scale_down: Mutex::new(None),
            last_scale_up: Mutex::new(None),
        }
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.trade_log.metrics_over(self.config.metrics_window_hours)
    }

    /// Evaluate scaling for the current worker count. Alerts fire here as
    /// a side effect but never influence the returned decision.
    pub async fn tick(&self, current_workers: usize) -> Option<ScalingDecision> {
        self.trade_log.prune(self.config.metrics_window_hours);
        let metrics = self.metrics();

        self.check_alerts(&metrics).await;

        if metrics.total_trades == 0 {
            return None;
        }

        let mut target = current_workers;
        let mut reason = String::new();

        if metrics.success_rate < self.config.success_rate_threshold_low {
            if !self.interval_elapsed(&self.last_scale_down, self.config.min_scale_interval_mins) {
                debug!("Scale-down suppressed by min interval");
                return None;
            }
            target = (current_workers as f64 * self.config.scale_down_factor) as usize;
            reason = format!(
                "low success rate: {:.1}%",
                metrics.success_rate * 100.0
            );
        } else if metrics.success_rate > self.config.success_rate_threshold_high {
            if !self.interval_elapsed(&self.last_scale_up, self.config.max_scale_interval_mins) {
                debug!("Scale-up suppressed by max interval");
                return None;
            }
            target = ((current_workers as f64 * self.config.scale_up_factor) as usize)
                .max(current_workers + 1);
            reason = format!(
                "high success rate: {:.1}%",
                metrics.success_rate * 100.0
            );
        }

        target = target.clamp(self.config.min_workers, self.config.max_workers);
        if target == current_workers {
            return None;
        }

        if target < current_workers {
            *self.last_scale_down.lock() = Some(Instant::now());
        } else {
            *self.last_scale_up.lock() = Some(Instant::now());
        }

        info!(
            "Scaling decision: {} -> {} workers ({})",
            current_workers, target, reason
        );
        Some(ScalingDecision {
            current_workers,
            target_workers: target,
            reason,
        })
    }

    fn interval_elapsed(&self, last: &Mutex<Option<Instant>>, interval_mins: i64) -> bool {
        last.lock()
            .map(|at| at.elapsed().as_secs() >= interval_mins as u64 * 60)
            .unwrap_or(true)
    }

    async fn check_alerts(&self, metrics: &PerformanceMetrics) {
        if metrics.total_trades == 0 {
            return;
        }
        if metrics.avg_execution_time_ms > self.config.max_avg_execution_time_ms {
            self.alerts
                .send(Alert::warning(
                    "slow execution",
                    format!(
                        "average execution time {} ms exceeds {} ms budget",
                        metrics.avg_execution_time_ms, self.config.max_avg_execution_time_ms
                    ),
                ))
                .await;
        }
        if metrics.avg_gas_fee > self.config.max_avg_gas_fee {
            self.alerts
                .send(Alert::warning(
                    "high gas",
                    format!(
                        "average gas fee {:.4} SOL exceeds {:.4} SOL budget",
                        metrics.avg_gas_fee, self.config.max_avg_gas_fee
                    ),
                ))
                .await;
        }
    }
}
