//! Prometheus metrics export

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub fn init_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    info!("Prometheus metrics server started on {}", addr);
    Ok(())
}

fn register_metrics() {
    // Colony metrics
    describe_gauge!("antbot_colony_risk_level", "Aggregate colony risk level");
    describe_gauge!("antbot_active_workers", "Number of active worker agents");
    describe_gauge!("antbot_open_positions", "Number of open positions");

    // Capital metrics
    describe_gauge!("antbot_capital_total", "Total colony capital in SOL");
    describe_gauge!("antbot_capital_allocated", "Capital allocated to agents");
    describe_gauge!("antbot_capital_reserve", "Capital held in reserve");
    describe_gauge!("antbot_capital_available", "Capital available for allocation");

    // Trade metrics
    describe_counter!("antbot_trades_total", "Total number of trade submissions");
    describe_counter!("antbot_trades_success", "Number of successful trades");
    describe_counter!("antbot_trades_failed", "Number of failed trades");
    describe_counter!("antbot_emergency_exits_total", "Number of emergency exits");
    describe_histogram!("antbot_execution_time_ms", "Trade execution latency");
    describe_histogram!("antbot_priority_fee", "Priority fee paid per trade");

    // RPC metrics
    describe_gauge!("antbot_rpc_circuit_open", "1 when a provider circuit is open");
    describe_histogram!("antbot_rpc_latency_ms", "RPC request latency per provider");

    // Risk metrics
    describe_counter!("antbot_rug_alerts_total", "Rug verdicts above threshold");
    describe_gauge!("antbot_profit_realized", "Total realized profit in SOL");
}

pub fn record_colony_risk(level: f64) {
    gauge!("antbot_colony_risk_level").set(level);
}

pub fn record_worker_count(count: usize) {
    gauge!("antbot_active_workers").set(count as f64);
}

pub fn record_open_positions(count: usize) {
    gauge!("antbot_open_positions").set(count as f64);
}

pub fn record_ledger(total: f64, allocated: f64, reserve: f64, available: f64) {
    gauge!("antbot_capital_total").set(total);
    gauge!("antbot_capital_allocated").set(allocated);
    gauge!("antbot_capital_reserve").set(reserve);
    gauge!("antbot_capital_available").set(available);
}

pub fn record_trade(success: bool, execution_time_ms: u64, priority_fee: u64) {
    counter!("antbot_trades_total").increment(1);
    if success {
        counter!("antbot_trades_success").increment(1);
    } else {
        counter!("antbot_trades_failed").increment(1);
    }
    histogram!("antbot_execution_time_ms").record(execution_time_ms as f64);
    histogram!("antbot_priority_fee").record(priority_fee as f64);
}

pub fn record_emergency_exit() {
    counter!("antbot_emergency_exits_total").increment(1);
}

pub fn record_rpc_latency(provider: &str, latency_ms: f64) {
    histogram!("antbot_rpc_latency_ms", "provider" => provider.to_string()).record(latency_ms);
}

pub fn record_circuit_state(provider: &str, open: bool) {
    gauge!("antbot_rpc_circuit_open", "provider" => provider.to_string())
        .set(if open { 1.0 } else { 0.0 });
}

pub fn record_rug_alert() {
    counter!("antbot_rug_alerts_total").increment(1);
}

pub fn record_realized_profit(total: f64) {
    gauge!("antbot_profit_realized").set(total);
}
