//! Shared State Module
//!
//! Thread-safe colony state using lock-free structures where possible.
//! Writers are the coordinator loop and the managers it drives; the status
//! API and performance monitor only read.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::colony::state_machine::QueenState;
use crate::utils::helpers::current_timestamp_millis;
use crate::utils::types::{Position, WalletSummary};

/// Atomic floating point wrapper using u64 bit representation
#[derive(Debug, Default)]
pub struct AtomicF64 {
    inner: AtomicU64,
}

impl AtomicF64 {
    pub fn new(val: f64) -> Self {
        Self {
            inner: AtomicU64::new(val.to_bits()),
        }
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.inner.load(Ordering::SeqCst))
    }

    pub fn store(&self, val: f64) {
        self.inner.store(val.to_bits(), Ordering::SeqCst);
    }

    pub fn add(&self, val: f64) {
        // CAS loop; contention here is low (single coordinator writer)
        let mut current = self.inner.load(Ordering::SeqCst);
        loop {
            let next = (f64::from_bits(current) + val).to_bits();
            match self.inner.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Central shared state store
pub struct SharedState {
    // Risk
    pub risk_level: AtomicF64,
    pub queen_state: RwLock<QueenState>,

    // Trading counters
    pub total_trades: AtomicU64,
    pub successful_trades: AtomicU64,
    pub emergency_exits: AtomicU64,
    pub last_trade: AtomicI64,

    // P&L (display values; the capital ledger is authoritative)
    pub realized_profit: AtomicF64,
    pub total_gas_spent: AtomicF64,

    // Positions, keyed by position id
    pub open_positions: DashMap<String, Position>,

    // Wallets for the status API, keyed by agent id
    pub wallets: DashMap<String, WalletSummary>,

    // System
    pub error_count: AtomicU64,
    pub started_at: AtomicI64,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            risk_level: AtomicF64::new(0.0),
            queen_state: RwLock::new(QueenState::Initializing),
            total_trades: AtomicU64::new(0),
            successful_trades: AtomicU64::new(0),
            emergency_exits: AtomicU64::new(0),
            last_trade: AtomicI64::new(0),
            realized_profit: AtomicF64::new(0.0),
            total_gas_spent: AtomicF64::new(0.0),
            open_positions: DashMap::new(),
            wallets: DashMap::new(),
            error_count: AtomicU64::new(0),
            started_at: AtomicI64::new(current_timestamp_millis()),
        }
    }

    pub fn record_trade(&self, success: bool, gas_fee: f64) {
        self.total_trades.fetch_add(1, Ordering::SeqCst);
        if success {
            self.successful_trades.fetch_add(1, Ordering::SeqCst);
        }
        self.total_gas_spent.add(gas_fee);
        self.last_trade
            .store(current_timestamp_millis(), Ordering::SeqCst);
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_trades.load(Ordering::SeqCst);
        if total == 0 {
            return 1.0;
        }
        self.successful_trades.load(Ordering::SeqCst) as f64 / total as f64
    }

    pub fn bot_status(&self) -> String {
        format!("{}", *self.queen_state.read())
    }

    pub fn active_trades(&self) -> usize {
        self.open_positions.len()
    }

    pub fn increment_error_count(&self) {
        self.error_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f64_add() {
        let v = AtomicF64::new(1.5);
        v.add(2.25);
        assert!((v.load() - 3.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate() {
        let state = SharedState::new();
        state.record_trade(true, 0.001);
        state.record_trade(true, 0.001);
        state.record_trade(false, 0.001);
        assert!((state.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_with_no_trades() {
        let state = SharedState::new();
        assert_eq!(state.success_rate(), 1.0);
    }
}
