//! Capital Manager
//!
//! Tracks total colony capital and enforces per-agent budgets and worker
//! count bounds. The ledger is the system's sole hard consistency
//! boundary: every allocation and release is one atomic transaction behind
//! a single mutex, and `allocated + reserve + available == total` holds
//! after every operation.

use parking_lot::Mutex;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::CapitalManagerConfig;
use crate::network::event_bus::ColonyEvent;
use crate::telemetry::metrics;
use crate::utils::types::Role;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DenialReason {
    #[error("worker limit reached ({active}/{max})")]
    WorkerLimitReached { active: usize, max: usize },
    #[error("requested {requested} exceeds worker budget {budget}")]
    BudgetExceeded { requested: Decimal, budget: Decimal },
    #[error("requested {requested} exceeds deployable capital {deployable}")]
    InsufficientCapital {
        requested: Decimal,
        deployable: Decimal,
    },
    #[error("role {0} does not hold trading capital")]
    NonTradingRole(Role),
}

/// A granted slice of colony capital
#[derive(Debug, Clone)]
pub struct Allocation {
    pub id: String,
    pub agent_id: String,
    pub role: Role,
    pub amount: Decimal,
    pub granted_at: i64,
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSnapshot {
    pub total: Decimal,
    pub reserve: Decimal,
    pub allocated: Decimal,
    pub available: Decimal,
}

impl LedgerSnapshot {
    pub fn conserved(&self) -> bool {
        self.allocated + self.reserve + self.available == self.total
    }
}

/// Everything the ledger mutex guards: balances and the live allocations
struct LedgerInner {
    total: Decimal,
    reserve: Decimal,
    allocated: Decimal,
    available: Decimal,
    allocations: HashMap<String, Allocation>,
}

impl LedgerInner {
    fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            total: self.total,
            reserve: self.reserve,
            allocated: self.allocated,
            available: self.available,
        }
    }

    fn active_workers(&self) -> usize {
        self.allocations
            .values()
            .filter(|a| a.role.is_trading())
            .count()
    }
}

pub struct CapitalManager {
    config: CapitalManagerConfig,
    inner: Mutex<LedgerInner>,
    event_tx: broadcast::Sender<ColonyEvent>,
}

impl CapitalManager {
    pub fn new(config: CapitalManagerConfig, event_tx: broadcast::Sender<ColonyEvent>) -> Self {
        let total = Decimal::from_f64(config.initial_capital).unwrap_or_default();
        let reserve = Decimal::from_f64(config.reserve_floor).unwrap_or_default();

        let inner = LedgerInner {
            total,
            reserve,
            allocated: Decimal::ZERO,
            available: total - reserve,
            allocations: HashMap::new(),
        };

        info!(
            "Capital manager initialized: total {}, reserve {}",
            inner.total, inner.reserve
        );

        Self {
            config,
            inner: Mutex::new(inner),
            event_tx,
        }
    }

    /// Request capital for an agent. The whole check-and-commit runs under
    /// the ledger mutex so concurrent requests can never jointly overcommit.
    pub fn request_allocation(
        &self,
        agent_id: &str,
        role: Role,
        amount: f64,
    ) -> Result<Allocation, DenialReason> {
        let amount = Decimal::from_f64(amount).unwrap_or_default();
        let budget = Decimal::from_f64(self.config.worker_ant_budget).unwrap_or_default();

        if !role.is_trading() {
            return Err(DenialReason::NonTradingRole(role));
        }

        let mut inner = self.inner.lock();

        let active = inner.active_workers();
        if active >= self.config.max_active_workers {
            return Err(DenialReason::WorkerLimitReached {
                active,
                max: self.config.max_active_workers,
            });
        }

        if amount > budget {
            return Err(DenialReason::BudgetExceeded {
                requested: amount,
                budget,
            });
        }

        if amount > inner.available {
            return Err(DenialReason::InsufficientCapital {
                requested: amount,
                deployable: inner.available,
            });
        }

        inner.available -= amount;
        inner.allocated += amount;

        let allocation = Allocation {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            role,
            amount,
            granted_at: chrono::Utc::now().timestamp_millis(),
        };
        inner
            .allocations
            .insert(allocation.id.clone(), allocation.clone());

        debug_assert!(inner.snapshot().conserved());
        self.publish_ledger(&inner);
        drop(inner);

        let _ = self.event_tx.send(ColonyEvent::CapitalAllocated {
            agent_id: agent_id.to_string(),
            amount: allocation.amount.to_f64().unwrap_or(0.0),
        });
        debug!("Allocated {} to agent {}", allocation.amount, agent_id);
        Ok(allocation)
    }

    /// Return an allocation to the pool, folding in realized PnL.
    pub fn release(&self, allocation_id: &str, realized_pnl: f64) -> Option<Decimal> {
        let pnl = Decimal::from_f64(realized_pnl).unwrap_or_default();
        let mut inner = self.inner.lock();

        let allocation = inner.allocations.remove(allocation_id)?;
        inner.allocated -= allocation.amount;
        inner.total += pnl;
        inner.available += allocation.amount + pnl;

        debug_assert!(inner.snapshot().conserved());
        self.publish_ledger(&inner);
        let reclaimed = allocation.amount + pnl;
        drop(inner);

        let _ = self.event_tx.send(ColonyEvent::CapitalReleased {
            agent_id: allocation.agent_id.clone(),
            amount: allocation.amount.to_f64().unwrap_or(0.0),
            pnl: realized_pnl,
        });
        info!(
            "Released {} from agent {} (pnl {})",
            allocation.amount, allocation.agent_id, pnl
        );
        Some(reclaimed)
    }

    /// Move deployable capital into the reserve (reinvestment sweep).
    pub fn sweep_to_reserve(&self, amount: f64) -> Decimal {
        let amount = Decimal::from_f64(amount).unwrap_or_default();
        let mut inner = self.inner.lock();

        let moved = amount.min(inner.available).max(Decimal::ZERO);
        inner.available -= moved;
        inner.reserve += moved;

        debug_assert!(inner.snapshot().conserved());
        self.publish_ledger(&inner);
        moved
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn active_workers(&self) -> usize {
        self.inner.lock().active_workers()
    }

    pub fn allocation_for_agent(&self, agent_id: &str) -> Option<Allocation> {
        self.inner
            .lock()
            .allocations
            .values()
            .find(|a| a.agent_id == agent_id)
            .cloned()
    }

    pub fn min_active_workers(&self) -> usize {
        self.config.min_active_workers
    }

    pub fn max_active_workers(&self) -> usize {
        self.config.max_active_workers
    }

    pub fn worker_budget(&self) -> f64 {
        self.config.worker_ant_budget
    }

    fn publish_ledger(&self, inner: &LedgerInner) {
        metrics::record_ledger(
            inner.total.to_f64().unwrap_or(0.0),
            inner.allocated.to_f64().unwrap_or(0.0),
            inner.reserve.to_f64().unwrap_or(0.0),
            inner.available.to_f64().unwrap_or(0.0),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use rust_decimal_macros::dec;

    fn manager() -> CapitalManager {
        let (tx, _rx) = broadcast::channel(64);
        CapitalManager::new(AppConfig::default().capital_manager, tx)
    }

    #[test]
    fn test_ledger_starts_conserved() {
        let manager = manager();
        let snap = manager.snapshot();
        assert!(snap.conserved());
        assert_eq!(snap.total, dec!(100));
        assert_eq!(snap.reserve, dec!(20));
        assert_eq!(snap.available, dec!(80));
    }

    #[test]
    fn test_allocation_preserves_conservation() {
        let manager = manager();
        let allocation = manager
            .request_allocation("w1", Role::Worker, 5.0)
            .unwrap();
        let snap = manager.snapshot();
        assert!(snap.conserved());
        assert_eq!(snap.allocated, dec!(5));

        manager.release(&allocation.id, 1.5);
        let snap = manager.snapshot();
        assert!(snap.conserved());
        assert_eq!(snap.total, dec!(101.5));
        assert_eq!(snap.allocated, dec!(0));
    }

    #[test]
    fn test_budget_cap_denial() {
        let manager = manager();
        let err = manager
            .request_allocation("w1", Role::Worker, 6.0)
            .unwrap_err();
        assert!(matches!(err, DenialReason::BudgetExceeded { .. }));
    }

    #[test]
    fn test_worker_limit_denial() {
        let manager = manager();
        for i in 0..10 {
            manager
                .request_allocation(&format!("w{}", i), Role::Worker, 5.0)
                .unwrap();
        }
        let err = manager
            .request_allocation("w10", Role::Worker, 5.0)
            .unwrap_err();
        assert!(matches!(err, DenialReason::WorkerLimitReached { .. }));
    }

    #[test]
    fn test_reserve_floor_never_deployed() {
        let (tx, _rx) = broadcast::channel(64);
        let mut config = AppConfig::default().capital_manager;
        config.worker_ant_budget = 50.0;
        config.max_active_workers = 100;
        let manager = CapitalManager::new(config, tx);

        manager.request_allocation("w1", Role::Worker, 50.0).unwrap();
        manager.request_allocation("w2", Role::Worker, 30.0).unwrap();
        // 80 deployable is gone; the 20 reserve is untouchable
        let err = manager
            .request_allocation("w3", Role::Worker, 1.0)
            .unwrap_err();
        assert!(matches!(err, DenialReason::InsufficientCapital { .. }));
        assert!(manager.snapshot().conserved());
    }

    #[test]
    fn test_non_trading_role_denied() {
        let manager = manager();
        let err = manager
            .request_allocation("d1", Role::Drone, 1.0)
            .unwrap_err();
        assert!(matches!(err, DenialReason::NonTradingRole(Role::Drone)));
    }

    #[test]
    fn test_sweep_to_reserve_conserves() {
        let manager = manager();
        let moved = manager.sweep_to_reserve(10.0);
        assert_eq!(moved, dec!(10));
        let snap = manager.snapshot();
        assert!(snap.conserved());
        assert_eq!(snap.reserve, dec!(30));
    }

    #[test]
    fn test_concurrent_requests_never_overcommit() {
        use std::sync::Arc;
        let manager = Arc::new(manager());

        // 16 threads racing for 80 deployable at 5 each: at most 10 grants
        // (worker cap), and conservation must hold throughout
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    manager
                        .request_allocation(&format!("w{}", i), Role::Worker, 5.0)
                        .is_ok()
                })
            })
            .collect();

        let granted = handles
            .into_iter()
            .filter(|h| h.join().unwrap())
            .count();

        assert!(granted <= 10);
        let snap = manager.snapshot();
        assert!(snap.conserved());
        assert_eq!(snap.allocated, Decimal::from(granted as i64 * 5));
    }
}
