//! Colony Agents
//!
//! One record per agent. Trading agents (princess, worker) carry a state
//! machine, an allocation and at most one open position; drones and
//! sentries are capital-free scouts.

use std::collections::HashSet;

use crate::colony::state_machine::{WorkerState, WorkerStateMachine};
use crate::utils::types::Role;

pub struct Agent {
    pub id: String,
    pub role: Role,
    pub machine: WorkerStateMachine,
    /// Id of the capital allocation backing this agent, if any
    pub allocation_id: Option<String>,
    pub allocated_capital: f64,
    pub open_positions: HashSet<String>,
}

impl Agent {
    pub fn new(role: Role) -> Self {
        Self {
            id: format!("{}-{}", role, &uuid::Uuid::new_v4().to_string()[..8]),
            role,
            machine: WorkerStateMachine::new(),
            allocation_id: None,
            allocated_capital: 0.0,
            open_positions: HashSet::new(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.machine.current_state()
    }

    /// Idle trading agents with capital can open a position
    pub fn ready_to_trade(&self) -> bool {
        self.role.is_trading()
            && self.state() == WorkerState::Idle
            && self.allocation_id.is_some()
            && self.open_positions.is_empty()
    }

    /// Retirement requires zero open positions
    pub fn can_retire(&self) -> bool {
        self.open_positions.is_empty()
            && matches!(self.state(), WorkerState::Idle | WorkerState::Closing)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.role, self.id)
    }
}
