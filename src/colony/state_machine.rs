//! Colony State Machines
//!
//! Lifecycle machines for the queen and the trading agents:
//! - Queen: Initializing -> Active -> RiskPaused -> Active | Shutdown
//! - Princess/Worker: Idle -> Trading -> Closing -> Idle | Retired
//!
//! Shutdown and Retired are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// Queen lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueenState {
    Initializing,
    Active,
    /// Colony-wide suspension of new trade initiation; open positions
    /// still flow through profit evaluation and emergency exits
    RiskPaused,
    /// Unrecoverable; requires an external restart
    Shutdown,
}

impl fmt::Display for QueenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueenState::Initializing => write!(f, "initializing"),
            QueenState::Active => write!(f, "active"),
            QueenState::RiskPaused => write!(f, "risk_paused"),
            QueenState::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Trading agent lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Trading,
    Closing,
    /// Terminal; capital reclaimed by the capital manager
    Retired,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Trading => write!(f, "trading"),
            WorkerState::Closing => write!(f, "closing"),
            WorkerState::Retired => write!(f, "retired"),
        }
    }
}

/// State transition record
#[derive(Debug, Clone)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
    pub timestamp: i64,
    pub reason: Option<String>,
}

const MAX_HISTORY: usize = 100;

/// Queen state machine
pub struct QueenStateMachine {
    current: QueenState,
    state_entered_at: Instant,
    history: Vec<Transition<QueenState>>,
}

impl QueenStateMachine {
    pub fn new() -> Self {
        Self {
            current: QueenState::Initializing,
            state_entered_at: Instant::now(),
            history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> QueenState {
        self.current
    }

    pub fn time_in_state(&self) -> std::time::Duration {
        self.state_entered_at.elapsed()
    }

    pub fn can_transition_to(&self, target: QueenState) -> bool {
        use QueenState::*;

        match (self.current, target) {
            (Initializing, Active) => true,
            (Initializing, Shutdown) => true,
            (Active, RiskPaused) => true,
            (Active, Shutdown) => true,
            (RiskPaused, Active) => true,
            (RiskPaused, Shutdown) => true,
            // Shutdown is terminal
            _ => false,
        }
    }

    pub fn transition_to(&mut self, target: QueenState, reason: Option<String>) -> bool {
        if !self.can_transition_to(target) {
            warn!("Invalid queen transition: {} -> {}", self.current, target);
            return false;
        }

        info!(
            "Queen transition: {} -> {}{}",
            self.current,
            target,
            reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );

        self.history.push(Transition {
            from: self.current,
            to: target,
            timestamp: chrono::Utc::now().timestamp_millis(),
            reason,
        });
        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
        }

        self.current = target;
        self.state_entered_at = Instant::now();
        true
    }

    pub fn history(&self) -> &[Transition<QueenState>] {
        &self.history
    }

    /// New trade initiation is allowed only while fully active
    pub fn accepting_trades(&self) -> bool {
        self.current == QueenState::Active
    }
}

impl Default for QueenStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-agent trading state machine
pub struct WorkerStateMachine {
    current: WorkerState,
    state_entered_at: Instant,
    history: Vec<Transition<WorkerState>>,
}

impl WorkerStateMachine {
    pub fn new() -> Self {
        Self {
            current: WorkerState::Idle,
            state_entered_at: Instant::now(),
            history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> WorkerState {
        self.current
    }

    pub fn time_in_state(&self) -> std::time::Duration {
        self.state_entered_at.elapsed()
    }

    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        match (self.current, target) {
            (Idle, Trading) => true,
            (Idle, Retired) => true,
            (Trading, Closing) => true,
            (Closing, Idle) => true,
            (Closing, Retired) => true,
            // Retired is terminal; Trading never jumps straight to Idle
            _ => false,
        }
    }

    pub fn transition_to(&mut self, target: WorkerState, reason: Option<String>) -> bool {
        if !self.can_transition_to(target) {
            warn!("Invalid worker transition: {} -> {}", self.current, target);
            return false;
        }

        self.history.push(Transition {
            from: self.current,
            to: target,
            timestamp: chrono::Utc::now().timestamp_millis(),
            reason,
        });
        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
        }

        self.current = target;
        self.state_entered_at = Instant::now();
        true
    }

    pub fn history(&self) -> &[Transition<WorkerState>] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.current == WorkerState::Retired
    }
}

impl Default for WorkerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
