//! Event Bus for Internal Communication
//!
//! Broadcast-based event system for decoupled communication between the
//! colony components and the dashboard push channel.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::utils::types::{RiskVerdict, TxResult};

/// Events broadcast through the colony
#[derive(Debug, Clone)]
pub enum ColonyEvent {
    // Lifecycle
    AgentSpawned {
        agent_id: String,
        role: String,
    },
    AgentStateChanged {
        agent_id: String,
        role: String,
        from: String,
        to: String,
        reason: Option<String>,
    },
    AgentRetired {
        agent_id: String,
        reclaimed_capital: f64,
    },

    // Trading
    TradeExecuted {
        result: TxResult,
    },
    TierTriggered {
        position_id: String,
        tier: usize,
        amount: f64,
    },
    PositionOpened {
        position_id: String,
        token_address: String,
        size: f64,
        price: f64,
    },
    PositionClosed {
        position_id: String,
        pnl: f64,
    },

    // Risk
    RugVerdict {
        verdict: RiskVerdict,
    },
    EmergencyExit {
        token_address: String,
        position_id: String,
    },
    ColonyPaused {
        reason: String,
    },
    ColonyResumed,

    // Capital
    CapitalAllocated {
        agent_id: String,
        amount: f64,
    },
    CapitalReleased {
        agent_id: String,
        amount: f64,
        pnl: f64,
    },
    ProfitSwept {
        reinvested: f64,
        reserved: f64,
    },

    // Scaling
    WorkersScaled {
        from: usize,
        to: usize,
        reason: String,
    },

    // System
    Alert {
        level: String,
        title: String,
        message: String,
    },
    ConfigReloaded,
    Error {
        source: String,
        message: String,
    },
}

impl ColonyEvent {
    /// Wire-level event type for the dashboard stream: info | error | trade | alert
    pub fn kind(&self) -> &'static str {
        match self {
            ColonyEvent::TradeExecuted { .. }
            | ColonyEvent::TierTriggered { .. }
            | ColonyEvent::PositionOpened { .. }
            | ColonyEvent::PositionClosed { .. } => "trade",
            ColonyEvent::RugVerdict { .. }
            | ColonyEvent::EmergencyExit { .. }
            | ColonyEvent::ColonyPaused { .. }
            | ColonyEvent::Alert { .. } => "alert",
            ColonyEvent::Error { .. } => "error",
            _ => "info",
        }
    }

    /// Human-readable summary for the dashboard stream
    pub fn summary(&self) -> String {
        match self {
            ColonyEvent::AgentSpawned { agent_id, role } => {
                format!("{} agent {} spawned", role, agent_id)
            }
            ColonyEvent::AgentStateChanged {
                agent_id, from, to, ..
            } => format!("agent {} transitioned {} -> {}", agent_id, from, to),
            ColonyEvent::AgentRetired {
                agent_id,
                reclaimed_capital,
            } => format!(
                "agent {} retired, {:.4} SOL reclaimed",
                agent_id, reclaimed_capital
            ),
            ColonyEvent::TradeExecuted { result } => format!(
                "trade {} via {} ({} attempts): {}",
                result.intent_id,
                result.provider,
                result.attempts,
                if result.success { "confirmed" } else { "failed" }
            ),
            ColonyEvent::TierTriggered {
                position_id,
                tier,
                amount,
            } => format!(
                "position {} hit tier {}, closing {:.4}",
                position_id, tier, amount
            ),
            ColonyEvent::PositionOpened {
                token_address,
                size,
                price,
                ..
            } => format!("opened {:.4} of {} @ {:.6}", size, token_address, price),
            ColonyEvent::PositionClosed { position_id, pnl } => {
                format!("position {} closed, pnl {:.4}", position_id, pnl)
            }
            ColonyEvent::RugVerdict { verdict } => format!(
                "rug verdict for {}: score {:.2} ({:?})",
                verdict.token_address, verdict.score, verdict.severity
            ),
            ColonyEvent::EmergencyExit {
                token_address,
                position_id,
            } => format!(
                "EMERGENCY exit of position {} ({})",
                position_id, token_address
            ),
            ColonyEvent::ColonyPaused { reason } => format!("colony paused: {}", reason),
            ColonyEvent::ColonyResumed => "colony resumed".to_string(),
            ColonyEvent::CapitalAllocated { agent_id, amount } => {
                format!("allocated {:.4} SOL to {}", amount, agent_id)
            }
            ColonyEvent::CapitalReleased {
                agent_id,
                amount,
                pnl,
            } => format!(
                "released {:.4} SOL from {} (pnl {:.4})",
                amount, agent_id, pnl
            ),
            ColonyEvent::ProfitSwept {
                reinvested,
                reserved,
            } => format!(
                "profit swept: {:.4} reinvested, {:.4} to reserve",
                reinvested, reserved
            ),
            ColonyEvent::WorkersScaled { from, to, reason } => {
                format!("workers scaled {} -> {} ({})", from, to, reason)
            }
            ColonyEvent::Alert {
                level,
                title,
                message,
            } => format!("[{}] {}: {}", level, title, message),
            ColonyEvent::ConfigReloaded => "configuration reloaded".to_string(),
            ColonyEvent::Error { source, message } => format!("{}: {}", source, message),
        }
    }
}

/// Event bus for broadcasting events to multiple subscribers
pub struct EventBus {
    sender: broadcast::Sender<ColonyEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn sender(&self) -> broadcast::Sender<ColonyEvent> {
        self.sender.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ColonyEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ColonyEvent) {
        match self.sender.send(event) {
            Ok(count) => debug!("Event sent to {} receivers", count),
            // No receivers during startup/shutdown
            Err(_) => debug!("No event receivers"),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Event processor that drains the bus, surviving lag
pub struct EventProcessor {
    receiver: broadcast::Receiver<ColonyEvent>,
    name: String,
}

impl EventProcessor {
    pub fn new(bus: &EventBus, name: &str) -> Self {
        Self {
            receiver: bus.subscribe(),
            name: name.to_string(),
        }
    }

    pub fn from_sender(sender: &broadcast::Sender<ColonyEvent>, name: &str) -> Self {
        Self {
            receiver: sender.subscribe(),
            name: name.to_string(),
        }
    }

    pub async fn next(&mut self) -> Option<ColonyEvent> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(count)) => {
                warn!("Event processor '{}' lagged by {} messages", self.name, count);
                self.receiver.recv().await.ok()
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Event bus closed for processor '{}'", self.name);
                None
            }
        }
    }
}
