//! Common types used throughout the colony core

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation classes routed through the RPC gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    /// Read-only polling: prices, balances, token metadata
    Monitoring,
    /// Standard trade submission
    Trading,
    /// MEV-protected bundle submission
    Mev,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Monitoring => write!(f, "monitoring"),
            OperationClass::Trading => write!(f, "trading"),
            OperationClass::Mev => write!(f, "mev"),
        }
    }
}

/// Agent species within the colony. Shared-but-divergent behavior is a
/// tagged variant, not a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Queen,
    Princess,
    Worker,
    Drone,
    Sentry,
}

impl Role {
    /// Whether agents of this role hold trading capital
    pub fn is_trading(&self) -> bool {
        matches!(self, Role::Princess | Role::Worker)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Queen => write!(f, "queen"),
            Role::Princess => write!(f, "princess"),
            Role::Worker => write!(f, "worker"),
            Role::Drone => write!(f, "drone"),
            Role::Sentry => write!(f, "sentry"),
        }
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Submission urgency; emergency widens slippage and doubles gas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Emergency,
}

/// An open position, owned by exactly one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    /// Token mint the position is held in, quoted against SOL
    pub token_address: String,
    pub pair: String,
    pub entry_price: f64,
    /// Size at open; tier percentages apply to this, never the remainder
    pub original_size: f64,
    /// Remaining size after partial closes
    pub size: f64,
    pub opened_at: i64,
    pub agent_id: String,
    /// Number of profit tiers consumed so far; advances monotonically
    pub current_tier: usize,
    /// Bumped when an emergency exit is issued; stale submission results
    /// carrying an older epoch are discarded
    pub epoch: u64,
}

impl Position {
    pub fn new(
        token_address: impl Into<String>,
        pair: impl Into<String>,
        entry_price: f64,
        size: f64,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            token_address: token_address.into(),
            pair: pair.into(),
            entry_price,
            original_size: size,
            size,
            opened_at: chrono::Utc::now().timestamp_millis(),
            agent_id: agent_id.into(),
            current_tier: 0,
            epoch: 0,
        }
    }

    pub fn age_hours(&self, now_millis: i64) -> f64 {
        (now_millis - self.opened_at) as f64 / 3_600_000.0
    }

    pub fn is_closed(&self) -> bool {
        self.size <= 0.0
    }
}

/// Rules a risk verdict can trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    PriceDrop,
    VolumeDrop,
    LiquidityDrop,
    HolderDrop,
    Honeypot,
    MintFunction,
    Blacklist,
    Pausable,
    OwnershipConcentration,
    ExcessiveTax,
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleId::PriceDrop => "price_drop",
            RuleId::VolumeDrop => "volume_drop",
            RuleId::LiquidityDrop => "liquidity_drop",
            RuleId::HolderDrop => "holder_drop",
            RuleId::Honeypot => "honeypot",
            RuleId::MintFunction => "mint_function",
            RuleId::Blacklist => "blacklist",
            RuleId::Pausable => "pausable",
            RuleId::OwnershipConcentration => "ownership_concentration",
            RuleId::ExcessiveTax => "excessive_tax",
        };
        write!(f, "{}", name)
    }
}

/// Risk verdict severity, derived from the worst sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Immutable output of a rug scan; superseded by newer verdicts on re-scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub token_address: String,
    /// Worst weighted sub-score, in [0, 1]
    pub score: f64,
    pub severity: VerdictSeverity,
    pub triggered_rules: Vec<RuleId>,
    pub emergency_exit: bool,
    pub computed_at: i64,
}

/// Static contract-analysis flags for a token
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContractAnalysis {
    pub honeypot: bool,
    pub mint_function: bool,
    pub blacklist: bool,
    pub pausable: bool,
    /// Fraction of supply held by the top holders, in [0, 1]
    pub ownership_concentration: f64,
    /// Transfer tax, in [0, 1]
    pub tax_pct: f64,
}

/// Point-in-time market observation for a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub token_address: String,
    pub price: f64,
    pub volume: f64,
    pub liquidity: f64,
    pub holder_count: u64,
    pub contract: ContractAnalysis,
    pub timestamp: i64,
}

/// A trade the colony wants executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub id: String,
    pub position_id: Option<String>,
    pub agent_id: String,
    pub token_address: String,
    pub side: TradeSide,
    pub amount: f64,
    pub slippage_pct: f64,
    /// Gas tolerance widening from the profit tier, 1.0 = none
    pub gas_buffer: f64,
    pub urgency: Urgency,
    /// Position epoch at intent creation; see [`Position::epoch`]
    pub epoch: u64,
}

impl TradeIntent {
    pub fn new(
        agent_id: impl Into<String>,
        token_address: impl Into<String>,
        side: TradeSide,
        amount: f64,
        slippage_pct: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            position_id: None,
            agent_id: agent_id.into(),
            token_address: token_address.into(),
            side,
            amount,
            slippage_pct,
            gas_buffer: 1.0,
            urgency: Urgency::Normal,
            epoch: 0,
        }
    }

    pub fn operation_class(&self, mev_protected: bool) -> OperationClass {
        if mev_protected {
            OperationClass::Mev
        } else {
            OperationClass::Trading
        }
    }
}

/// Outcome of a submission attempt chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResult {
    pub intent_id: String,
    pub signature: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub priority_fee: u64,
    pub provider: String,
    pub attempts: u32,
    pub epoch: u64,
}

/// What the profit manager wants done with a position
#[derive(Debug, Clone, PartialEq)]
pub enum ExitAction {
    /// Close a fraction of the original size at the given tier
    PartialClose {
        /// 1-based tier that fired
        tier: usize,
        /// Amount to sell, denominated like the position size
        amount: f64,
        gas_buffer: f64,
    },
    /// Position exceeded max age with no tier hit; coordinator decides
    ForcedReview,
}

/// Wallet summary for the status API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub id: String,
    pub name: String,
    pub balance: f64,
    pub value: f64,
}

pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_partial_bookkeeping() {
        let mut pos = Position::new("mint", "MINT/SOL", 1.0, 100.0, "agent");
        assert_eq!(pos.original_size, 100.0);
        pos.size -= 25.0;
        assert_eq!(pos.original_size, 100.0);
        assert!(!pos.is_closed());
    }

    #[test]
    fn test_operation_class_for_intent() {
        let intent = TradeIntent::new("a", "mint", TradeSide::Buy, 1.0, 0.5);
        assert_eq!(intent.operation_class(true), OperationClass::Mev);
        assert_eq!(intent.operation_class(false), OperationClass::Trading);
    }
}
