//! Profit Manager
//!
//! Tiered take-profit evaluation per open position:
//! - Tiers fire in ascending multiplier order, one per price tick
//! - A position's tier index is a monotonic ratchet; lower tiers are never
//!   re-evaluated once passed
//! - Partial closes are sized against the ORIGINAL position size
//! - Elevated volatility lowers the effective multiplier so profit is
//!   taken slightly earlier
//! - Stale positions are flagged for forced review

use tracing::{debug, warn};

use crate::config::ProfitManagerConfig;
use crate::utils::helpers::current_timestamp_millis;
use crate::utils::types::{ExitAction, Position};

/// Pure tier evaluation for one price tick.
///
/// `estimated_gas_cost` is the cost of the exit in position-quote terms;
/// a tier whose net profit would not clear the configured floor is skipped
/// without being consumed.
pub fn evaluate(
    config: &ProfitManagerConfig,
    position: &Position,
    current_price: f64,
    volatility: f64,
    estimated_gas_cost: f64,
    now_millis: i64,
) -> Option<ExitAction> {
    if position.is_closed() || position.entry_price <= 0.0 {
        return None;
    }

    let ratio = current_price / position.entry_price;

    // Tiers strictly in ascending order, starting past the ratchet
    for (index, tier) in config
        .tiers
        .iter()
        .enumerate()
        .skip(position.current_tier)
    {
        let effective_multiplier = if volatility > config.volatility_baseline {
            tier.multiplier * (1.0 - volatility * tier.volatility_adjustment)
        } else {
            tier.multiplier
        };

        if ratio < effective_multiplier {
            // Higher tiers cannot fire if this one did not
            break;
        }

        let amount = (position.original_size * tier.percentage).min(position.size);
        if amount <= 0.0 {
            break;
        }

        let net_profit =
            amount * (current_price - position.entry_price) - estimated_gas_cost * tier.gas_buffer;
        if net_profit <= config.min_profit_threshold {
            warn!(
                "Skipping tier {} for position {}: net profit {:.6} below floor",
                index + 1,
                position.id,
                net_profit
            );
            return None;
        }

        debug!(
            "Position {} hit tier {} at ratio {:.3} (effective multiplier {:.3})",
            position.id,
            index + 1,
            ratio,
            effective_multiplier
        );
        return Some(ExitAction::PartialClose {
            tier: index + 1,
            amount,
            gas_buffer: tier.gas_buffer,
        });
    }

    // No tier fired: stale positions get flagged regardless of price
    if position.current_tier == 0
        && position.age_hours(now_millis) > config.max_trade_age_hours as f64
    {
        return Some(ExitAction::ForcedReview);
    }

    None
}

/// Thin stateful wrapper holding the tier table.
pub struct ProfitManager {
    config: ProfitManagerConfig,
}

impl ProfitManager {
    pub fn new(config: ProfitManagerConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        position: &Position,
        current_price: f64,
        volatility: f64,
        estimated_gas_cost: f64,
    ) -> Option<ExitAction> {
        evaluate(
            &self.config,
            position,
            current_price,
            volatility,
            estimated_gas_cost,
            current_timestamp_millis(),
        )
    }

    /// Advance the ratchet after a tier exit confirmed. The tier index only
    /// ever moves forward.
    pub fn apply_partial_close(&self, position: &mut Position, tier: usize, amount: f64) {
        debug_assert!(tier > position.current_tier);
        position.size = (position.size - amount).max(0.0);
        position.current_tier = position.current_tier.max(tier);
    }

    pub fn tier_count(&self) -> usize {
        self.config.tiers.len()
    }
}
