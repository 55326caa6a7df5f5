//! Transaction Bundler
//!
//! Groups compatible trade intents into bundles for MEV-protected
//! submission. Intents are compatible when they share urgency and side;
//! emergency exits are never mixed into normal bundles.

use crate::utils::types::TradeIntent;

/// Group intents into bundles of at most `bundle_size`, preserving order.
pub fn group_into_bundles(intents: Vec<TradeIntent>, bundle_size: usize) -> Vec<Vec<TradeIntent>> {
    let mut bundles: Vec<Vec<TradeIntent>> = Vec::new();

    for intent in intents {
        match bundles.last_mut() {
            Some(bundle)
                if bundle.len() < bundle_size
                    && bundle
                        .first()
                        .map(|head| compatible(head, &intent))
                        .unwrap_or(true) =>
            {
                bundle.push(intent);
            }
            _ => bundles.push(vec![intent]),
        }
    }

    bundles
}

fn compatible(a: &TradeIntent, b: &TradeIntent) -> bool {
    a.urgency == b.urgency && a.side == b.side
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::{TradeSide, Urgency};

    fn intent(side: TradeSide, urgency: Urgency) -> TradeIntent {
        let mut intent = TradeIntent::new("agent", "mint", side, 1.0, 0.5);
        intent.urgency = urgency;
        intent
    }

    #[test]
    fn test_bundles_respect_size_limit() {
        let intents = (0..7)
            .map(|_| intent(TradeSide::Sell, Urgency::Normal))
            .collect();
        let bundles = group_into_bundles(intents, 3);
        assert_eq!(bundles.len(), 3);
        assert_eq!(bundles[0].len(), 3);
        assert_eq!(bundles[2].len(), 1);
    }

    #[test]
    fn test_emergency_never_bundled_with_normal() {
        let intents = vec![
            intent(TradeSide::Sell, Urgency::Normal),
            intent(TradeSide::Sell, Urgency::Emergency),
            intent(TradeSide::Sell, Urgency::Normal),
        ];
        let bundles = group_into_bundles(intents, 4);
        assert_eq!(bundles.len(), 3);
    }

    #[test]
    fn test_opposite_sides_split() {
        let intents = vec![
            intent(TradeSide::Buy, Urgency::Normal),
            intent(TradeSide::Sell, Urgency::Normal),
        ];
        let bundles = group_into_bundles(intents, 4);
        assert_eq!(bundles.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_into_bundles(Vec::new(), 4).is_empty());
    }
}
