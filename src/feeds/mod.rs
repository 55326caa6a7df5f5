//! Market Data Feeds
//!
//! The coordinator consumes point-in-time token snapshots through the
//! [`MarketFeed`] seam. The paper feed is an in-memory table driven by
//! tests and paper-trading runs; a live feed plugs a DEX indexer into the
//! same trait.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::utils::helpers::current_timestamp_millis;
use crate::utils::types::TokenSnapshot;

#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn snapshot(&self, token: &str) -> Result<TokenSnapshot>;
}

/// In-memory feed for paper trading and tests
#[derive(Default)]
pub struct PaperFeed {
    tokens: DashMap<String, TokenSnapshot>,
}

impl PaperFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, snapshot: TokenSnapshot) {
        self.tokens.insert(snapshot.token_address.clone(), snapshot);
    }

    pub fn set_price(&self, token: &str, price: f64) {
        if let Some(mut snapshot) = self.tokens.get_mut(token) {
            snapshot.price = price;
        }
    }

    pub fn update<F: FnOnce(&mut TokenSnapshot)>(&self, token: &str, f: F) {
        if let Some(mut snapshot) = self.tokens.get_mut(token) {
            f(&mut snapshot);
        }
    }
}

#[async_trait]
impl MarketFeed for PaperFeed {
    async fn snapshot(&self, token: &str) -> Result<TokenSnapshot> {
        let mut snapshot = self
            .tokens
            .get(token)
            .map(|s| s.clone())
            .ok_or_else(|| anyhow::anyhow!("No feed data for token {}", token))?;
        snapshot.timestamp = current_timestamp_millis();
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::ContractAnalysis;

    #[tokio::test]
    async fn test_paper_feed_round_trip() {
        let feed = PaperFeed::new();
        feed.register(TokenSnapshot {
            token_address: "mint".to_string(),
            price: 1.0,
            volume: 100.0,
            liquidity: 50.0,
            holder_count: 10,
            contract: ContractAnalysis::default(),
            timestamp: 0,
        });
        feed.set_price("mint", 1.5);

        let snapshot = feed.snapshot("mint").await.unwrap();
        assert_eq!(snapshot.price, 1.5);
        assert!(snapshot.timestamp > 0);
    }

    #[tokio::test]
    async fn test_unknown_token_errors() {
        let feed = PaperFeed::new();
        assert!(feed.snapshot("missing").await.is_err());
    }
}
