//! AI Oracle Client
//!
//! The oracle is an external scoring service. The contract is narrow:
//! `score(token) -> (confidence, risk)`, fetched over HTTP with a
//! caller-side TTL cache. Nothing else about the service is assumed.

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::OracleConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OracleScore {
    /// Model confidence that the token is tradeable, in [0, 1]
    pub confidence: f64,
    /// Model risk estimate, in [0, 1]
    pub risk: f64,
}

pub struct OracleClient {
    api_url: String,
    confidence_threshold: f64,
    cache_ttl: Duration,
    cache: DashMap<String, (OracleScore, Instant)>,
    http_client: reqwest::Client,
}

impl OracleClient {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to build oracle HTTP client")?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            confidence_threshold: config.confidence_threshold,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            cache: DashMap::new(),
            http_client,
        })
    }

    /// Score a token, serving from cache within the TTL.
    pub async fn score(&self, token: &str) -> Result<OracleScore> {
        if let Some(entry) = self.cache.get(token) {
            let (score, fetched_at) = *entry;
            if fetched_at.elapsed() < self.cache_ttl {
                debug!("Oracle cache hit for {}", token);
                return Ok(score);
            }
        }

        let url = format!("{}/score/{}", self.api_url, token);
        let score: OracleScore = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Oracle request failed")?
            .error_for_status()
            .context("Oracle returned an error status")?
            .json()
            .await
            .context("Oracle response was not valid JSON")?;

        self.cache.insert(token.to_string(), (score, Instant::now()));
        Ok(score)
    }

    /// Whether a score clears the configured confidence gate.
    pub fn passes_gate(&self, score: &OracleScore) -> bool {
        score.confidence >= self.confidence_threshold
    }

    /// Inject a score directly; used by paper trading and tests.
    pub fn prime_cache(&self, token: &str, score: OracleScore) {
        self.cache.insert(token.to_string(), (score, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn client() -> OracleClient {
        OracleClient::new(&AppConfig::default().oracle).unwrap()
    }

    #[tokio::test]
    async fn test_cache_serves_within_ttl() {
        let client = client();
        client.prime_cache(
            "mint",
            OracleScore {
                confidence: 0.9,
                risk: 0.1,
            },
        );

        let score = client.score("mint").await.unwrap();
        assert!((score.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_gate() {
        let client = client();
        assert!(client.passes_gate(&OracleScore {
            confidence: 0.7,
            risk: 0.2
        }));
        assert!(!client.passes_gate(&OracleScore {
            confidence: 0.5,
            risk: 0.2
        }));
    }
}
