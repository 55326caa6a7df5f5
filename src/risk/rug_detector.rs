//! Rug Pull Detector
//!
//! Scores a token's rug-pull risk from point-in-time and historical
//! snapshots:
//! - Market sub-scores: price, volume, liquidity and holder-count drops
//!   relative to the trailing history window
//! - Contract sub-checks: honeypot, mint function, blacklist, pausability,
//!   ownership concentration, transfer tax
//! - Overall score is the WORST weighted sub-score, never an average
//! - Any single contract flag at or above the contract risk threshold
//!   forces an emergency exit regardless of market scores

use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::RugDetectorConfig;
use crate::telemetry::metrics;
use crate::utils::helpers::current_timestamp_millis;
use crate::utils::types::{RiskVerdict, RuleId, TokenSnapshot, VerdictSeverity};

/// Fixed weights for the boolean contract flags
const HONEYPOT_SCORE: f64 = 1.0;
const BLACKLIST_SCORE: f64 = 0.9;
const MINT_FUNCTION_SCORE: f64 = 0.85;
const PAUSABLE_SCORE: f64 = 0.45;

/// Severity ladder over the overall score
fn severity_for(score: f64) -> VerdictSeverity {
    match score {
        s if s >= 0.5 => VerdictSeverity::Critical,
        s if s >= 0.3 => VerdictSeverity::High,
        s if s >= 0.15 => VerdictSeverity::Medium,
        _ => VerdictSeverity::Low,
    }
}

/// Trailing market history for one token, pruned to the detector window
#[derive(Debug, Default)]
pub struct TokenHistory {
    samples: VecDeque<TokenSnapshot>,
}

impl TokenHistory {
    pub fn push(&mut self, snapshot: TokenSnapshot, window_hours: i64) {
        self.samples.push_back(snapshot);
        self.prune(window_hours);
    }

    pub fn prune(&mut self, window_hours: i64) {
        let cutoff = current_timestamp_millis() - window_hours * 3_600_000;
        while self
            .samples
            .front()
            .map(|s| s.timestamp < cutoff)
            .unwrap_or(false)
        {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn peak(&self, f: impl Fn(&TokenSnapshot) -> f64) -> Option<f64> {
        self.samples
            .iter()
            .map(&f)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    pub fn peak_price(&self) -> Option<f64> {
        self.peak(|s| s.price)
    }

    pub fn peak_volume(&self) -> Option<f64> {
        self.peak(|s| s.volume)
    }

    pub fn peak_liquidity(&self) -> Option<f64> {
        self.peak(|s| s.liquidity)
    }

    pub fn peak_holders(&self) -> Option<u64> {
        self.samples.iter().map(|s| s.holder_count).max()
    }

    /// Normalized volatility of the price series: standard deviation of
    /// per-sample returns, clamped to [0, 1].
    pub fn volatility(&self) -> f64 {
        if self.samples.len() < 3 {
            return 0.0;
        }
        let prices: Vec<f64> = self.samples.iter().map(|s| s.price).collect();
        let returns: Vec<f64> = prices
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        if returns.is_empty() {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        variance.sqrt().min(1.0)
    }
}

/// Drop ratio of `current` against the window peak, in [0, 1]
fn drop_ratio(peak: f64, current: f64) -> f64 {
    if peak <= 0.0 || current >= peak {
        0.0
    } else {
        (peak - current) / peak
    }
}

/// Pure evaluation of one snapshot against its history.
pub fn evaluate(
    config: &RugDetectorConfig,
    snapshot: &TokenSnapshot,
    history: &TokenHistory,
) -> RiskVerdict {
    let mut triggered = Vec::new();
    let mut market_worst: f64 = 0.0;
    let mut contract_worst: f64 = 0.0;
    let mut contract_emergency = false;

    // Market sub-scores against the trailing window
    let market_rules = [
        (
            RuleId::PriceDrop,
            history.peak_price().map(|p| drop_ratio(p, snapshot.price)),
            config.price_drop_threshold,
        ),
        (
            RuleId::VolumeDrop,
            history.peak_volume().map(|p| drop_ratio(p, snapshot.volume)),
            config.volume_drop_threshold,
        ),
        (
            RuleId::LiquidityDrop,
            history
                .peak_liquidity()
                .map(|p| drop_ratio(p, snapshot.liquidity)),
            config.liquidity_drop_threshold,
        ),
        (
            RuleId::HolderDrop,
            history
                .peak_holders()
                .map(|p| drop_ratio(p as f64, snapshot.holder_count as f64)),
            config.holder_drop_threshold,
        ),
    ];

    for (rule, ratio, threshold) in market_rules {
        if let Some(ratio) = ratio {
            market_worst = market_worst.max(ratio);
            if ratio >= threshold {
                triggered.push(rule);
            }
        }
    }

    // Contract sub-checks; each can short-circuit to an emergency on its own
    let c = &snapshot.contract;
    let mut contract_rules: Vec<(RuleId, f64)> = Vec::new();
    if c.honeypot {
        contract_rules.push((RuleId::Honeypot, HONEYPOT_SCORE));
    }
    if c.blacklist {
        contract_rules.push((RuleId::Blacklist, BLACKLIST_SCORE));
    }
    if c.mint_function {
        contract_rules.push((RuleId::MintFunction, MINT_FUNCTION_SCORE));
    }
    if c.pausable {
        contract_rules.push((RuleId::Pausable, PAUSABLE_SCORE));
    }
    if c.ownership_concentration >= config.max_ownership_concentration {
        contract_rules.push((RuleId::OwnershipConcentration, c.ownership_concentration));
    }
    if c.tax_pct >= config.max_tax_pct {
        contract_rules.push((RuleId::ExcessiveTax, (c.tax_pct * 4.0).min(1.0)));
    }

    for (rule, score) in contract_rules {
        contract_worst = contract_worst.max(score);
        triggered.push(rule);
        if score >= config.contract_risk_threshold {
            contract_emergency = true;
        }
    }

    let worst = market_worst.max(contract_worst);
    let severity = severity_for(worst);
    // A contract flag at or above the contract threshold is fatal on its
    // own; a critical market collapse is equally fatal. A sub-threshold
    // contract flag never forces the exit, whatever the ladder says.
    let emergency_exit =
        contract_emergency || severity_for(market_worst) == VerdictSeverity::Critical;

    RiskVerdict {
        token_address: snapshot.token_address.clone(),
        score: worst,
        severity,
        triggered_rules: triggered,
        emergency_exit,
        computed_at: current_timestamp_millis(),
    }
}

/// Stateful detector: keeps per-token history and the latest verdict.
pub struct RugDetector {
    config: RugDetectorConfig,
    histories: DashMap<String, TokenHistory>,
    verdicts: DashMap<String, RiskVerdict>,
}

impl RugDetector {
    pub fn new(config: RugDetectorConfig) -> Self {
        Self {
            config,
            histories: DashMap::new(),
            verdicts: DashMap::new(),
        }
    }

    /// Record a snapshot and produce a fresh verdict. The previous verdict
    /// for the token is superseded.
    pub fn observe(&self, snapshot: TokenSnapshot) -> RiskVerdict {
        let token = snapshot.token_address.clone();
        let mut history = self.histories.entry(token.clone()).or_default();
        let verdict = evaluate(&self.config, &snapshot, &history);
        history.push(snapshot, self.config.history_window_hours);
        drop(history);

        if verdict.severity >= VerdictSeverity::High {
            metrics::record_rug_alert();
            warn!(
                "Rug verdict for {}: score {:.2}, rules {:?}",
                token, verdict.score, verdict.triggered_rules
            );
        } else {
            debug!("Rug verdict for {}: score {:.2}", token, verdict.score);
        }

        self.verdicts.insert(token, verdict.clone());
        verdict
    }

    pub fn latest_verdict(&self, token: &str) -> Option<RiskVerdict> {
        self.verdicts.get(token).map(|v| v.clone())
    }

    pub fn volatility(&self, token: &str) -> f64 {
        self.histories
            .get(token)
            .map(|h| h.volatility())
            .unwrap_or(0.0)
    }

    pub fn forget(&self, token: &str) {
        self.histories.remove(token);
        self.verdicts.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::utils::types::ContractAnalysis;

    fn config() -> RugDetectorConfig {
        AppConfig::default().rug_detector
    }

    fn snapshot(price: f64) -> TokenSnapshot {
        TokenSnapshot {
            token_address: "mint".to_string(),
            price,
            volume: 1000.0,
            liquidity: 500.0,
            holder_count: 200,
            contract: ContractAnalysis::default(),
            timestamp: current_timestamp_millis(),
        }
    }

    fn history_with_prices(prices: &[f64]) -> TokenHistory {
        let mut history = TokenHistory::default();
        for &p in prices {
            history.push(snapshot(p), 24);
        }
        history
    }

    #[test]
    fn test_healthy_token_scores_low() {
        let history = history_with_prices(&[1.0, 1.02, 0.99]);
        let verdict = evaluate(&config(), &snapshot(1.0), &history);
        assert!(verdict.score < 0.15);
        assert_eq!(verdict.severity, VerdictSeverity::Low);
        assert!(!verdict.emergency_exit);
    }

    #[test]
    fn test_price_collapse_is_critical() {
        let history = history_with_prices(&[1.0, 0.95, 0.9]);
        let verdict = evaluate(&config(), &snapshot(0.4), &history);
        assert!(verdict.triggered_rules.contains(&RuleId::PriceDrop));
        assert_eq!(verdict.severity, VerdictSeverity::Critical);
        assert!(verdict.emergency_exit);
    }

    #[test]
    fn test_honeypot_short_circuits_with_flat_price() {
        // Scenario: honeypot flag true, 0% price drop
        let history = history_with_prices(&[1.0, 1.0, 1.0]);
        let mut snap = snapshot(1.0);
        snap.contract.honeypot = true;

        let verdict = evaluate(&config(), &snap, &history);
        assert!(verdict.emergency_exit);
        assert!(verdict.triggered_rules.contains(&RuleId::Honeypot));
        assert_eq!(verdict.score, 1.0);
    }

    #[test]
    fn test_score_is_worst_case_not_average() {
        // One fatal dimension among healthy ones must not be diluted
        let history = history_with_prices(&[1.0, 1.0]);
        let mut snap = snapshot(1.0);
        snap.contract.blacklist = true;

        let verdict = evaluate(&config(), &snap, &history);
        assert_eq!(verdict.score, BLACKLIST_SCORE);
    }

    #[test]
    fn test_pausable_alone_is_not_an_emergency() {
        let history = history_with_prices(&[1.0, 1.0]);
        let mut snap = snapshot(1.0);
        snap.contract.pausable = true;

        let verdict = evaluate(&config(), &snap, &history);
        assert!(verdict.triggered_rules.contains(&RuleId::Pausable));
        assert!(!verdict.emergency_exit);
    }

    #[test]
    fn test_ownership_concentration_flag() {
        let history = history_with_prices(&[1.0]);
        let mut snap = snapshot(1.0);
        snap.contract.ownership_concentration = 0.8;

        let verdict = evaluate(&config(), &snap, &history);
        assert!(verdict
            .triggered_rules
            .contains(&RuleId::OwnershipConcentration));
        assert!(verdict.emergency_exit);
    }

    #[test]
    fn test_detector_supersedes_verdicts() {
        let detector = RugDetector::new(config());
        let v1 = detector.observe(snapshot(1.0));
        let v2 = detector.observe(snapshot(1.1));
        let latest = detector.latest_verdict("mint").unwrap();
        assert!(latest.computed_at >= v1.computed_at);
        assert_eq!(latest.computed_at, v2.computed_at);
    }

    #[test]
    fn test_volatility_zero_for_short_history() {
        let history = history_with_prices(&[1.0, 1.1]);
        assert_eq!(history.volatility(), 0.0);
    }

    #[test]
    fn test_volatility_rises_with_swings() {
        let calm = history_with_prices(&[1.0, 1.0, 1.0, 1.0, 1.0]);
        let wild = history_with_prices(&[1.0, 1.5, 0.8, 1.4, 0.7]);
        assert!(wild.volatility() > calm.volatility());
    }
}
