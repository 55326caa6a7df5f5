//! Priority Fee Estimation
//!
//! Keeps a sliding window of recent fee samples and a dynamically adjusted
//! gas multiplier. The effective priority fee is always clamped to the
//! configured bounds; emergency exits double the multiplier under a wider
//! emergency clamp.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

use crate::config::TransactionHandlerConfig;
use crate::utils::types::Urgency;

pub struct PriorityFeeEstimator {
    min_fee: u64,
    max_fee: u64,
    min_multiplier: f64,
    max_multiplier: f64,
    update_interval_secs: u64,
    window_size: usize,
    samples: Mutex<VecDeque<u64>>,
    multiplier: Mutex<f64>,
    last_update: Mutex<Instant>,
}

impl PriorityFeeEstimator {
    pub fn new(config: &TransactionHandlerConfig) -> Self {
        Self {
            min_fee: config.min_priority_fee,
            max_fee: config.max_priority_fee,
            min_multiplier: config.min_gas_multiplier,
            max_multiplier: config.max_gas_multiplier,
            update_interval_secs: config.fee_update_interval_secs,
            window_size: config.gas_price_window,
            samples: Mutex::new(VecDeque::with_capacity(config.gas_price_window)),
            multiplier: Mutex::new(config.min_gas_multiplier),
            last_update: Mutex::new(Instant::now()),
        }
    }

    /// Feed an observed network fee into the sliding window.
    pub fn record_sample(&self, fee: u64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.window_size {
            samples.pop_front();
        }
        samples.push_back(fee);
        drop(samples);
        self.maybe_update_multiplier();
    }

    /// Recompute the multiplier from fee momentum, at most once per update
    /// interval: rising fees push the multiplier up, falling fees decay it.
    fn maybe_update_multiplier(&self) {
        let mut last_update = self.last_update.lock();
        if last_update.elapsed().as_secs() < self.update_interval_secs {
            return;
        }
        *last_update = Instant::now();
        drop(last_update);

        let samples = self.samples.lock();
        if samples.len() < 4 {
            return;
        }
        let half = samples.len() / 2;
        let older: f64 = samples.iter().take(half).map(|&f| f as f64).sum::<f64>() / half as f64;
        let recent: f64 = samples.iter().skip(half).map(|&f| f as f64).sum::<f64>()
            / (samples.len() - half) as f64;
        drop(samples);

        let mut multiplier = self.multiplier.lock();
        if older > 0.0 {
            let momentum = recent / older;
            *multiplier = (*multiplier * momentum).clamp(self.min_multiplier, self.max_multiplier);
            debug!(
                "Fee multiplier updated to {:.2} (momentum {:.2})",
                *multiplier, momentum
            );
        }
    }

    fn median_sample(&self) -> u64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return self.min_fee;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    /// Effective priority fee for a submission.
    pub fn fee_for(&self, urgency: Urgency) -> u64 {
        let base = self.median_sample() as f64;
        let multiplier = *self.multiplier.lock();

        match urgency {
            Urgency::Normal => {
                let fee = (base * multiplier) as u64;
                fee.clamp(self.min_fee, self.max_fee)
            }
            Urgency::Emergency => {
                // Doubled multiplier, clamped to twice the normal ceiling
                let fee = (base * multiplier * 2.0) as u64;
                fee.clamp(self.min_fee, self.max_fee.saturating_mul(2))
            }
        }
    }

    pub fn current_multiplier(&self) -> f64 {
        *self.multiplier.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn estimator() -> PriorityFeeEstimator {
        let mut config = AppConfig::default().transaction_handler;
        config.fee_update_interval_secs = 0;
        PriorityFeeEstimator::new(&config)
    }

    #[test]
    fn test_fee_clamped_to_bounds() {
        let est = estimator();
        // Empty window falls back to the minimum
        assert_eq!(est.fee_for(Urgency::Normal), 1_000);

        for _ in 0..20 {
            est.record_sample(50_000_000);
        }
        assert_eq!(est.fee_for(Urgency::Normal), 1_000_000);
    }

    #[test]
    fn test_emergency_doubles_with_wider_clamp() {
        let est = estimator();
        for _ in 0..20 {
            est.record_sample(900_000);
        }
        let normal = est.fee_for(Urgency::Normal);
        let emergency = est.fee_for(Urgency::Emergency);
        assert!(emergency > normal);
        assert!(emergency <= 2_000_000);
    }

    #[test]
    fn test_multiplier_rises_with_fee_momentum() {
        let est = estimator();
        for fee in [1_000, 1_000, 1_000, 1_000, 8_000, 8_000, 8_000, 8_000] {
            est.record_sample(fee);
        }
        assert!(est.current_multiplier() > 1.0);
    }

    #[test]
    fn test_multiplier_stays_bounded() {
        let est = estimator();
        for i in 0..100u64 {
            est.record_sample(1_000 + i * 10_000);
        }
        let m = est.current_multiplier();
        assert!(m >= 1.0 && m <= 3.0);
    }

    #[test]
    fn test_window_is_sliding() {
        let est = estimator();
        for _ in 0..25 {
            est.record_sample(5_000);
        }
        let samples = est.samples.lock();
        assert_eq!(samples.len(), 20);
    }
}
