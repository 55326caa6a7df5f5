//! RPC Gateway
//!
//! Routes operations to Solana RPC providers (Helius, Triton, Jito) by
//! operation class with automatic failover:
//! - Rolling success rate and latency per provider
//! - Circuit breaker with cooldown and half-open probe
//! - Background health probes independent of trading traffic

use anyhow::Result;
use dashmap::DashMap;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::SharedConfig;
use crate::telemetry::metrics;
use crate::utils::types::OperationClass;

/// Rolling outcome window per provider
const OUTCOME_WINDOW: usize = 50;
/// Minimum outcomes before the success rate can open a circuit
const MIN_SAMPLES_FOR_RATE: usize = 10;
/// Consecutive probe failures that force a circuit open
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no available RPC provider for operation class {0}")]
    NoAvailableProvider(OperationClass),
    #[error("unknown RPC provider '{0}'")]
    UnknownProvider(String),
}

/// Handle to a selected provider for one operation
#[derive(Clone)]
pub struct ProviderHandle {
    pub name: String,
    pub client: Arc<RpcClient>,
    pub transaction_timeout: Duration,
    pub bundle_timeout: Duration,
}

/// Mutable health state of a single provider
#[derive(Debug)]
struct ProviderState {
    outcomes: VecDeque<bool>,
    last_latency_ms: u64,
    consecutive_failures: u32,
    circuit_open: bool,
    circuit_opened_at: Option<Instant>,
    /// Set while a single half-open probe request is in flight
    half_open: bool,
    cooldown: Duration,
    min_success_rate: f64,
}

impl ProviderState {
    fn new(min_success_rate: f64, cooldown: Duration) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(OUTCOME_WINDOW),
            last_latency_ms: 0,
            consecutive_failures: 0,
            circuit_open: false,
            circuit_opened_at: None,
            half_open: false,
            cooldown,
            min_success_rate,
        }
    }

    fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let successes = self.outcomes.iter().filter(|&&s| s).count();
        successes as f64 / self.outcomes.len() as f64
    }

    fn push_outcome(&mut self, success: bool) {
        if self.outcomes.len() >= OUTCOME_WINDOW {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    fn open_circuit(&mut self) {
        self.circuit_open = true;
        self.half_open = false;
        self.circuit_opened_at = Some(Instant::now());
    }

    fn close_circuit(&mut self) {
        self.circuit_open = false;
        self.half_open = false;
        self.circuit_opened_at = None;
        self.consecutive_failures = 0;
        self.outcomes.clear();
    }

    fn cooldown_elapsed(&self) -> bool {
        self.circuit_opened_at
            .map(|at| at.elapsed() >= self.cooldown)
            .unwrap_or(true)
    }

    /// Whether the provider may serve traffic right now. An open circuit
    /// past its cooldown admits exactly one half-open probe request.
    fn admit(&mut self) -> bool {
        if !self.circuit_open {
            return true;
        }
        if self.half_open {
            // A probe is already in flight
            return false;
        }
        if self.cooldown_elapsed() {
            self.half_open = true;
            return true;
        }
        false
    }

    fn record(&mut self, success: bool, probe: bool) -> bool {
        let was_open = self.circuit_open;

        if self.half_open {
            if success {
                self.close_circuit();
            } else {
                self.open_circuit();
            }
        } else if probe {
            if success {
                self.consecutive_failures = 0;
            } else {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    self.open_circuit();
                }
            }
        } else {
            self.push_outcome(success);
            if success {
                self.consecutive_failures = 0;
            } else {
                self.consecutive_failures += 1;
            }
            if self.outcomes.len() >= MIN_SAMPLES_FOR_RATE
                && self.success_rate() < self.min_success_rate
            {
                self.open_circuit();
            }
        }

        was_open != self.circuit_open
    }
}

/// Gateway over all configured providers
pub struct RpcGateway {
    config: SharedConfig,
    clients: HashMap<String, Arc<RpcClient>>,
    health: DashMap<String, ProviderState>,
    running: Arc<RwLock<bool>>,
}

impl RpcGateway {
    pub fn new(config: SharedConfig) -> Self {
        let snapshot = config.load_full();
        let mut clients = HashMap::new();
        let health = DashMap::new();

        for (name, provider) in &snapshot.rpc.providers {
            let client = Arc::new(RpcClient::new_with_timeout_and_commitment(
                provider.url.clone(),
                Duration::from_millis(provider.transaction_timeout_ms),
                CommitmentConfig::confirmed(),
            ));
            clients.insert(name.clone(), client);
            health.insert(
                name.clone(),
                ProviderState::new(
                    provider.min_success_rate,
                    Duration::from_secs(provider.circuit_cooldown_secs),
                ),
            );
        }

        info!("RPC gateway initialized with {} providers", clients.len());

        Self {
            config,
            clients,
            health,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Select a provider for the operation class: configured primary first,
    /// then ordered fallbacks. Fails when every circuit is open.
    pub fn select(&self, class: OperationClass) -> Result<ProviderHandle, GatewayError> {
        let snapshot = self.config.load_full();
        let route = snapshot
            .rpc
            .routing
            .get(&class)
            .ok_or(GatewayError::NoAvailableProvider(class))?;

        let candidates =
            std::iter::once(&route.primary).chain(route.fallback_rpcs.iter());

        for name in candidates {
            let mut state = self
                .health
                .get_mut(name)
                .ok_or_else(|| GatewayError::UnknownProvider(name.clone()))?;
            if state.admit() {
                let provider = snapshot
                    .rpc
                    .providers
                    .get(name)
                    .ok_or_else(|| GatewayError::UnknownProvider(name.clone()))?;
                let client = self
                    .clients
                    .get(name)
                    .ok_or_else(|| GatewayError::UnknownProvider(name.clone()))?
                    .clone();
                debug!("Selected provider '{}' for {}", name, class);
                return Ok(ProviderHandle {
                    name: name.clone(),
                    client,
                    transaction_timeout: Duration::from_millis(provider.transaction_timeout_ms),
                    bundle_timeout: Duration::from_millis(provider.bundle_timeout_ms),
                });
            }
        }

        Err(GatewayError::NoAvailableProvider(class))
    }

    /// Report the outcome of a live operation against a provider.
    pub fn report_outcome(&self, provider: &str, success: bool, latency_ms: u64) {
        if let Some(mut state) = self.health.get_mut(provider) {
            state.last_latency_ms = latency_ms;
            let circuit_changed = state.record(success, false);
            let open = state.circuit_open;
            drop(state);

            metrics::record_rpc_latency(provider, latency_ms as f64);
            if circuit_changed {
                metrics::record_circuit_state(provider, open);
                if open {
                    warn!("Circuit opened for provider '{}'", provider);
                } else {
                    info!("Circuit closed for provider '{}'", provider);
                }
            }
        }
    }

    /// Report a background health probe. Probe failures can open a circuit
    /// with no live traffic; probe successes clear the failure streak.
    pub fn report_probe(&self, provider: &str, success: bool, latency_ms: u64) {
        if let Some(mut state) = self.health.get_mut(provider) {
            state.last_latency_ms = latency_ms;
            let circuit_changed = state.record(success, true);
            let open = state.circuit_open;
            drop(state);

            if circuit_changed {
                metrics::record_circuit_state(provider, open);
                if open {
                    warn!("Circuit opened for provider '{}' by health probe", provider);
                } else {
                    info!("Circuit closed for provider '{}' by health probe", provider);
                }
            }
        }
    }

    pub fn is_circuit_open(&self, provider: &str) -> bool {
        self.health
            .get(provider)
            .map(|s| s.circuit_open)
            .unwrap_or(false)
    }

    pub fn success_rate(&self, provider: &str) -> f64 {
        self.health
            .get(provider)
            .map(|s| s.success_rate())
            .unwrap_or(0.0)
    }

    pub fn last_latency_ms(&self, provider: &str) -> u64 {
        self.health
            .get(provider)
            .map(|s| s.last_latency_ms)
            .unwrap_or(0)
    }

    /// Spawn one background prober per provider.
    pub async fn start_health_probes(self: &Arc<Self>) {
        *self.running.write().await = true;
        let snapshot = self.config.load_full();

        for (name, provider) in &snapshot.rpc.providers {
            let gateway = self.clone();
            let name = name.clone();
            let interval = Duration::from_secs(provider.health_check_interval_secs);
            let client = match self.clients.get(&name) {
                Some(c) => c.clone(),
                None => continue,
            };

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    if !*gateway.running.read().await {
                        break;
                    }
                    let start = Instant::now();
                    let result =
                        tokio::time::timeout(Duration::from_secs(5), client.get_slot()).await;
                    let latency = start.elapsed().as_millis() as u64;
                    let success = matches!(result, Ok(Ok(_)));
                    gateway.report_probe(&name, success, latency);
                }
                debug!("Health prober for '{}' stopped", name);
            });
        }

        info!("Health probes started");
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use arc_swap::ArcSwap;

    fn shared_config() -> SharedConfig {
        Arc::new(ArcSwap::from_pointee(AppConfig::default()))
    }

    fn open_circuit(gateway: &RpcGateway, provider: &str) {
        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            gateway.report_probe(provider, false, 100);
        }
    }

    #[test]
    fn test_select_prefers_primary() {
        let gateway = RpcGateway::new(shared_config());
        let handle = gateway.select(OperationClass::Mev).unwrap();
        assert_eq!(handle.name, "jito");
    }

    #[test]
    fn test_failover_to_fallback_when_primary_open() {
        let gateway = RpcGateway::new(shared_config());
        open_circuit(&gateway, "jito");
        assert!(gateway.is_circuit_open("jito"));

        let handle = gateway.select(OperationClass::Mev).unwrap();
        assert_eq!(handle.name, "triton");
    }

    #[test]
    fn test_all_circuits_open_fails_selection() {
        let gateway = RpcGateway::new(shared_config());
        for provider in ["helius", "triton", "jito"] {
            open_circuit(&gateway, provider);
        }

        let err = gateway.select(OperationClass::Trading).unwrap_err();
        assert!(matches!(err, GatewayError::NoAvailableProvider(_)));
    }

    #[test]
    fn test_success_rate_opens_circuit() {
        let gateway = RpcGateway::new(shared_config());
        // 10 outcomes at 50% success with a 0.8 floor opens the circuit
        for i in 0..MIN_SAMPLES_FOR_RATE {
            gateway.report_outcome("helius", i % 2 == 0, 50);
        }
        assert!(gateway.is_circuit_open("helius"));
    }

    #[test]
    fn test_probe_failures_open_circuit_without_traffic() {
        let gateway = RpcGateway::new(shared_config());
        open_circuit(&gateway, "triton");
        assert!(gateway.is_circuit_open("triton"));
    }

    #[test]
    fn test_half_open_probe_closes_circuit_on_success() {
        let mut state = ProviderState::new(0.8, Duration::from_secs(0));
        state.open_circuit();
        // Cooldown of zero: the next admit is the half-open probe
        assert!(state.admit());
        assert!(state.half_open);
        state.record(true, false);
        assert!(!state.circuit_open);
    }

    #[test]
    fn test_half_open_probe_reopens_on_failure() {
        let mut state = ProviderState::new(0.8, Duration::from_secs(0));
        state.open_circuit();
        assert!(state.admit());
        state.record(false, false);
        assert!(state.circuit_open);
    }

    #[test]
    fn test_open_circuit_rejects_before_cooldown() {
        let mut state = ProviderState::new(0.8, Duration::from_secs(3600));
        state.open_circuit();
        assert!(!state.admit());
    }
}
