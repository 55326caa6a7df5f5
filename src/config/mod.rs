//! Configuration module
//!
//! Handles loading and validation of the colony configuration from
//! `settings.toml` + `rpc.toml`. A config is validated as a whole before it
//! becomes visible to any component; reloads swap the full snapshot
//! atomically or are rejected.

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::utils::types::OperationClass;

/// Shared handle to the active configuration snapshot
pub type SharedConfig = Arc<ArcSwap<AppConfig>>;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub colony: ColonyConfig,
    pub rug_detector: RugDetectorConfig,
    pub transaction_handler: TransactionHandlerConfig,
    pub profit_manager: ProfitManagerConfig,
    pub capital_manager: CapitalManagerConfig,
    pub reinvestment: ReinvestmentConfig,
    pub performance_monitor: PerformanceMonitorConfig,
    pub oracle: OracleConfig,
    pub api: ApiConfig,
    pub telemetry: TelemetryConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub paper_trading: bool,
}

impl AppConfig {
    /// Load `settings.toml` and `rpc.toml` from a config directory.
    ///
    /// Fails closed: any parse or validation error aborts the load and the
    /// previous snapshot (if any) stays active.
    pub fn load(dir: &Path) -> Result<Self> {
        let settings_path = dir.join("settings.toml");
        let rpc_path = dir.join("rpc.toml");

        let settings = std::fs::read_to_string(&settings_path)
            .with_context(|| format!("Failed to read config file: {:?}", settings_path))?;
        let rpc = std::fs::read_to_string(&rpc_path)
            .with_context(|| format!("Failed to read config file: {:?}", rpc_path))?;

        Self::parse(&settings, &rpc).map(|config| {
            info!("Configuration loaded from {:?}", dir);
            config
        })
    }

    /// Parse and validate from raw TOML strings.
    pub fn parse(settings: &str, rpc: &str) -> Result<Self> {
        let settings: SettingsFile =
            toml::from_str(settings).with_context(|| "Failed to parse settings.toml")?;
        let rpc: RpcConfig = toml::from_str(rpc).with_context(|| "Failed to parse rpc.toml")?;

        let config = Self {
            colony: settings.colony,
            rug_detector: settings.rug_detector,
            transaction_handler: settings.transaction_handler,
            profit_manager: settings.profit_manager,
            capital_manager: settings.capital_manager,
            reinvestment: settings.reinvestment,
            performance_monitor: settings.performance_monitor,
            oracle: settings.oracle,
            api: settings.api,
            telemetry: settings.telemetry,
            rpc,
            paper_trading: settings.paper_trading,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.colony;
        anyhow::ensure!(
            c.risk_threshold > 0.0 && c.risk_threshold <= 1.0,
            "colony.risk_threshold must be in (0, 1]"
        );
        anyhow::ensure!(
            c.max_concurrent_scans > 0 && c.max_concurrent_transactions > 0,
            "colony concurrency limits must be positive"
        );

        let r = &self.rug_detector;
        for (name, v) in [
            ("price_drop_threshold", r.price_drop_threshold),
            ("volume_drop_threshold", r.volume_drop_threshold),
            ("liquidity_drop_threshold", r.liquidity_drop_threshold),
            ("holder_drop_threshold", r.holder_drop_threshold),
            ("contract_risk_threshold", r.contract_risk_threshold),
        ] {
            anyhow::ensure!(
                v > 0.0 && v <= 1.0,
                "rug_detector.{} must be in (0, 1]",
                name
            );
        }
        anyhow::ensure!(
            r.history_window_hours > 0,
            "rug_detector.history_window_hours must be positive"
        );

        let t = &self.transaction_handler;
        anyhow::ensure!(
            t.min_priority_fee <= t.max_priority_fee,
            "transaction_handler priority fee bounds inverted"
        );
        anyhow::ensure!(
            t.min_gas_multiplier > 0.0 && t.min_gas_multiplier <= t.max_gas_multiplier,
            "transaction_handler gas multiplier bounds invalid"
        );
        anyhow::ensure!(
            t.gas_price_window > 0,
            "transaction_handler.gas_price_window must be positive"
        );
        anyhow::ensure!(
            t.bundle_size > 0,
            "transaction_handler.bundle_size must be positive"
        );
        anyhow::ensure!(
            t.swap_program_id.parse::<solana_sdk::pubkey::Pubkey>().is_ok(),
            "transaction_handler.swap_program_id is not a valid pubkey"
        );
        anyhow::ensure!(
            t.emergency.max_slippage_pct > 0.0,
            "transaction_handler.emergency.max_slippage_pct must be positive"
        );
        anyhow::ensure!(
            t.emergency.timeout_seconds > 0,
            "transaction_handler.emergency.timeout_seconds must be positive"
        );

        let p = &self.profit_manager;
        anyhow::ensure!(!p.tiers.is_empty(), "profit_manager.tiers must not be empty");
        let mut prev_multiplier = 1.0;
        let mut total_pct = 0.0;
        for (i, tier) in p.tiers.iter().enumerate() {
            anyhow::ensure!(
                tier.multiplier > prev_multiplier,
                "profit_manager.tiers[{}] multiplier must exceed the previous tier",
                i
            );
            anyhow::ensure!(
                tier.percentage > 0.0 && tier.percentage <= 1.0,
                "profit_manager.tiers[{}] percentage must be in (0, 1]",
                i
            );
            anyhow::ensure!(
                tier.gas_buffer >= 1.0,
                "profit_manager.tiers[{}] gas_buffer must be >= 1.0",
                i
            );
            prev_multiplier = tier.multiplier;
            total_pct += tier.percentage;
        }
        anyhow::ensure!(
            total_pct <= 1.0 + 1e-9,
            "profit_manager tier percentages must not exceed 100% of the position"
        );
        anyhow::ensure!(
            p.max_trade_age_hours > 0,
            "profit_manager.max_trade_age_hours must be positive"
        );

        let cap = &self.capital_manager;
        anyhow::ensure!(
            cap.min_active_workers <= cap.max_active_workers,
            "capital_manager worker bounds inverted"
        );
        anyhow::ensure!(
            cap.worker_ant_budget > 0.0,
            "capital_manager.worker_ant_budget must be positive"
        );
        anyhow::ensure!(
            cap.reserve_floor >= 0.0 && cap.reserve_floor < cap.initial_capital,
            "capital_manager.reserve_floor must be below initial_capital"
        );

        let inv = &self.reinvestment;
        anyhow::ensure!(
            inv.reinvestment_rate >= 0.0 && inv.reserve_rate >= 0.0,
            "reinvestment rates must be non-negative"
        );
        anyhow::ensure!(
            (inv.reinvestment_rate + inv.reserve_rate - 1.0).abs() < 1e-9,
            "reinvestment_rate + reserve_rate must equal 1.0"
        );
        anyhow::ensure!(
            inv.min_success_rate > 0.0 && inv.min_success_rate <= 1.0,
            "reinvestment.min_success_rate must be in (0, 1]"
        );
        anyhow::ensure!(
            inv.max_loss_rate > 0.0 && inv.max_loss_rate <= 1.0,
            "reinvestment.max_loss_rate must be in (0, 1]"
        );

        let m = &self.performance_monitor;
        anyhow::ensure!(
            m.success_rate_threshold_low < m.success_rate_threshold_high,
            "performance_monitor success rate thresholds inverted"
        );
        anyhow::ensure!(
            m.scale_down_factor > 0.0 && m.scale_down_factor < 1.0,
            "performance_monitor.scale_down_factor must be in (0, 1)"
        );
        anyhow::ensure!(
            m.scale_up_factor > 1.0,
            "performance_monitor.scale_up_factor must exceed 1.0"
        );
        anyhow::ensure!(
            m.min_workers >= 1 && m.min_workers <= m.max_workers,
            "performance_monitor worker bounds invalid"
        );

        let o = &self.oracle;
        anyhow::ensure!(
            o.confidence_threshold > 0.0 && o.confidence_threshold <= 1.0,
            "oracle.confidence_threshold must be in (0, 1]"
        );

        self.rpc.validate()?;
        Ok(())
    }
}

/// On-disk shape of `settings.toml` (everything except the RPC tables)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsFile {
    colony: ColonyConfig,
    rug_detector: RugDetectorConfig,
    transaction_handler: TransactionHandlerConfig,
    profit_manager: ProfitManagerConfig,
    capital_manager: CapitalManagerConfig,
    reinvestment: ReinvestmentConfig,
    performance_monitor: PerformanceMonitorConfig,
    oracle: OracleConfig,
    api: ApiConfig,
    telemetry: TelemetryConfig,
    #[serde(default)]
    paper_trading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyConfig {
    /// Aggregate colony risk above which the queen suspends new trades
    pub risk_threshold: f64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_drone_count")]
    pub drone_count: usize,
    #[serde(default = "default_sentry_count")]
    pub sentry_count: usize,
    #[serde(default = "default_max_concurrent_scans")]
    pub max_concurrent_scans: usize,
    #[serde(default = "default_max_concurrent_transactions")]
    pub max_concurrent_transactions: usize,
    /// Runtime worker threads; 0 picks the tokio default
    #[serde(default)]
    pub max_threads: usize,
    /// Token mints the drones scout for entries
    #[serde(default)]
    pub watchlist: Vec<String>,
}

fn default_tick_interval() -> u64 { 1000 }
fn default_drone_count() -> usize { 2 }
fn default_sentry_count() -> usize { 1 }
fn default_max_concurrent_scans() -> usize { 8 }
fn default_max_concurrent_transactions() -> usize { 4 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RugDetectorConfig {
    pub price_drop_threshold: f64,
    pub volume_drop_threshold: f64,
    pub liquidity_drop_threshold: f64,
    pub holder_drop_threshold: f64,
    pub contract_risk_threshold: f64,
    pub history_window_hours: i64,
    #[serde(default = "default_max_ownership_concentration")]
    pub max_ownership_concentration: f64,
    #[serde(default = "default_max_tax_pct")]
    pub max_tax_pct: f64,
}

fn default_max_ownership_concentration() -> f64 { 0.5 }
fn default_max_tax_pct() -> f64 { 0.1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionHandlerConfig {
    pub min_priority_fee: u64,
    pub max_priority_fee: u64,
    pub min_gas_multiplier: f64,
    pub max_gas_multiplier: f64,
    #[serde(default = "default_fee_update_interval")]
    pub fee_update_interval_secs: u64,
    pub gas_price_window: usize,
    pub bundle_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub use_mev_protection: bool,
    #[serde(default = "default_slippage_pct")]
    pub default_slippage_pct: f64,
    /// On-chain router program trades are built against
    #[serde(default = "default_swap_program_id")]
    pub swap_program_id: String,
    pub emergency: EmergencyConfig,
}

fn default_fee_update_interval() -> u64 { 10 }
fn default_slippage_pct() -> f64 { 1.0 }
fn default_swap_program_id() -> String {
    "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyConfig {
    /// Slippage ceiling for emergency exits, percent
    pub max_slippage_pct: f64,
    /// Hard deadline for an emergency exit before it is reported failed
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitTierConfig {
    /// Price ratio (current / entry) at which this tier fires
    pub multiplier: f64,
    /// Fraction of the ORIGINAL position size to close
    pub percentage: f64,
    /// Gas tolerance widening for the tier's exit
    pub gas_buffer: f64,
    /// Effective-multiplier reduction under elevated volatility
    pub volatility_adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitManagerConfig {
    pub tiers: Vec<ProfitTierConfig>,
    pub max_trade_age_hours: u64,
    /// Net profit below which a tier sell is skipped without consuming it
    #[serde(default)]
    pub min_profit_threshold: f64,
    /// Volatility above this baseline activates tier volatility_adjustment
    #[serde(default = "default_volatility_baseline")]
    pub volatility_baseline: f64,
}

fn default_volatility_baseline() -> f64 { 0.1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalManagerConfig {
    pub initial_capital: f64,
    pub worker_ant_budget: f64,
    pub min_active_workers: usize,
    pub max_active_workers: usize,
    /// Capital that can never be allocated to trading
    pub reserve_floor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinvestmentConfig {
    pub check_interval_secs: u64,
    pub reinvestment_rate: f64,
    pub reserve_rate: f64,
    pub max_daily_reinvestment: f64,
    pub max_position_size: f64,
    pub performance_window_hours: i64,
    pub min_success_rate: f64,
    pub max_loss_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMonitorConfig {
    pub metrics_window_hours: i64,
    pub success_rate_threshold_low: f64,
    pub success_rate_threshold_high: f64,
    pub scale_down_factor: f64,
    pub scale_up_factor: f64,
    pub min_scale_interval_mins: i64,
    pub max_scale_interval_mins: i64,
    pub min_workers: usize,
    pub max_workers: usize,
    #[serde(default = "default_max_avg_execution_time")]
    pub max_avg_execution_time_ms: u64,
    #[serde(default = "default_max_avg_gas_fee")]
    pub max_avg_gas_fee: f64,
}

fn default_max_avg_execution_time() -> u64 { 200 }
fn default_max_avg_gas_fee() -> f64 { 0.1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub api_url: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    pub confidence_threshold: f64,
    #[serde(default = "default_oracle_timeout")]
    pub request_timeout_ms: u64,
}

fn default_cache_ttl() -> u64 { 30 }
fn default_oracle_timeout() -> u64 { 2000 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_listen_addr() -> String { "127.0.0.1:8900".to_string() }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    pub log_file: Option<String>,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    #[serde(default)]
    pub enable_alerts: bool,
    pub alert_webhook: Option<String>,
}

fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

/// On-disk shape of `rpc.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Provider table, keyed by name (helius, triton, jito, ...)
    pub providers: HashMap<String, ProviderConfig>,
    /// Primary + ordered fallbacks per operation class
    pub routing: HashMap<OperationClass, RouteConfig>,
}

impl RpcConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.providers.is_empty(), "rpc.providers must not be empty");
        for (name, provider) in &self.providers {
            anyhow::ensure!(
                provider.min_success_rate > 0.0 && provider.min_success_rate <= 1.0,
                "rpc.providers.{}.min_success_rate must be in (0, 1]",
                name
            );
            anyhow::ensure!(
                provider.health_check_interval_secs > 0,
                "rpc.providers.{}.health_check_interval_secs must be positive",
                name
            );
        }
        for class in [
            OperationClass::Monitoring,
            OperationClass::Trading,
            OperationClass::Mev,
        ] {
            let route = self
                .routing
                .get(&class)
                .with_context(|| format!("rpc.routing missing class {}", class))?;
            anyhow::ensure!(
                self.providers.contains_key(&route.primary),
                "rpc.routing.{} primary '{}' is not a configured provider",
                class,
                route.primary
            );
            for name in &route.fallback_rpcs {
                anyhow::ensure!(
                    self.providers.contains_key(name),
                    "rpc.routing.{} fallback '{}' is not a configured provider",
                    class,
                    name
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
    pub min_success_rate: f64,
    #[serde(default = "default_tx_timeout")]
    pub transaction_timeout_ms: u64,
    #[serde(default = "default_bundle_timeout")]
    pub bundle_timeout_ms: u64,
    #[serde(default = "default_circuit_cooldown")]
    pub circuit_cooldown_secs: u64,
}

fn default_health_interval() -> u64 { 15 }
fn default_tx_timeout() -> u64 { 30_000 }
fn default_bundle_timeout() -> u64 { 45_000 }
fn default_circuit_cooldown() -> u64 { 60 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub primary: String,
    #[serde(default)]
    pub fallback_rpcs: Vec<String>,
}

impl Default for AppConfig {
    /// A complete, valid configuration with conservative defaults. Used as
    /// the baseline for tests and for generating example config files.
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "helius".to_string(),
            ProviderConfig {
                url: "https://mainnet.helius-rpc.com".to_string(),
                health_check_interval_secs: 15,
                min_success_rate: 0.8,
                transaction_timeout_ms: 30_000,
                bundle_timeout_ms: 45_000,
                circuit_cooldown_secs: 60,
            },
        );
        providers.insert(
            "triton".to_string(),
            ProviderConfig {
                url: "https://triton.rpcpool.com".to_string(),
                health_check_interval_secs: 15,
                min_success_rate: 0.8,
                transaction_timeout_ms: 30_000,
                bundle_timeout_ms: 45_000,
                circuit_cooldown_secs: 60,
            },
        );
        providers.insert(
            "jito".to_string(),
            ProviderConfig {
                url: "https://mainnet.block-engine.jito.wtf".to_string(),
                health_check_interval_secs: 10,
                min_success_rate: 0.7,
                transaction_timeout_ms: 30_000,
                bundle_timeout_ms: 45_000,
                circuit_cooldown_secs: 60,
            },
        );

        let mut routing = HashMap::new();
        routing.insert(
            OperationClass::Monitoring,
            RouteConfig {
                primary: "helius".to_string(),
                fallback_rpcs: vec!["triton".to_string()],
            },
        );
        routing.insert(
            OperationClass::Trading,
            RouteConfig {
                primary: "triton".to_string(),
                fallback_rpcs: vec!["helius".to_string()],
            },
        );
        routing.insert(
            OperationClass::Mev,
            RouteConfig {
                primary: "jito".to_string(),
                fallback_rpcs: vec!["triton".to_string(), "helius".to_string()],
            },
        );

        Self {
            colony: ColonyConfig {
                risk_threshold: 0.7,
                tick_interval_ms: default_tick_interval(),
                drone_count: default_drone_count(),
                sentry_count: default_sentry_count(),
                max_concurrent_scans: default_max_concurrent_scans(),
                max_concurrent_transactions: default_max_concurrent_transactions(),
                max_threads: 0,
                watchlist: Vec::new(),
            },
            rug_detector: RugDetectorConfig {
                price_drop_threshold: 0.3,
                volume_drop_threshold: 0.5,
                liquidity_drop_threshold: 0.3,
                holder_drop_threshold: 0.2,
                contract_risk_threshold: 0.7,
                history_window_hours: 24,
                max_ownership_concentration: default_max_ownership_concentration(),
                max_tax_pct: default_max_tax_pct(),
            },
            transaction_handler: TransactionHandlerConfig {
                min_priority_fee: 1_000,
                max_priority_fee: 1_000_000,
                min_gas_multiplier: 1.0,
                max_gas_multiplier: 3.0,
                fee_update_interval_secs: default_fee_update_interval(),
                gas_price_window: 20,
                bundle_size: 4,
                max_retries: 3,
                retry_delay_ms: 200,
                use_mev_protection: true,
                default_slippage_pct: default_slippage_pct(),
                swap_program_id: default_swap_program_id(),
                emergency: EmergencyConfig {
                    max_slippage_pct: 10.0,
                    timeout_seconds: 30,
                },
            },
            profit_manager: ProfitManagerConfig {
                tiers: vec![
                    ProfitTierConfig {
                        multiplier: 1.5,
                        percentage: 0.25,
                        gas_buffer: 1.1,
                        volatility_adjustment: 0.05,
                    },
                    ProfitTierConfig {
                        multiplier: 2.0,
                        percentage: 0.25,
                        gas_buffer: 1.2,
                        volatility_adjustment: 0.1,
                    },
                    ProfitTierConfig {
                        multiplier: 3.0,
                        percentage: 0.25,
                        gas_buffer: 1.3,
                        volatility_adjustment: 0.15,
                    },
                    ProfitTierConfig {
                        multiplier: 5.0,
                        percentage: 0.25,
                        gas_buffer: 1.5,
                        volatility_adjustment: 0.2,
                    },
                ],
                max_trade_age_hours: 24,
                min_profit_threshold: 0.0,
                volatility_baseline: default_volatility_baseline(),
            },
            capital_manager: CapitalManagerConfig {
                initial_capital: 100.0,
                worker_ant_budget: 5.0,
                min_active_workers: 1,
                max_active_workers: 10,
                reserve_floor: 20.0,
            },
            reinvestment: ReinvestmentConfig {
                check_interval_secs: 300,
                reinvestment_rate: 0.7,
                reserve_rate: 0.3,
                max_daily_reinvestment: 50.0,
                max_position_size: 10.0,
                performance_window_hours: 24,
                min_success_rate: 0.5,
                max_loss_rate: 0.3,
            },
            performance_monitor: PerformanceMonitorConfig {
                metrics_window_hours: 24,
                success_rate_threshold_low: 0.3,
                success_rate_threshold_high: 0.7,
                scale_down_factor: 0.7,
                scale_up_factor: 1.2,
                min_scale_interval_mins: 5,
                max_scale_interval_mins: 15,
                min_workers: 1,
                max_workers: 10,
                max_avg_execution_time_ms: default_max_avg_execution_time(),
                max_avg_gas_fee: default_max_avg_gas_fee(),
            },
            oracle: OracleConfig {
                api_url: "http://127.0.0.1:8600".to_string(),
                cache_ttl_secs: default_cache_ttl(),
                confidence_threshold: 0.6,
                request_timeout_ms: default_oracle_timeout(),
            },
            api: ApiConfig {
                listen_addr: default_listen_addr(),
                enable_cors: true,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
                json_logs: false,
                log_file: None,
                metrics_port: default_metrics_port(),
                enable_metrics: true,
                enable_alerts: false,
                alert_webhook: None,
            },
            rpc: RpcConfig { providers, routing },
            paper_trading: true,
        }
    }
}

/// Serialize a snapshot back to (settings.toml, rpc.toml) strings.
pub fn to_toml_pair(config: &AppConfig) -> Result<(String, String)> {
    let settings = SettingsFile {
        colony: config.colony.clone(),
        rug_detector: config.rug_detector.clone(),
        transaction_handler: config.transaction_handler.clone(),
        profit_manager: config.profit_manager.clone(),
        capital_manager: config.capital_manager.clone(),
        reinvestment: config.reinvestment.clone(),
        performance_monitor: config.performance_monitor.clone(),
        oracle: config.oracle.clone(),
        api: config.api.clone(),
        telemetry: config.telemetry.clone(),
        paper_trading: config.paper_trading,
    };
    Ok((
        toml::to_string_pretty(&settings).context("Failed to serialize settings")?,
        toml::to_string_pretty(&config.rpc).context("Failed to serialize rpc config")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let config = AppConfig::default();
        let (settings, rpc) = to_toml_pair(&config).unwrap();
        let reloaded = AppConfig::parse(&settings, &rpc).unwrap();
        assert_eq!(config, reloaded);
    }

    #[test]
    fn test_rejects_inverted_fee_bounds() {
        let mut config = AppConfig::default();
        config.transaction_handler.min_priority_fee = 2_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_ascending_tiers() {
        let mut config = AppConfig::default();
        config.profit_manager.tiers[1].multiplier = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_tier_percentages_over_full_position() {
        let mut config = AppConfig::default();
        for tier in &mut config.profit_manager.tiers {
            tier.percentage = 0.4;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_routing_provider() {
        let mut config = AppConfig::default();
        config
            .rpc
            .routing
            .get_mut(&OperationClass::Trading)
            .unwrap()
            .primary = "nonexistent".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_split_rates_not_summing_to_one() {
        let mut config = AppConfig::default();
        config.reinvestment.reinvestment_rate = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_fails_closed() {
        let result = AppConfig::parse("not = [valid", "");
        assert!(result.is_err());
    }
}
