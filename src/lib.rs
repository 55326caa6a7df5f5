//! AntBot Colony Core Library
//!
//! An autonomous, colony-structured trading core for Solana: a queen
//! gates colony-wide risk, workers and princesses hold positions, drones
//! scout entries, sentries watch for rugs, and a serialized capital
//! ledger keeps every allocation honest.

pub mod api;
pub mod capital;
pub mod colony;
pub mod config;
pub mod execution;
pub mod feeds;
pub mod monitor;
pub mod network;
pub mod profit;
pub mod reinvest;
pub mod risk;
pub mod state;
pub mod telemetry;
pub mod utils;

// Re-export main types
pub use capital::CapitalManager;
pub use colony::{Colony, QueenState, WorkerState};
pub use config::{AppConfig, SharedConfig};
pub use execution::TransactionHandler;
pub use monitor::PerformanceMonitor;
pub use network::{ColonyEvent, EventBus, RpcGateway};
pub use profit::ProfitManager;
pub use risk::RugDetector;
pub use state::SharedState;
