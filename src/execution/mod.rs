//! Execution Module
//!
//! Transaction execution infrastructure:
//! - Priority fee estimation over a sliding sample window
//! - Bundle grouping for MEV-protected submission
//! - Swap transaction building with compute-budget prefix
//! - Submission with retry, provider failover and emergency handling

pub mod bundler;
pub mod fees;
pub mod submitter;
pub mod tx_builder;

pub use bundler::group_into_bundles;
pub use fees::PriorityFeeEstimator;
pub use submitter::TransactionHandler;
pub use tx_builder::TransactionBuilder;
