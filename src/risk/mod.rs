//! Risk Module
//!
//! Rug-pull detection over market and contract signals, plus the external
//! AI oracle scoring gate.

pub mod oracle;
pub mod rug_detector;

pub use oracle::{OracleClient, OracleScore};
pub use rug_detector::{evaluate, RugDetector, TokenHistory};
