//! Retroactive funding pools.
//!
//! Pool managers register pools and the metrics their applications are judged on, voters
//! spread their influence across those metrics, and the calculation subsystem turns the
//! ballots and the raw per-application metric scores into a percentage payout distribution.

pub mod config;
pub mod error;
pub mod funding;
pub mod telemetry;
