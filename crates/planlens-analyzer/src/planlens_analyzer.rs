//! planlens analyzer - EXPLAIN plan parsing and metrics derivation
//!
//! This crate provides functionality for:
//! - Normalizing EXPLAIN output copied out of terminals and GUI clients
//! - Parsing Postgres text and JSON plans and MySQL tree and JSON plans
//! - Deriving per-node metrics (exclusive cost and duration, estimate
//!   accuracy, loop-adjusted row counts) and plan-wide maxima

pub mod explain;
pub mod settings;

pub use explain::*;
pub use settings::AnalyzerSettings;
