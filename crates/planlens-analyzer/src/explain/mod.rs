//! EXPLAIN plan parsing
//!
//! Accepted inputs:
//! - Postgres text plans, with or without `ANALYZE`, as printed by psql or
//!   pasted from GUI clients
//! - Postgres JSON plans (`EXPLAIN (FORMAT JSON)`)
//! - MySQL tree plans (`EXPLAIN FORMAT=TREE` and `EXPLAIN ANALYZE`)
//! - MySQL JSON plans, both the classic `query_block` layout and the newer
//!   `query_plan` / `inputs` layout
//!
//! # Example
//!
//! ```
//! use planlens_analyzer::explain::PlanService;
//!
//! let service = PlanService::default();
//! let source = "Seq Scan on users  (cost=0.00..35.50 rows=2550 width=4)";
//! let plan = service.parse("users", source, "SELECT * FROM users").unwrap();
//!
//! assert_eq!(plan.root().node_type(), "Seq Scan");
//! assert_eq!(plan.root().node_id, Some(1));
//! assert_eq!(plan.root().exclusive_cost, Some(35.5));
//! ```

pub mod error;
pub mod label;
pub mod metrics;
pub mod mysql;
pub mod postgres;
pub mod router;
pub mod service;
pub mod source;
pub mod text;

pub use error::{ExplainError, Result};
pub use metrics::derive as derive_metrics;
pub use router::parse_normalized;
pub use service::PlanService;
pub use source::normalize_source;
pub use text::parse_text;
