//! Postgres EXPLAIN (FORMAT JSON) pass-through
//!
//! The plan model serializes under the Postgres JSON key names, so a
//! `{"Plan": ...}` document needs no conversion beyond deserialization.
//!
//! # Examples
//!
//! ```
//! use planlens_analyzer::explain::postgres::parse_json_content;
//!
//! let value = serde_json::json!({
//!     "Plan": {
//!         "Node Type": "Seq Scan",
//!         "Relation Name": "users",
//!         "Startup Cost": 0.0,
//!         "Total Cost": 10.0,
//!         "Plan Rows": 100,
//!         "Plan Width": 36
//!     },
//!     "Planning Time": 0.08
//! });
//!
//! let content = parse_json_content(value).unwrap();
//! assert_eq!(content.plan.relation_name.as_deref(), Some("users"));
//! assert_eq!(content.planning_time, Some(0.08));
//! ```

use crate::explain::error::Result;
use planlens_core::PlanContent;
use serde_json::Value;

/// Deserializes a Postgres plan wrapper (`{"Plan": ..., "Planning Time": ...}`)
pub fn parse_json_content(value: Value) -> Result<PlanContent> {
    let content: PlanContent = serde_json::from_value(value)?;
    tracing::debug!(
        nodes = content.plan.node_count(),
        "parsed Postgres JSON plan"
    );
    Ok(content)
}

#[cfg(test)]
mod tests;
