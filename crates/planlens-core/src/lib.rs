//! planlens core - the execution plan data model
//!
//! This crate defines the types every planlens crate exchanges:
//!
//! - `Node` - one operator of an execution plan, with typed well-known
//!   properties and an open bag for dialect specific ones
//! - `Worker` - per parallel worker statistics attached to a node
//! - `PropValue` - value stored in the open property bag
//! - `PlanContent` - the raw parse result (root node plus top-level metadata)
//! - `Plan` - a fully derived plan with detached CTEs and global statistics

pub mod keys;
mod node;
mod plan;
mod value;

pub use node::*;
pub use plan::*;
pub use value::*;
