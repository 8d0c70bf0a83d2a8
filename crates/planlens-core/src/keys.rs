//! Property names as they appear in plan JSON
//!
//! Typed `Node` fields serialize under these names, and untyped properties
//! in `Node::extra` are looked up with them.

pub const NODE_TYPE: &str = "Node Type";
pub const PLANS: &str = "Plans";
pub const PARENT_RELATIONSHIP: &str = "Parent Relationship";
pub const SUBPLAN_NAME: &str = "Subplan Name";
pub const RELATION_NAME: &str = "Relation Name";
pub const ALIAS: &str = "Alias";
pub const INDEX_NAME: &str = "Index Name";
pub const CTE_NAME: &str = "CTE Name";
pub const FUNCTION_NAME: &str = "Function Name";
pub const JOIN_TYPE: &str = "Join Type";
pub const FILTER: &str = "Filter";
pub const STRATEGY: &str = "Strategy";
pub const OPERATION: &str = "Operation";
pub const PARTIAL_MODE: &str = "Partial Mode";
pub const SCAN_DIRECTION: &str = "Scan Direction";
pub const PARALLEL_AWARE: &str = "Parallel Aware";

pub const STARTUP_COST: &str = "Startup Cost";
pub const TOTAL_COST: &str = "Total Cost";
pub const PLAN_ROWS: &str = "Plan Rows";
pub const PLAN_WIDTH: &str = "Plan Width";
pub const ACTUAL_STARTUP_TIME: &str = "Actual Startup Time";
pub const ACTUAL_TOTAL_TIME: &str = "Actual Total Time";
pub const ACTUAL_ROWS: &str = "Actual Rows";
pub const ACTUAL_LOOPS: &str = "Actual Loops";
pub const ROWS_REMOVED_BY_FILTER: &str = "Rows Removed by Filter";
pub const ROWS_REMOVED_BY_JOIN_FILTER: &str = "Rows Removed by Join Filter";
pub const ROWS_REMOVED_BY_INDEX_RECHECK: &str = "Rows Removed by Index Recheck";
pub const WORKERS_PLANNED: &str = "Workers Planned";
pub const WORKERS_LAUNCHED: &str = "Workers Launched";
pub const WORKERS: &str = "Workers";

pub const OUTPUT: &str = "Output";
pub const HASH_CONDITION: &str = "Hash Cond";
pub const GROUP_KEY: &str = "Group Key";
pub const SORT_KEY: &str = "Sort Key";

// MySQL
pub const USED_COLUMNS: &str = "Used Columns";
pub const ATTACHED_CONDITION: &str = "Attached Condition";
pub const POSSIBLE_KEYS: &str = "Possible Keys";
pub const KEY: &str = "Key";
pub const KEY_LENGTH: &str = "Key Length";
pub const FILTERED: &str = "Filtered";
pub const COST_INFO: &str = "Cost Info";
pub const MESSAGE: &str = "Message";

// Plan level
pub const PLAN: &str = "Plan";
pub const QUERY_TEXT: &str = "Query Text";
pub const EXECUTION_TIME: &str = "Execution Time";
pub const PLANNING_TIME: &str = "Planning Time";
pub const TOTAL_RUNTIME: &str = "Total Runtime";
