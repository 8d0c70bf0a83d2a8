//! Plan nodes and parallel workers

use crate::keys;
use crate::value::PropValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Which way the planner got its row estimate wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateDirection {
    /// More rows than planned
    Under,
    /// Fewer rows than planned
    Over,
    None,
}

/// A single operator in an execution plan tree.
///
/// Well-known properties are typed fields serialized under the names the
/// Postgres JSON format uses, so a `{"Plan": ...}` document deserializes
/// straight into this struct. Everything else lands in `extra`.
///
/// Fields prefixed with `*` in their serialized name are derived by the
/// metrics pass and never come from a plan source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "nodeId", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<u32>,
    #[serde(rename = "Node Type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(rename = "Parent Relationship", default, skip_serializing_if = "Option::is_none")]
    pub parent_relationship: Option<String>,
    #[serde(rename = "Subplan Name", default, skip_serializing_if = "Option::is_none")]
    pub subplan_name: Option<String>,

    #[serde(rename = "Relation Name", default, skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    #[serde(rename = "Alias", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "Index Name", default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(rename = "CTE Name", default, skip_serializing_if = "Option::is_none")]
    pub cte_name: Option<String>,
    #[serde(rename = "Function Name", default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(rename = "Join Type", default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(rename = "Filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(rename = "Strategy", default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(rename = "Operation", default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(rename = "Partial Mode", default, skip_serializing_if = "Option::is_none")]
    pub partial_mode: Option<String>,
    #[serde(rename = "Scan Direction", default, skip_serializing_if = "Option::is_none")]
    pub scan_direction: Option<String>,
    #[serde(rename = "Parallel Aware", default, skip_serializing_if = "Option::is_none")]
    pub parallel_aware: Option<bool>,

    #[serde(rename = "Startup Cost", default, skip_serializing_if = "Option::is_none")]
    pub startup_cost: Option<f64>,
    #[serde(rename = "Total Cost", default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(rename = "Plan Rows", default, skip_serializing_if = "Option::is_none")]
    pub plan_rows: Option<f64>,
    #[serde(rename = "Plan Width", default, skip_serializing_if = "Option::is_none")]
    pub plan_width: Option<u64>,

    #[serde(rename = "Actual Startup Time", default, skip_serializing_if = "Option::is_none")]
    pub actual_startup_time: Option<f64>,
    #[serde(rename = "Actual Total Time", default, skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    #[serde(rename = "Actual Rows", default, skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(rename = "Actual Loops", default, skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<u64>,

    #[serde(rename = "Rows Removed by Filter", default, skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_filter: Option<f64>,
    #[serde(
        rename = "Rows Removed by Join Filter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rows_removed_by_join_filter: Option<f64>,
    #[serde(
        rename = "Rows Removed by Index Recheck",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rows_removed_by_index_recheck: Option<f64>,

    #[serde(rename = "Workers Planned", default, skip_serializing_if = "Option::is_none")]
    pub workers_planned: Option<u32>,
    #[serde(rename = "Workers Launched", default, skip_serializing_if = "Option::is_none")]
    pub workers_launched: Option<u32>,
    #[serde(rename = "Workers", default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<Worker>,

    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<Node>,

    #[serde(
        rename = "*Workers Planned By Gather",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub workers_planned_by_gather: Option<u32>,
    #[serde(
        rename = "*Workers Launched By Gather",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub workers_launched_by_gather: Option<u32>,
    #[serde(rename = "*Duration (exclusive)", default, skip_serializing_if = "Option::is_none")]
    pub exclusive_duration: Option<f64>,
    #[serde(rename = "*Cost (exclusive)", default, skip_serializing_if = "Option::is_none")]
    pub exclusive_cost: Option<f64>,
    #[serde(rename = "*Actual Rows Revised", default, skip_serializing_if = "Option::is_none")]
    pub actual_rows_revised: Option<f64>,
    #[serde(rename = "*Plan Rows Revised", default, skip_serializing_if = "Option::is_none")]
    pub plan_rows_revised: Option<f64>,
    #[serde(rename = "*Rows Removed by Filter", default, skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_filter_revised: Option<f64>,
    #[serde(
        rename = "*Rows Removed by Join Filter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rows_removed_by_join_filter_revised: Option<f64>,
    #[serde(
        rename = "*Rows Removed by Index Recheck",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rows_removed_by_index_recheck_revised: Option<f64>,
    #[serde(
        rename = "*Actual Rows Is Fractional",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub actual_rows_fractional: bool,
    #[serde(
        rename = "*Planner Row Estimate Factor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub planner_estimate_factor: Option<f64>,
    #[serde(
        rename = "*Planner Row Estimate Direction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub planner_estimate_direction: Option<EstimateDirection>,
    #[serde(rename = "*Search String", default, skip_serializing_if = "Option::is_none")]
    pub search_string: Option<String>,

    /// Properties without a typed field, in source order
    #[serde(flatten)]
    pub extra: IndexMap<String, PropValue>,
}

impl Node {
    /// Creates a node with the given type label
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            ..Self::default()
        }
    }

    pub fn node_type(&self) -> &str {
        self.node_type.as_deref().unwrap_or_default()
    }

    /// Sets the estimated cost pair
    pub fn with_cost(mut self, startup: Option<f64>, total: f64) -> Self {
        self.startup_cost = startup;
        self.total_cost = Some(total);
        self
    }

    /// Sets the estimated row count
    pub fn with_plan_rows(mut self, rows: f64) -> Self {
        self.plan_rows = Some(rows);
        self
    }

    /// Sets the measured timing, rows and loops
    pub fn with_actuals(mut self, startup: f64, total: f64, rows: f64, loops: u64) -> Self {
        self.actual_startup_time = Some(startup);
        self.actual_total_time = Some(total);
        self.actual_rows = Some(rows);
        self.actual_loops = Some(loops);
        self
    }

    /// Adds a child node
    pub fn with_child(mut self, child: Node) -> Self {
        self.plans.push(child);
        self
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_name = Some(relation.into());
        self
    }

    /// Marks the node as a sub-plan of its parent
    pub fn with_subplan(
        mut self,
        relationship: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.parent_relationship = Some(relationship.into());
        self.subplan_name = Some(name.into());
        self
    }

    /// Returns true if this node is an InitPlan that computes a CTE
    pub fn is_cte(&self) -> bool {
        self.parent_relationship.as_deref() == Some("InitPlan")
            && self
                .subplan_name
                .as_deref()
                .is_some_and(|name| name.starts_with("CTE"))
    }

    pub fn is_init_plan(&self) -> bool {
        self.parent_relationship.as_deref() == Some("InitPlan")
    }

    pub fn is_sub_plan(&self) -> bool {
        self.parent_relationship.as_deref() == Some("SubPlan")
    }

    /// Looks up an untyped property
    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.extra.get(key)
    }

    /// Returns true if the node carries `key`, typed or not
    pub fn has_prop(&self, key: &str) -> bool {
        match key {
            keys::ACTUAL_ROWS => self.actual_rows.is_some(),
            keys::FILTER => self.filter.is_some(),
            keys::PLANS => !self.plans.is_empty(),
            keys::WORKERS => !self.workers.is_empty(),
            _ => self.extra.contains_key(key),
        }
    }

    /// Stores a property, routing well-known keys to their typed field.
    ///
    /// A value whose variant does not fit the typed field is kept in
    /// `extra` instead of being discarded.
    pub fn set_property(&mut self, key: &str, value: PropValue) {
        match (key, value) {
            (keys::NODE_TYPE, PropValue::Text(s)) => self.node_type = Some(s),
            (keys::PARENT_RELATIONSHIP, PropValue::Text(s)) => self.parent_relationship = Some(s),
            (keys::SUBPLAN_NAME, PropValue::Text(s)) => self.subplan_name = Some(s),
            (keys::RELATION_NAME, PropValue::Text(s)) => self.relation_name = Some(s),
            (keys::ALIAS, PropValue::Text(s)) => self.alias = Some(s),
            (keys::INDEX_NAME, PropValue::Text(s)) => self.index_name = Some(s),
            (keys::CTE_NAME, PropValue::Text(s)) => self.cte_name = Some(s),
            (keys::FUNCTION_NAME, PropValue::Text(s)) => self.function_name = Some(s),
            (keys::JOIN_TYPE, PropValue::Text(s)) => self.join_type = Some(s),
            (keys::FILTER, PropValue::Text(s)) => self.filter = Some(s),
            (keys::STRATEGY, PropValue::Text(s)) => self.strategy = Some(s),
            (keys::OPERATION, PropValue::Text(s)) => self.operation = Some(s),
            (keys::PARTIAL_MODE, PropValue::Text(s)) => self.partial_mode = Some(s),
            (keys::SCAN_DIRECTION, PropValue::Text(s)) => self.scan_direction = Some(s),
            (keys::PARALLEL_AWARE, PropValue::Bool(b)) => self.parallel_aware = Some(b),
            (keys::STARTUP_COST, PropValue::Number(n)) => self.startup_cost = Some(n),
            (keys::TOTAL_COST, PropValue::Number(n)) => self.total_cost = Some(n),
            (keys::PLAN_ROWS, PropValue::Number(n)) => self.plan_rows = Some(n),
            (keys::ACTUAL_STARTUP_TIME, PropValue::Number(n)) => self.actual_startup_time = Some(n),
            (keys::ACTUAL_TOTAL_TIME, PropValue::Number(n)) => self.actual_total_time = Some(n),
            (keys::ACTUAL_ROWS, PropValue::Number(n)) => self.actual_rows = Some(n),
            (keys::ROWS_REMOVED_BY_FILTER, PropValue::Number(n)) => {
                self.rows_removed_by_filter = Some(n)
            }
            (keys::ROWS_REMOVED_BY_JOIN_FILTER, PropValue::Number(n)) => {
                self.rows_removed_by_join_filter = Some(n)
            }
            (keys::ROWS_REMOVED_BY_INDEX_RECHECK, PropValue::Number(n)) => {
                self.rows_removed_by_index_recheck = Some(n)
            }
            (keys::PLAN_WIDTH, PropValue::Number(n)) if whole(n) => {
                self.plan_width = Some(n as u64)
            }
            (keys::ACTUAL_LOOPS, PropValue::Number(n)) if whole(n) => {
                self.actual_loops = Some(n as u64)
            }
            (keys::WORKERS_PLANNED, PropValue::Number(n)) if whole(n) => {
                self.workers_planned = Some(n as u32)
            }
            (keys::WORKERS_LAUNCHED, PropValue::Number(n)) if whole(n) => {
                self.workers_launched = Some(n as u32)
            }
            (key, value) => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    /// Finds the worker with the given number, creating it if needed
    pub fn worker_mut(&mut self, number: u32) -> &mut Worker {
        let index = match self.workers.iter().position(|w| w.worker_number == number) {
            Some(index) => index,
            None => {
                self.workers.push(Worker::new(number));
                self.workers.len() - 1
            }
        };
        &mut self.workers[index]
    }

    /// Every string-valued property of the node, typed or not
    pub fn string_values(&self) -> impl Iterator<Item = &str> {
        [
            &self.node_type,
            &self.parent_relationship,
            &self.subplan_name,
            &self.relation_name,
            &self.alias,
            &self.index_name,
            &self.cte_name,
            &self.function_name,
            &self.join_type,
            &self.filter,
            &self.strategy,
            &self.operation,
            &self.partial_mode,
            &self.scan_direction,
        ]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .chain(self.extra.values().filter_map(PropValue::as_str))
    }

    /// Returns an iterator over this node and all its descendants (pre-order)
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter { stack: vec![self] }
    }

    /// Visits this node and all its descendants mutably (pre-order)
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        for child in &mut self.plans {
            child.walk_mut(f);
        }
    }

    /// Returns the total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        1 + self.plans.iter().map(Node::node_count).sum::<usize>()
    }
}

fn whole(n: f64) -> bool {
    n >= 0.0 && n.fract() == 0.0
}

/// Pre-order iterator over a node subtree
pub struct NodeIter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push children in reverse order so we visit them in order
        for child in node.plans.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// Statistics reported by one parallel worker for a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    #[serde(rename = "Worker Number")]
    pub worker_number: u32,
    #[serde(rename = "Actual Startup Time", default, skip_serializing_if = "Option::is_none")]
    pub actual_startup_time: Option<f64>,
    #[serde(rename = "Actual Total Time", default, skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    #[serde(rename = "Actual Rows", default, skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(rename = "Actual Loops", default, skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<u64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, PropValue>,
}

impl Worker {
    pub fn new(worker_number: u32) -> Self {
        Self {
            worker_number,
            ..Self::default()
        }
    }
}
