//! Plan level containers
//!
//! `PlanContent` is what a parser produces. `Plan` is what the metrics pass
//! turns it into: the same content plus detached CTE trees, statistics and
//! identity (id, name, creation time).

use crate::keys;
use crate::node::Node;
use crate::value::PropValue;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A parsed plan document: the root node plus top-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanContent {
    #[serde(rename = "Plan")]
    pub plan: Node,
    #[serde(rename = "Query Text", default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    #[serde(rename = "Execution Time", default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(rename = "Planning Time", default, skip_serializing_if = "Option::is_none")]
    pub planning_time: Option<f64>,
    #[serde(rename = "Total Runtime", default, skip_serializing_if = "Option::is_none")]
    pub total_runtime: Option<f64>,

    #[serde(rename = "maxRows", default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<f64>,
    #[serde(rename = "maxCost", default, skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,
    #[serde(rename = "maxTotalCost", default, skip_serializing_if = "Option::is_none")]
    pub max_total_cost: Option<f64>,
    #[serde(rename = "maxDuration", default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<f64>,
    #[serde(rename = "maxEstimateFactor", default, skip_serializing_if = "Option::is_none")]
    pub max_estimate_factor: Option<f64>,

    #[serde(flatten)]
    pub extra: IndexMap<String, PropValue>,
}

impl PlanContent {
    pub fn new(plan: Node) -> Self {
        Self {
            plan,
            ..Self::default()
        }
    }

    /// Stores a top-level property, routing well-known keys to typed fields
    pub fn set_property(&mut self, key: &str, value: PropValue) {
        match (key, value) {
            (keys::QUERY_TEXT, PropValue::Text(s)) => self.query_text = Some(s),
            (keys::EXECUTION_TIME, PropValue::Number(n)) => self.execution_time = Some(n),
            (keys::PLANNING_TIME, PropValue::Number(n)) => self.planning_time = Some(n),
            (keys::TOTAL_RUNTIME, PropValue::Number(n)) => self.total_runtime = Some(n),
            (key, value) => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    fn extra_number(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(PropValue::as_f64)
    }
}

/// Global figures of a derived plan, used to normalize per-node values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStats {
    pub execution_time: Option<f64>,
    pub planning_time: Option<f64>,
    pub max_rows: Option<f64>,
    pub max_cost: Option<f64>,
    pub max_total_cost: Option<f64>,
    pub max_duration: Option<f64>,
    pub max_estimate_factor: Option<f64>,
}

impl PlanStats {
    /// Collects statistics from derived content.
    ///
    /// Execution time falls back to `Total Runtime` (old Postgres releases)
    /// and then to the MySQL `execution_time` property.
    pub fn from_content(content: &PlanContent) -> Self {
        Self {
            execution_time: content
                .execution_time
                .or(content.total_runtime)
                .or_else(|| content.extra_number("execution_time")),
            planning_time: content
                .planning_time
                .or_else(|| content.extra_number("planning_time")),
            max_rows: content.max_rows,
            max_cost: content.max_cost,
            max_total_cost: content.max_total_cost,
            max_duration: content.max_duration,
            max_estimate_factor: content.max_estimate_factor,
        }
    }
}

/// A fully derived plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub created_on: DateTime<Utc>,
    pub content: PlanContent,
    pub query: String,
    /// CTE subtrees detached from the main tree
    pub ctes: Vec<Node>,
    #[serde(rename = "planStats")]
    pub stats: PlanStats,
    /// The root node carries measured rows
    pub is_analyze: bool,
    /// Some node below the root carries an `Output` list
    pub is_verbose: bool,
}

impl Plan {
    /// Wraps parsed content. Derived fields stay empty until the metrics
    /// pass runs.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content: PlanContent,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_on: Utc::now(),
            content,
            query: query.into(),
            ctes: Vec::new(),
            stats: PlanStats::default(),
            is_analyze: false,
            is_verbose: false,
        }
    }

    pub fn root(&self) -> &Node {
        &self.content.plan
    }

    /// Iterates over every node: the main tree first, then each CTE tree
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::once(&self.content.plan)
            .chain(self.ctes.iter())
            .flat_map(Node::iter)
    }

    /// Looks up a node by its identifier, CTE trees included
    pub fn node_by_id(&self, id: u32) -> Option<&Node> {
        self.nodes().find(|node| node.node_id == Some(id))
    }

    /// Flattens the main tree and every CTE tree into display rows.
    ///
    /// The first list is the main tree, followed by one list per CTE.
    pub fn flatten(&self) -> Vec<Vec<FlatPlanNode<'_>>> {
        std::iter::once(&self.content.plan)
            .chain(self.ctes.iter())
            .map(flatten_tree)
            .collect()
    }
}

/// One row of a flattened plan tree
#[derive(Debug, Clone, PartialEq)]
pub struct FlatPlanNode<'a> {
    pub node: &'a Node,
    /// Identifiers from the tree root down to (and including) this node
    pub path: Vec<u32>,
    /// Per ancestor level, whether a later sibling follows on that branch
    pub branches: Vec<bool>,
    pub level: usize,
}

fn flatten_tree(root: &Node) -> Vec<FlatPlanNode<'_>> {
    fn visit<'a>(
        node: &'a Node,
        path: &[u32],
        branches: Vec<bool>,
        level: usize,
        out: &mut Vec<FlatPlanNode<'a>>,
    ) {
        let mut current_path = path.to_vec();
        current_path.extend(node.node_id);
        out.push(FlatPlanNode {
            node,
            path: current_path.clone(),
            branches: branches.clone(),
            level,
        });

        let last = node.plans.len().saturating_sub(1);
        for (index, child) in node.plans.iter().enumerate() {
            let mut child_branches = branches.clone();
            child_branches.push(index != last);
            visit(child, &current_path, child_branches, level + 1, out);
        }
    }

    let mut out = Vec::new();
    visit(root, &[], Vec::new(), 0, &mut out);
    out
}
