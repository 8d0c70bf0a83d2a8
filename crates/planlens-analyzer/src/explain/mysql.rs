//! MySQL EXPLAIN FORMAT=JSON adapter
//!
//! MySQL emits two unrelated JSON layouts:
//! - V1 (`query_block` rooted): `nested_loop` arrays of `table` objects,
//!   wrapped in `ordering_operation`, `grouping_operation` and
//!   `duplicates_removal` blocks
//! - V2 (`explain_json_format_version=2` and hybrids): a generic tree of
//!   `name`/`operation` objects linked through `inputs`, `steps` or
//!   `children`
//!
//! Both are converted into the same `Node` tree the text parser produces.

use crate::explain::label::labeled_node;
use planlens_core::{Node, PropValue, keys};
use serde_json::{Map, Value};

/// V2 properties copied verbatim onto the node
const V2_COPIED_KEYS: [&str; 9] = [
    "filtered",
    "cost_info",
    "attached_condition",
    "used_columns",
    "possible_keys",
    "key",
    "key_length",
    "message",
    "select_id",
];

/// Maps a MySQL access type to a display name
pub fn access_type_name(access_type: &str) -> &str {
    match access_type {
        "ALL" => "Full Table Scan",
        "index" => "Full Index Scan",
        "range" => "Index Range Scan",
        "ref" => "Index Scan",
        "eq_ref" => "Unique Key Lookup",
        "const" => "Constant Lookup",
        "system" => "System",
        "fulltext" => "Full Text Scan",
        "index_merge" => "Index Merge",
        "unique_subquery" => "Unique Subquery",
        "index_subquery" => "Index Subquery",
        other => other,
    }
}

/// Returns true if a JSON object has one of the MySQL plan shapes
pub fn is_mysql(data: &Map<String, Value>) -> bool {
    let has_plan = data.contains_key(keys::PLAN);
    data.contains_key("query_plan")
        || data.contains_key("query_block")
        || data.contains_key("query_spec")
        || (data.contains_key("execution_plan") && !has_plan)
        || ((data.contains_key("inputs") || data.contains_key("steps")) && !has_plan)
}

/// Builds the plan tree of a MySQL JSON document, picking the dialect
pub fn parse_mysql(data: &Map<String, Value>) -> Node {
    if let Some(query_plan) = data.get("query_plan") {
        tracing::debug!("MySQL JSON with query_plan, using V2 builder");
        return parse_v2(query_plan);
    }
    if let Some(block) = data.get("query_block") {
        let tree_shaped = ["inputs", "operation", "execution_plan"]
            .iter()
            .any(|key| block.get(key).is_some());
        if tree_shaped {
            tracing::debug!("MySQL JSON with tree-shaped query_block, using V2 builder");
            return parse_v2(block);
        }
        tracing::debug!("MySQL JSON with query_block, using V1 builder");
        return parse_v1(block);
    }
    if let Some(execution_plan) = data.get("execution_plan") {
        return parse_v2(execution_plan);
    }
    parse_v2(&Value::Object(data.clone()))
}

/// Builds a node from a V1 `query_block` (or any block nested in one)
fn parse_v1(data: &Value) -> Node {
    let nested_loop = data
        .get("nested_loop")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty());

    let mut node = if let Some(items) = nested_loop {
        let mut children = items.iter().map(|item| {
            if let Some(table) = item.get("table") {
                parse_table(table)
            } else if let Some(block) = item.get("query_block") {
                parse_v1(block)
            } else {
                parse_v1(item)
            }
        });
        // Left-deep: ((A x B) x C) x D
        let first = children.next().unwrap_or_default();
        children.fold(first, |left, right| {
            let cost = match (left.total_cost, right.total_cost) {
                (Some(l), Some(r)) if l != 0.0 && r != 0.0 => Some(l + r),
                _ => None,
            };
            let mut join = Node::new("Nested Loops").with_child(left).with_child(right);
            join.total_cost = cost;
            join
        })
    } else if let Some(table) = data.get("table") {
        parse_table(table)
    } else if let Some(inner) = data.get("ordering_operation") {
        Node::new("Sort").with_child(parse_v1(inner))
    } else if let Some(inner) = data.get("grouping_operation") {
        Node::new("Aggregate").with_child(parse_v1(inner))
    } else if let Some(inner) = data.get("duplicates_removal") {
        Node::new("Distinct").with_child(parse_v1(inner))
    } else {
        match data.get("select_id").filter(|id| truthy(id)) {
            Some(id) => Node::new(format!("Select #{}", display(id))),
            None => Node::new("Result"),
        }
    };

    // The block's own query cost wins over whatever the branch computed
    if let Some(cost_info) = data.get("cost_info") {
        node.total_cost = Some(cost_info.get("query_cost").and_then(number).unwrap_or(0.0));
    }

    node
}

/// Builds a scan or lookup leaf from a V1 `table` object
fn parse_table(data: &Value) -> Node {
    let access_type = data
        .get("access_type")
        .and_then(Value::as_str)
        .unwrap_or("Scan");
    let mut node = labeled_node(access_type_name(access_type));

    if let Some(table_name) = data.get("table_name").and_then(Value::as_str) {
        node.relation_name = Some(table_name.to_string());
        node.alias = Some(table_name.to_string());
    }

    node.plan_rows = first_nonzero(data, &["rows_examined_per_scan", "rows_produced_per_join"]);

    if let Some(filtered) = data.get("filtered").and_then(number).filter(|f| *f != 0.0) {
        node.set_property(keys::FILTERED, PropValue::Number(filtered));
    }

    if let Some(cost_info) = data.get("cost_info") {
        let eval = cost_info.get("eval_cost").and_then(number).unwrap_or(0.0);
        let read = cost_info.get("read_cost").and_then(number).unwrap_or(0.0);
        node.total_cost = Some(eval + read);
        node.set_property(keys::COST_INFO, PropValue::Json(cost_info.clone()));
    }

    for (source_key, property) in [
        ("attached_condition", keys::ATTACHED_CONDITION),
        ("used_columns", keys::USED_COLUMNS),
        ("possible_keys", keys::POSSIBLE_KEYS),
        ("key", keys::KEY),
        ("key_length", keys::KEY_LENGTH),
        ("message", keys::MESSAGE),
    ] {
        if let Some(value) = data.get(source_key).filter(|v| truthy(v)) {
            node.set_property(property, PropValue::from_json(value.clone()));
        }
    }

    node
}

/// Builds a node from a V2 tree object
fn parse_v2(data: &Value) -> Node {
    let name = non_empty_str(data, "name")
        .or_else(|| non_empty_str(data, "operation"))
        .or_else(|| non_empty_str(data, "access_type"))
        .map(str::to_string)
        .or_else(|| {
            data.get("select_id")
                .filter(|id| truthy(id))
                .map(|id| format!("Select #{}", display(id)))
        })
        .unwrap_or_else(|| "Unknown".to_string());
    let mut node = labeled_node(access_type_name(&name));

    if let Some(cost_info) = data.get("cost_info") {
        let read = cost_info.get("read_cost").and_then(number);
        let eval = cost_info.get("eval_cost").and_then(number);
        if let Some(query_cost) = cost_info.get("query_cost").and_then(number) {
            node.total_cost = Some(query_cost);
        } else if read.is_some() || eval.is_some() {
            node.total_cost = Some(read.unwrap_or(0.0) + eval.unwrap_or(0.0));
        }
    }
    if node.total_cost.is_none() {
        node.total_cost = data.get("estimated_total_cost").and_then(number);
    }

    for key in V2_COPIED_KEYS {
        if let Some(value) = data.get(key) {
            node.set_property(key, PropValue::from_json(value.clone()));
        }
    }

    if let Some(table_name) = data.get("table_name").and_then(Value::as_str) {
        node.relation_name = Some(table_name.to_string());
        node.alias = Some(table_name.to_string());
    }

    if let Some(rows) = first_nonzero(
        data,
        &["rows_examined_per_scan", "rows_produced_per_join", "estimated_rows"],
    ) {
        node.plan_rows = Some(rows);
    }

    let inputs = ["inputs", "steps", "children"]
        .iter()
        .find_map(|key| data.get(key).and_then(Value::as_array));
    if let Some(inputs) = inputs {
        node.plans = inputs.iter().map(parse_v2).collect();
    } else if let Some(execution_plan) = data.get("execution_plan") {
        node.plans = vec![parse_v2(execution_plan)];
    }

    node
}

/// Reads a number MySQL may have emitted as a JSON number or a string
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn first_nonzero(data: &Value, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|key| data.get(key).and_then(number))
        .find(|n| *n != 0.0)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
