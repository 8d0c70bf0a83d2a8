//! Tests for the Postgres JSON pass-through

use super::*;
use crate::explain::error::ExplainError;
use planlens_core::PropValue;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_parse_nested_plan_nodes_json() {
    let value = json!({
        "Plan": {
            "Node Type": "Hash Join",
            "Parallel Aware": false,
            "Join Type": "Inner",
            "Startup Cost": 10.00,
            "Total Cost": 100.00,
            "Plan Rows": 500,
            "Plan Width": 72,
            "Actual Startup Time": 0.5,
            "Actual Total Time": 4.2,
            "Actual Rows": 480,
            "Actual Loops": 1,
            "Hash Cond": "(o.user_id = u.id)",
            "Plans": [
                {
                    "Node Type": "Seq Scan",
                    "Parent Relationship": "Outer",
                    "Relation Name": "orders",
                    "Alias": "o",
                    "Total Cost": 50.00
                },
                {
                    "Node Type": "Hash",
                    "Parent Relationship": "Inner",
                    "Total Cost": 30.00,
                    "Plans": [
                        { "Node Type": "Seq Scan", "Relation Name": "users", "Total Cost": 30.00 }
                    ]
                }
            ]
        },
        "Planning Time": 0.123,
        "Triggers": [],
        "Execution Time": 4.5
    });

    let content = parse_json_content(value).expect("parse failed");
    let root = &content.plan;

    assert_eq!(root.node_type(), "Hash Join");
    assert_eq!(root.join_type.as_deref(), Some("Inner"));
    assert_eq!(root.startup_cost, Some(10.0));
    assert_eq!(root.actual_rows, Some(480.0));
    assert_eq!(root.actual_loops, Some(1));
    assert_eq!(root.prop("Hash Cond"), Some(&PropValue::from("(o.user_id = u.id)")));
    assert_eq!(root.plans.len(), 2);
    assert_eq!(root.plans[0].alias.as_deref(), Some("o"));
    assert_eq!(root.plans[1].plans[0].relation_name.as_deref(), Some("users"));
    assert_eq!(content.planning_time, Some(0.123));
    assert_eq!(content.execution_time, Some(4.5));
    assert_eq!(root.node_count(), 4);
}

#[test]
fn test_parse_workers() {
    let value = json!({
        "Plan": {
            "Node Type": "Gather",
            "Workers Planned": 2,
            "Workers Launched": 2,
            "Plans": [{
                "Node Type": "Seq Scan",
                "Parallel Aware": true,
                "Workers": [
                    { "Worker Number": 0, "Actual Total Time": 3.1, "Actual Rows": 10, "Actual Loops": 1 },
                    { "Worker Number": 1, "Actual Total Time": 2.9, "Actual Rows": 12, "Actual Loops": 1,
                      "Shared Hit Blocks": 8 }
                ]
            }]
        }
    });

    let content = parse_json_content(value).expect("parse failed");
    let scan = &content.plan.plans[0];

    assert_eq!(content.plan.workers_planned, Some(2));
    assert_eq!(scan.workers.len(), 2);
    assert_eq!(scan.workers[1].worker_number, 1);
    assert_eq!(scan.workers[1].actual_rows, Some(12.0));
    assert_eq!(
        scan.workers[1].extra.get("Shared Hit Blocks"),
        Some(&PropValue::Number(8.0))
    );
}

#[test]
fn test_wrong_field_type_is_invalid_json() {
    let value = json!({ "Plan": { "Node Type": "Seq Scan", "Total Cost": "expensive" } });

    let err = parse_json_content(value).unwrap_err();
    assert!(matches!(err, ExplainError::InvalidJson(_)));
}
