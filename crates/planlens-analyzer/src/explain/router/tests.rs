//! Tests for format detection

use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// JSON detection
// ============================================================================

mod detection {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strict_json() {
        let value = detect_json(r#"[{"Plan": {"Node Type": "Result"}}]"#);
        assert_eq!(value, Some(json!([{ "Plan": { "Node Type": "Result" } }])));
    }

    #[test]
    fn test_scalars_are_not_plans() {
        assert_eq!(detect_json("42"), None);
        assert_eq!(detect_json(r#""Seq Scan""#), None);
        assert_eq!(detect_json("Seq Scan on t  (cost=0.00..1.00 rows=1 width=4)"), None);
    }

    #[test]
    fn test_quoted_json() {
        let value = detect_json(r#"'{"Plan": {"Node Type": "Limit"}}'"#);
        assert_eq!(value, Some(json!({ "Plan": { "Node Type": "Limit" } })));
    }

    #[test]
    fn test_block_with_surrounding_text() {
        let source = indoc! {r#"
            Some client banner
              [
                {
                  "Plan": {
                    "Node Type": "Seq Scan"
                  }
                }
              ]
            Time: 3.2 ms
        "#};

        let value = detect_json(source);
        assert_eq!(value, Some(json!([{ "Plan": { "Node Type": "Seq Scan" } }])));
    }

    #[test]
    fn test_block_with_doubled_quotes() {
        let source = indoc! {r#"
            QUERY PLAN
            [
              {
                ""Plan"": {
                  ""Node Type"": ""Sort""
                }
              }
            ]
        "#};

        let value = detect_json(source);
        assert_eq!(value, Some(json!([{ "Plan": { "Node Type": "Sort" } }])));
    }

    #[test]
    fn test_unterminated_block_is_not_json() {
        let source = "[\n  {\"Plan\": {}}\n";
        assert_eq!(detect_json(source), None);
    }
}

// ============================================================================
// Classification
// ============================================================================

mod classification {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_postgres_array_is_unwrapped() {
        let content = content_from_json(json!([
            { "Plan": { "Node Type": "Seq Scan", "Total Cost": 4.0 }, "Execution Time": 0.5 },
            { "Plan": { "Node Type": "Ignored" } }
        ]))
        .expect("parse failed");

        assert_eq!(content.plan.node_type(), "Seq Scan");
        assert_eq!(content.execution_time, Some(0.5));
    }

    #[test]
    fn test_plan_key_wins_over_mysql_keys() {
        let content = content_from_json(json!({
            "Plan": { "Node Type": "Result" },
            "inputs": []
        }))
        .expect("parse failed");

        assert_eq!(content.plan.node_type(), "Result");
    }

    #[test]
    fn test_mysql_keeps_top_level_scalars() {
        let content = content_from_json(json!({
            "query": "select * from t1",
            "execution_time": 1.25,
            "query_plan": { "access_type": "ALL", "table_name": "t1" }
        }))
        .expect("parse failed");

        assert_eq!(content.plan.node_type(), "Full Table Scan");
        assert_eq!(content.extra.get("query"), Some(&PropValue::from("select * from t1")));
        assert_eq!(content.extra.get("execution_time"), Some(&PropValue::Number(1.25)));
        assert!(!content.extra.contains_key("query_plan"));
    }

    #[test]
    fn test_unknown_object_is_invalid_plan() {
        let err = content_from_json(json!({ "rows": 3 })).unwrap_err();
        assert!(matches!(err, ExplainError::InvalidPlan(_)));
        assert_eq!(err.to_string(), "Invalid plan: no Plan key and no recognized MySQL shape");
    }

    #[test]
    fn test_empty_array_is_invalid_plan() {
        let err = content_from_json(json!([])).unwrap_err();
        assert!(matches!(err, ExplainError::InvalidPlan(_)));
    }

    #[test]
    fn test_json_without_plan_does_not_fall_back_to_text() {
        let err = parse_normalized(r#"{"message": "Seq Scan on t  (cost=0.00..1.00 rows=1)"}"#)
            .unwrap_err();
        assert!(matches!(err, ExplainError::InvalidPlan(_)));
    }
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_text_is_routed_to_text_parser() {
    let content = parse_normalized("Seq Scan on users  (cost=0.00..35.50 rows=2550 width=4)")
        .expect("parse failed");

    assert_eq!(content.plan.node_type(), "Seq Scan");
    assert_eq!(content.plan.relation_name.as_deref(), Some("users"));
}

#[test]
fn test_unparseable_text() {
    let err = parse_normalized("hello world").unwrap_err();
    assert!(matches!(err, ExplainError::UnableToParse));
}
