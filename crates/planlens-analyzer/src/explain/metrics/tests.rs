//! Tests for metrics derivation

use super::*;
use planlens_core::PlanContent;
use pretty_assertions::assert_eq;

fn derived(root: Node) -> Plan {
    let mut plan = Plan::new("plan_test", "test", PlanContent::new(root), "");
    derive(&mut plan);
    plan
}

/// A node with measured timing, one loop and one row
fn timed(node_type: &str, total_time: f64) -> Node {
    Node::new(node_type).with_actuals(0.0, total_time, 1.0, 1)
}

// ============================================================================
// Traversal
// ============================================================================

mod traversal {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ids_are_assigned_in_pre_order() {
        let plan = derived(
            Node::new("Hash Join")
                .with_child(Node::new("Seq Scan").with_relation("a"))
                .with_child(Node::new("Hash").with_child(Node::new("Seq Scan").with_relation("b"))),
        );

        let ids: Vec<(u32, String)> = plan
            .nodes()
            .map(|node| (node.node_id.unwrap_or_default(), node.node_type().to_string()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (1, "Hash Join".to_string()),
                (2, "Seq Scan".to_string()),
                (3, "Hash".to_string()),
                (4, "Seq Scan".to_string()),
            ]
        );
        assert_eq!(
            plan.node_by_id(4).and_then(|n| n.relation_name.as_deref()),
            Some("b")
        );
    }

    #[test]
    fn test_each_plan_numbers_from_one() {
        let first = derived(Node::new("Result").with_child(Node::new("Result")));
        let second = derived(Node::new("Result"));

        assert_eq!(first.content.plan.plans[0].node_id, Some(2));
        assert_eq!(second.content.plan.node_id, Some(1));
    }

    #[test]
    fn test_cte_is_detached() {
        let plan = derived(
            Node::new("CTE Scan")
                .with_child(Node::new("Seq Scan").with_subplan("InitPlan", "CTE recent"))
                .with_child(Node::new("Result").with_subplan("InitPlan", "InitPlan 1 (returns $0)")),
        );

        let root = plan.root();
        assert_eq!(root.plans.len(), 1);
        assert_eq!(root.plans[0].node_type(), "Result");
        assert_eq!(plan.ctes.len(), 1);
        assert_eq!(plan.ctes[0].subplan_name.as_deref(), Some("CTE recent"));
        assert_eq!(plan.ctes[0].node_id, Some(2));
        assert_eq!(root.plans[0].node_id, Some(3));

        let flat = plan.flatten();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[1][0].node.node_id, Some(2));
    }

    #[test]
    fn test_nested_cte_follows_outer_cte() {
        let inner = Node::new("Seq Scan").with_subplan("InitPlan", "CTE inner");
        let outer = Node::new("CTE Scan")
            .with_subplan("InitPlan", "CTE outer")
            .with_child(inner);
        let plan = derived(Node::new("CTE Scan").with_child(outer));

        let names: Vec<&str> = plan
            .ctes
            .iter()
            .filter_map(|cte| cte.subplan_name.as_deref())
            .collect();
        assert_eq!(names, vec!["CTE outer", "CTE inner"]);
        assert!(plan.ctes[0].plans.is_empty());
    }

    #[test]
    fn test_analyze_and_verbose_flags() {
        let mut child = Node::new("Seq Scan");
        child.set_property(keys::OUTPUT, PropValue::List(vec!["id".to_string()]));
        let plan = derived(timed("Limit", 1.0).with_child(child));
        assert!(plan.is_analyze);
        assert!(plan.is_verbose);

        let mut root = Node::new("Seq Scan");
        root.set_property(keys::OUTPUT, PropValue::List(vec!["id".to_string()]));
        let plan = derived(root);
        assert!(!plan.is_analyze);
        assert!(!plan.is_verbose);
    }
}

// ============================================================================
// Per-node metrics
// ============================================================================

mod node_metrics {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_planner_estimate() {
        let plan = derived(
            Node::new("Append")
                .with_child(Node::new("Under").with_plan_rows(10.0).with_actuals(0.0, 1.0, 100.0, 1))
                .with_child(Node::new("Over").with_plan_rows(50.0).with_actuals(0.0, 1.0, 5.0, 1))
                .with_child(Node::new("Exact").with_plan_rows(7.0).with_actuals(0.0, 1.0, 7.0, 1))
                .with_child(Node::new("Zero").with_plan_rows(0.0).with_actuals(0.0, 1.0, 5.0, 1)),
        );
        let children = &plan.root().plans;

        assert_eq!(children[0].planner_estimate_factor, Some(10.0));
        assert_eq!(children[0].planner_estimate_direction, Some(EstimateDirection::Under));
        assert_eq!(children[1].planner_estimate_factor, Some(10.0));
        assert_eq!(children[1].planner_estimate_direction, Some(EstimateDirection::Over));
        assert_eq!(children[2].planner_estimate_factor, Some(1.0));
        assert_eq!(children[2].planner_estimate_direction, Some(EstimateDirection::None));
        assert_eq!(children[3].planner_estimate_factor, Some(f64::INFINITY));
        assert_eq!(plan.root().planner_estimate_factor, None);
    }

    #[test]
    fn test_loops_scale_total_time() {
        let plan = derived(Node::new("Index Scan").with_actuals(2.0, 10.0, 4.0, 5));
        let root = plan.root();

        assert_eq!(root.actual_total_time, Some(50.0));
        assert_eq!(root.actual_startup_time, Some(10.0));
        assert_eq!(root.exclusive_duration, Some(50.0));
        assert_eq!(root.actual_rows_revised, Some(20.0));
    }

    #[test]
    fn test_gather_workers_divide_child_time() {
        let mut gather = timed("Gather", 40.0);
        gather.workers_planned = Some(2);
        gather.workers_launched = Some(2);
        let scan = Node::new("Seq Scan").with_actuals(0.0, 30.0, 10.0, 3);
        let plan = derived(gather.with_child(scan));

        let root = plan.root();
        let scan = &root.plans[0];
        assert_eq!(scan.workers_planned_by_gather, Some(2));
        assert_eq!(scan.workers_launched_by_gather, Some(2));
        assert_eq!(scan.actual_total_time, Some(30.0));
        assert_eq!(root.actual_total_time, Some(40.0));
        assert_eq!(root.exclusive_duration, Some(10.0));
    }

    #[test]
    fn test_workers_propagate_through_descendants_but_not_subplans() {
        let mut gather = Node::new("Gather");
        gather.workers_launched = Some(3);
        let plan = derived(
            gather.with_child(
                Node::new("Hash Join")
                    .with_child(Node::new("Seq Scan"))
                    .with_child(Node::new("Result").with_subplan("SubPlan", "SubPlan 1")),
            ),
        );

        let join = &plan.root().plans[0];
        assert_eq!(join.workers_launched_by_gather, Some(3));
        assert_eq!(join.plans[0].workers_launched_by_gather, Some(3));
        assert_eq!(join.plans[1].workers_launched_by_gather, None);
    }

    #[test]
    fn test_exclusive_duration_subtracts_children_and_clamps() {
        let plan = derived(
            timed("Hash Join", 10.0)
                .with_child(timed("Seq Scan", 3.0))
                .with_child(timed("Hash", 4.0)),
        );
        assert_eq!(plan.root().exclusive_duration, Some(3.0));

        let plan = derived(timed("Limit", 5.0).with_child(timed("Sort", 8.0)));
        assert_eq!(plan.root().exclusive_duration, Some(0.0));
    }

    #[test]
    fn test_init_plan_time_subtracted_only_under_result() {
        let init_plan = || timed("Limit", 4.0).with_subplan("InitPlan", "InitPlan 1");

        let plan = derived(timed("Seq Scan", 10.0).with_child(init_plan()));
        assert_eq!(plan.root().exclusive_duration, Some(10.0));

        let plan = derived(timed("Result", 10.0).with_child(init_plan()));
        assert_eq!(plan.root().exclusive_duration, Some(6.0));
    }

    #[test]
    fn test_exclusive_cost() {
        let plan = derived(
            Node::new("Hash Join")
                .with_cost(Some(5.0), 100.0)
                .with_child(Node::new("Seq Scan").with_cost(Some(0.0), 30.0))
                .with_child(
                    Node::new("Result")
                        .with_cost(None, 10.0)
                        .with_subplan("InitPlan", "InitPlan 1"),
                ),
        );
        assert_eq!(plan.root().exclusive_cost, Some(60.0));

        let plan = derived(
            Node::new("Append")
                .with_cost(None, 100.0)
                .with_child(Node::new("Seq Scan").with_cost(None, 60.0))
                .with_child(Node::new("Seq Scan").with_cost(None, 50.0)),
        );
        assert_eq!(plan.root().exclusive_cost, Some(0.0));
    }

    #[test]
    fn test_revised_rows() {
        let mut node = Node::new("Seq Scan")
            .with_plan_rows(5.0)
            .with_actuals(0.0, 1.0, 10.0, 3);
        node.rows_removed_by_filter = Some(2.0);
        node.rows_removed_by_index_recheck = Some(1.0);
        let plan = derived(node);
        let root = plan.root();

        assert_eq!(root.actual_rows_revised, Some(30.0));
        assert_eq!(root.plan_rows_revised, Some(15.0));
        assert_eq!(root.rows_removed_by_filter_revised, Some(6.0));
        assert_eq!(root.rows_removed_by_join_filter_revised, None);
        assert_eq!(root.rows_removed_by_index_recheck_revised, Some(3.0));
    }

    #[test]
    fn test_zero_loops_revise_as_one() {
        let mut node = Node::new("Seq Scan").with_plan_rows(5.0);
        node.actual_loops = Some(0);
        node.actual_rows = Some(0.0);
        let plan = derived(node);

        assert_eq!(plan.root().plan_rows_revised, Some(5.0));
        assert_eq!(plan.root().exclusive_duration, None);
    }

    #[test]
    fn test_aggregate_and_modify_table_names() {
        let aggregate = |strategy: &str| {
            let mut node = Node::new("Aggregate");
            node.strategy = Some(strategy.to_string());
            node
        };
        let mut modify = Node::new("ModifyTable");
        modify.operation = Some("Insert".to_string());

        let plan = derived(
            Node::new("Append")
                .with_child(aggregate("Sorted"))
                .with_child(aggregate("Hashed"))
                .with_child(aggregate("Plain"))
                .with_child(aggregate("Mixed"))
                .with_child(Node::new("Aggregate"))
                .with_child(modify),
        );
        let types: Vec<&str> = plan.root().plans.iter().map(Node::node_type).collect();

        assert_eq!(
            types,
            vec![
                "Group Aggregate",
                "Hash Aggregate",
                "Aggregate",
                "Aggregate",
                "Aggregate",
                "Insert"
            ]
        );
    }

    #[test]
    fn test_search_string() {
        let mut node = Node::new("Seq Scan").with_relation("Users");
        node.alias = Some("u".to_string());
        node.filter = Some("(A > 1)".to_string());
        node.set_property(
            keys::SORT_KEY,
            PropValue::List(vec!["a".to_string(), "b".to_string()]),
        );
        let plan = derived(node);

        assert_eq!(
            plan.root().search_string.as_deref(),
            Some("seq scan users u    (a > 1)    a b")
        );
    }
}

// ============================================================================
// Plan-wide passes
// ============================================================================

mod plan_passes {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cte_scan(name: &str, total_time: f64) -> Node {
        let mut node = timed("CTE Scan", total_time);
        node.cte_name = Some(name.to_string());
        node
    }

    #[test]
    fn test_cte_time_is_removed_from_scans_proportionally() {
        let cte = timed("Seq Scan", 4.0).with_subplan("InitPlan", "CTE c");
        let plan = derived(
            timed("Hash Join", 20.0)
                .with_child(cte)
                .with_child(cte_scan("c", 6.0))
                .with_child(cte_scan("c", 2.0)),
        );
        let root = plan.root();

        assert_eq!(root.exclusive_duration, Some(12.0));
        assert_eq!(root.plans[0].exclusive_duration, Some(3.0));
        assert_eq!(root.plans[1].exclusive_duration, Some(1.0));
        assert_eq!(plan.ctes[0].exclusive_duration, Some(4.0));
    }

    #[test]
    fn test_cte_fix_skipped_without_analyze() {
        let cte = Node::new("Seq Scan").with_subplan("InitPlan", "CTE c");
        let mut scan = Node::new("CTE Scan");
        scan.cte_name = Some("c".to_string());
        scan.actual_total_time = Some(5.0);
        let plan = derived(Node::new("Append").with_child(cte).with_child(scan));

        assert!(!plan.is_analyze);
        assert_eq!(plan.root().plans[0].exclusive_duration, Some(5.0));
    }

    #[test]
    fn test_init_plan_time_is_removed_from_first_user() {
        let mut user = timed("Seq Scan", 10.0);
        user.filter = Some("(id = $0)".to_string());
        let mut other_user = timed("Seq Scan", 8.0);
        other_user.filter = Some("(parent = $0)".to_string());
        let init_plan = timed("Limit", 3.0).with_subplan("InitPlan", "InitPlan 1 (returns $0)");

        let plan = derived(
            timed("Append", 30.0)
                .with_child(init_plan)
                .with_child(user)
                .with_child(other_user),
        );
        let root = plan.root();

        assert_eq!(root.plans[1].exclusive_duration, Some(7.0));
        assert_eq!(root.plans[2].exclusive_duration, Some(8.0));
        assert_eq!(root.plans[0].exclusive_duration, Some(3.0));
    }

    #[test]
    fn test_init_plan_matched_by_name_without_returns() {
        let mut user = timed("Result", 5.0);
        user.set_property("One-Time Filter", PropValue::from("(InitPlan 2).col1"));
        let init_plan = timed("Seq Scan", 2.0).with_subplan("InitPlan", "InitPlan 2");

        let plan = derived(timed("Limit", 6.0).with_child(user.with_child(init_plan)));
        let result = &plan.root().plans[0];

        // Result subtracts its InitPlan child, then loses it again as its user
        assert_eq!(result.exclusive_duration, Some(1.0));
    }

    #[test]
    fn test_maximums() {
        let mut root = Node::new("Hash Join")
            .with_cost(Some(1.0), 100.0)
            .with_plan_rows(10.0)
            .with_actuals(0.0, 9.0, 40.0, 1);
        root.plans = vec![
            Node::new("Seq Scan")
                .with_cost(Some(0.0), 70.0)
                .with_plan_rows(2.0)
                .with_actuals(0.0, 7.0, 8.0, 2),
            Node::new("Seq Scan")
                .with_cost(Some(0.0), 10.0)
                .with_plan_rows(0.0)
                .with_actuals(0.0, 1.0, 3.0, 1),
        ];
        let plan = derived(root);
        let content = &plan.content;

        assert_eq!(content.max_rows, Some(40.0));
        assert_eq!(content.max_cost, Some(70.0));
        assert_eq!(content.max_total_cost, Some(100.0));
        assert_eq!(content.max_duration, Some(14.0));
        // Largest finite factor is 4 (8 rows vs 2 planned); infinity is ignored
        assert_eq!(content.max_estimate_factor, Some(8.0));
        assert_eq!(plan.stats.max_duration, Some(14.0));
    }

    #[test]
    fn test_estimate_factor_fallback() {
        let plan = derived(Node::new("Seq Scan").with_cost(None, 1.0));
        assert_eq!(plan.content.max_estimate_factor, Some(1.0));
        assert_eq!(plan.content.max_rows, None);
        assert_eq!(plan.stats.max_estimate_factor, Some(1.0));
    }

    #[test]
    fn test_stats_carry_timings() {
        let mut content = PlanContent::new(timed("Result", 0.1));
        content.planning_time = Some(0.3);
        content.execution_time = Some(0.9);
        let mut plan = Plan::new("plan_test", "test", content, "");
        derive(&mut plan);

        assert_eq!(plan.stats.planning_time, Some(0.3));
        assert_eq!(plan.stats.execution_time, Some(0.9));
    }
}
