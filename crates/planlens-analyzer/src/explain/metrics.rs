//! Metrics derivation
//!
//! Turns a parsed tree into an analyzable plan. One pass per plan:
//! - numbers every node in pre-order, starting at 1
//! - computes the planner row estimate factor and direction
//! - detaches CTE subtrees into `Plan::ctes`
//! - propagates the worker fan-out of `Gather` nodes to their children
//! - derives absolute timings, exclusive duration and cost, and the
//!   loop-adjusted ("revised") row counts
//! - canonicalizes JSON node types to the names the text format uses
//!
//! After the traversal, time spent computing CTEs and InitPlans is removed
//! from the nodes that consume them, and plan-wide maxima are collected.

use planlens_core::{EstimateDirection, Node, Plan, PlanStats, PropValue, keys};
use regex::Regex;
use std::sync::LazyLock;

/// `InitPlan 2 (returns $1)`: the reference token is `$1`, else `InitPlan 2`
static INIT_PLAN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(InitPlan\s+[0-9]+)(?:\s+\(returns (\$[0-9]+)\))*").expect("valid regex")
});

/// Derives every metric of `plan` in place.
///
/// Must run exactly once per plan: absolute timings overwrite the
/// per-loop figures the source reported.
pub fn derive(plan: &mut Plan) {
    plan.is_analyze = plan.content.plan.actual_rows.is_some();
    plan.is_verbose = has_output_below(&plan.content.plan);

    let mut pass = DerivationPass::default();
    pass.process_node(&mut plan.content.plan);
    plan.ctes = pass.ctes;

    if plan.is_analyze {
        fix_cte_scans_duration(plan);
        fix_init_plan_usage_duration(plan);
    }
    calculate_maximums(plan);
    plan.stats = PlanStats::from_content(&plan.content);

    tracing::debug!(
        nodes = pass.next_id - 1,
        ctes = plan.ctes.len(),
        analyze = plan.is_analyze,
        "derived plan metrics"
    );
}

/// State of one traversal: the id counter and the CTEs detached so far
#[derive(Debug)]
struct DerivationPass {
    next_id: u32,
    ctes: Vec<Node>,
}

impl Default for DerivationPass {
    fn default() -> Self {
        Self {
            next_id: 1,
            ctes: Vec::new(),
        }
    }
}

impl DerivationPass {
    fn process_node(&mut self, node: &mut Node) {
        node.node_id = Some(self.next_id);
        self.next_id += 1;
        calculate_planner_estimate(node);
        node.search_string = Some(search_string(node));

        let planned = node.workers_planned.or(node.workers_planned_by_gather);
        let launched = node.workers_launched.or(node.workers_launched_by_gather);

        let children = std::mem::take(&mut node.plans);
        let mut kept = Vec::with_capacity(children.len());
        for mut child in children {
            if child.is_cte() {
                // Reserve the slot first so an outer CTE precedes the CTEs
                // nested in it
                let slot = self.ctes.len();
                self.ctes.push(Node::default());
                self.process_node(&mut child);
                self.ctes[slot] = child;
                continue;
            }

            if !child.is_init_plan() && !child.is_sub_plan() {
                child.workers_planned_by_gather = planned;
                child.workers_launched_by_gather = launched;
            }
            self.process_node(&mut child);
            kept.push(child);
        }
        node.plans = kept;

        // Children are final at this point, so their absolute times can be
        // subtracted
        calculate_actuals(node);
        convert_node_type(node);
    }
}

fn calculate_planner_estimate(node: &mut Node) {
    let (Some(actual), Some(planned)) = (node.actual_rows, node.plan_rows) else {
        return;
    };

    let direction = if actual > planned {
        EstimateDirection::Under
    } else if actual < planned {
        EstimateDirection::Over
    } else {
        EstimateDirection::None
    };
    let factor = if actual == planned {
        1.0
    } else {
        actual.max(planned) / actual.min(planned)
    };

    node.planner_estimate_factor = Some(factor);
    node.planner_estimate_direction = Some(direction);
}

/// Lower-cased text the UI filters nodes with
fn search_string(node: &Node) -> String {
    let typed = [
        &node.node_type,
        &node.relation_name,
        &node.alias,
        &node.index_name,
        &node.cte_name,
        &node.function_name,
        &node.filter,
        &node.join_type,
    ]
    .map(|field| field.clone().unwrap_or_default());

    let extra = [keys::HASH_CONDITION, keys::GROUP_KEY, keys::SORT_KEY].map(|key| {
        node.prop(key)
            .and_then(PropValue::search_text)
            .unwrap_or_default()
    });

    typed
        .into_iter()
        .chain(extra)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Sources report time per loop and per worker. Converts it to wall time,
/// then derives the exclusive figures and revised row counts.
fn calculate_actuals(node: &mut Node) {
    if let Some(total) = node.actual_total_time {
        let loops = node.actual_loops.unwrap_or(1) as f64;
        let workers = f64::from(node.workers_launched_by_gather.unwrap_or(0)) + 1.0;
        let total = total * loops / workers;
        node.actual_total_time = Some(total);
        node.actual_startup_time = node
            .actual_startup_time
            .map(|startup| startup * loops / workers);

        // InitPlans run outside their parent, except under a Result node
        let is_result = node.node_type() == "Result";
        let children: f64 = node
            .plans
            .iter()
            .filter(|child| !child.is_init_plan() || is_result)
            .filter_map(|child| child.actual_total_time)
            .sum();
        node.exclusive_duration = Some((total - children).max(0.0));
    }

    if let Some(total_cost) = node.total_cost {
        let children: f64 = node.plans.iter().filter_map(|child| child.total_cost).sum();
        node.exclusive_cost = Some((total_cost - children).max(0.0));
    }

    let loops = node.actual_loops.filter(|loops| *loops != 0).unwrap_or(1) as f64;
    let revise = |value: Option<f64>| value.map(|v| v * loops);
    node.actual_rows_revised = revise(node.actual_rows);
    node.plan_rows_revised = revise(node.plan_rows);
    node.rows_removed_by_filter_revised = revise(node.rows_removed_by_filter);
    node.rows_removed_by_join_filter_revised = revise(node.rows_removed_by_join_filter);
    node.rows_removed_by_index_recheck_revised = revise(node.rows_removed_by_index_recheck);
}

/// Renames JSON node types to their text format names
fn convert_node_type(node: &mut Node) {
    let canonical = match (node.node_type(), node.strategy.as_deref()) {
        ("Aggregate", Some(strategy)) => Some(aggregate_name(strategy).to_string()),
        ("ModifyTable", _) => node.operation.clone(),
        _ => None,
    };
    if let Some(node_type) = canonical {
        node.node_type = Some(node_type);
    }
}

fn aggregate_name(strategy: &str) -> &'static str {
    match strategy {
        "Sorted" => "Group Aggregate",
        "Hashed" => "Hash Aggregate",
        "Plain" => "Aggregate",
        other => {
            tracing::warn!(strategy = other, "unsupported aggregate strategy");
            "Aggregate"
        }
    }
}

/// Some node below `node` lists its output columns
fn has_output_below(node: &Node) -> bool {
    node.plans
        .iter()
        .any(|child| child.has_prop(keys::OUTPUT) || has_output_below(child))
}

/// Visits every node mutably: the main tree first, then each CTE tree
fn for_each_node_mut(plan: &mut Plan, mut f: impl FnMut(&mut Node)) {
    plan.content.plan.walk_mut(&mut f);
    for cte in &mut plan.ctes {
        cte.walk_mut(&mut f);
    }
}

/// A CTE's time is reported both on the CTE and on the scans reading it.
/// Removes it from the scans, split by their share of exclusive duration.
fn fix_cte_scans_duration(plan: &mut Plan) {
    let ctes: Vec<(String, f64)> = plan
        .ctes
        .iter()
        .filter_map(|cte| {
            let name = cte.subplan_name.clone()?;
            Some((name, cte.actual_total_time.unwrap_or(0.0)))
        })
        .collect();

    for (subplan_name, cte_duration) in ctes {
        let reads_cte = |node: &Node| {
            node.cte_name
                .as_deref()
                .is_some_and(|name| format!("CTE {name}") == subplan_name)
        };

        let scans_duration: f64 = plan
            .nodes()
            .filter(|node| reads_cte(node))
            .filter_map(|node| node.exclusive_duration)
            .sum();
        if scans_duration == 0.0 {
            continue;
        }

        for_each_node_mut(plan, |node| {
            if reads_cte(node)
                && let Some(exclusive) = node.exclusive_duration
            {
                let share = cte_duration * exclusive / scans_duration;
                node.exclusive_duration = Some((exclusive - share).max(0.0));
            }
        });
    }
}

/// An InitPlan's time is also counted by the node using its result. The
/// user is found by searching string properties for the InitPlan's
/// reference token, so an unrelated literal containing it can match.
fn fix_init_plan_usage_duration(plan: &mut Plan) {
    let init_plans: Vec<(String, f64)> = plan
        .nodes()
        .filter(|node| node.is_init_plan())
        .filter_map(|node| {
            let caps = INIT_PLAN_NAME.captures(node.subplan_name.as_deref()?)?;
            let token = caps.get(2).or_else(|| caps.get(1))?.as_str().to_string();
            Some((token, node.actual_total_time.unwrap_or(0.0)))
        })
        .collect();

    for (token, duration) in init_plans {
        let user = plan
            .nodes()
            .filter(|node| !node.is_init_plan())
            .find(|node| node.string_values().any(|value| value.contains(&token)))
            .and_then(|node| node.node_id);
        let Some(user) = user else {
            continue;
        };

        for_each_node_mut(plan, |node| {
            if node.node_id == Some(user)
                && let Some(exclusive) = node.exclusive_duration
            {
                node.exclusive_duration = Some((exclusive - duration).max(0.0));
            }
        });
    }
}

fn calculate_maximums(plan: &mut Plan) {
    fn max_of(values: impl Iterator<Item = f64>) -> Option<f64> {
        values.reduce(f64::max)
    }

    let max_rows = max_of(plan.nodes().filter_map(|node| node.actual_rows_revised));
    let max_cost = max_of(plan.nodes().filter_map(|node| node.exclusive_cost));
    let max_total_cost = max_of(plan.nodes().filter_map(|node| node.total_cost));
    let max_duration = max_of(plan.nodes().filter_map(|node| node.exclusive_duration));
    let max_factor = max_of(
        plan.nodes()
            .filter_map(|node| node.planner_estimate_factor)
            .filter(|factor| factor.is_finite()),
    );

    let content = &mut plan.content;
    content.max_rows = max_rows;
    content.max_cost = max_cost;
    content.max_total_cost = max_total_cost;
    content.max_duration = max_duration;
    content.max_estimate_factor = Some(
        max_factor
            .map(|factor| factor * 2.0)
            .filter(|factor| *factor != 0.0)
            .unwrap_or(1.0),
    );
}

#[cfg(test)]
mod tests;
