//! Node label post-processing
//!
//! Text plans (and MySQL tree-style operation names) pack structured data
//! into the node label: `Index Scan Backward using idx on t alias`,
//! `Hash Right Join`, `Index lookup on t using idx (a=1)`. This module
//! splits such labels into the node type plus typed fields.

use planlens_core::{Node, keys};
use regex::Regex;
use std::sync::LazyLock;

static SCAN_OR_MODIFY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:Parallel\s+)?(?:Seq|Tid.*|Bitmap\s+Heap|WorkTable|(?:Async\s+)?Foreign)\s+Scan|Update|Insert|Delete|Merge)\son\s(\S+)(?:\s+(\S+))?$",
    )
    .expect("valid regex")
});

static BITMAP_INDEX_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Bitmap\s+Index\s+Scan)\son\s(\S+)$").expect("valid regex"));

static INDEX_SCAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:Parallel\s+)?Index(?:\sOnly)?\sScan)(\sBackward)?\susing\s(\S+)\son\s(\S+)(?:\s+(\S+))?$",
    )
    .expect("valid regex")
});

static MYSQL_FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Filter):\s+(.*)$").expect("valid regex"));

/// `Index lookup`, `Single-row index lookup` and `Covering index lookup`
static MYSQL_INDEX_LOOKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Index\slookup|Single-row\sindex\slookup|Covering\sindex\slookup)\son\s(\S+)\susing\s([^\s(]+)(.*)$",
    )
    .expect("valid regex")
});

static MYSQL_TABLE_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Table\sscan)\son\s(\S+)$").expect("valid regex"));

static CTE_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(CTE\sScan)\son\s(\S+)(?:\s+(\S+))?$").expect("valid regex"));

static FUNCTION_SCAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Function\sScan)\son\s(\S+)(?:\s+(\S+))?$").expect("valid regex")
});

static SUBQUERY_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Subquery\sScan)\son\s(.+)$").expect("valid regex"));

static PARALLEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Parallel\s+(.*)").expect("valid regex"));

static JOIN_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)\sJoin$").expect("valid regex"));

static JOIN_MODIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)\s+(Full|Left|Right|Anti)").expect("valid regex"));

/// Creates a node from a free-form label
pub fn labeled_node(label: &str) -> Node {
    let mut node = Node::default();
    apply_label(&mut node, label);
    node
}

/// Sets the node type from `label`, extracting the structured parts it
/// carries into their own fields.
pub fn apply_label(node: &mut Node, label: &str) {
    let mut node_type = label.to_string();

    if let Some(caps) = SCAN_OR_MODIFY.captures(label) {
        node_type = caps[1].to_string();
        node.relation_name = Some(caps[2].to_string());
        if let Some(alias) = caps.get(3) {
            node.alias = Some(alias.as_str().to_string());
        }
    } else if let Some(caps) = BITMAP_INDEX_SCAN.captures(label) {
        node_type = caps[1].to_string();
        node.index_name = Some(caps[2].to_string());
    } else if let Some(caps) = INDEX_SCAN.captures(label) {
        node_type = caps[1].to_string();
        node.scan_direction = Some(
            if caps.get(2).is_some() {
                "Backward"
            } else {
                "Forward"
            }
            .to_string(),
        );
        node.index_name = Some(caps[3].to_string());
        node.relation_name = Some(caps[4].to_string());
        if let Some(alias) = caps.get(5) {
            node.alias = Some(alias.as_str().to_string());
        }
    } else if let Some(caps) = MYSQL_FILTER.captures(label) {
        node_type = caps[1].to_string();
        node.filter = Some(caps[2].to_string());
    } else if let Some(caps) = MYSQL_INDEX_LOOKUP.captures(label) {
        node_type = caps[1].to_string();
        node.relation_name = Some(caps[2].to_string());
        node.index_name = Some(caps[3].to_string());
        let condition = caps[4].trim();
        if !condition.is_empty() {
            node.set_property(keys::ATTACHED_CONDITION, condition.into());
        }
    } else if let Some(caps) = MYSQL_TABLE_SCAN.captures(label) {
        node_type = caps[1].to_string();
        node.relation_name = Some(caps[2].to_string());
    } else if let Some(caps) = CTE_SCAN.captures(label) {
        node_type = caps[1].to_string();
        node.cte_name = Some(caps[2].to_string());
        if let Some(alias) = caps.get(3) {
            node.alias = Some(alias.as_str().to_string());
        }
    } else if let Some(caps) = FUNCTION_SCAN.captures(label) {
        node_type = caps[1].to_string();
        node.function_name = Some(caps[2].to_string());
        if let Some(alias) = caps.get(3) {
            node.alias = Some(alias.as_str().to_string());
        }
    } else if let Some(caps) = SUBQUERY_SCAN.captures(label) {
        node_type = caps[1].to_string();
        node.alias = Some(caps[2].to_string());
    }

    if let Some(caps) = PARALLEL_PREFIX.captures(&node_type) {
        node_type = caps[1].to_string();
        node.parallel_aware = Some(true);
    }

    if let Some(caps) = JOIN_SUFFIX.captures(&node_type) {
        let mut base = caps[1].to_string();
        if let Some(modifier) = JOIN_MODIFIER.captures(&node_type) {
            base = modifier[1].to_string();
            node.join_type = Some(modifier[2].to_string());
        }
        node_type = format!("{base} Join");
    }

    node.node_type = Some(node_type);
}
