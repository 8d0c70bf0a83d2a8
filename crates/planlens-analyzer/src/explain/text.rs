//! Text plan parser
//!
//! Parses the indented tree printed by Postgres `EXPLAIN [ANALYZE]` and
//! MySQL `EXPLAIN FORMAT=TREE` / `EXPLAIN ANALYZE`:
//!
//! ```text
//! Hash Join  (cost=10.00..100.00 rows=500 width=72) (actual time=0.5..4.2 rows=480 loops=1)
//!   Hash Cond: (o.user_id = u.id)
//!   ->  Seq Scan on orders o  (cost=0.00..50.00 rows=1000 width=40)
//!   ->  Hash  (cost=5.00..5.00 rows=100 width=32)
//!         ->  Seq Scan on users u  (cost=0.00..5.00 rows=100 width=32)
//! Planning Time: 0.123 ms
//! ```
//!
//! Parsing runs in two phases. [`split_into_lines`] merges physical lines
//! that were force-wrapped by a client back into logical lines. Each
//! logical line is then classified (node, sub-plan marker, CTE marker,
//! worker, trigger or property) and the tree is assembled from the line
//! indentation with an explicit stack of open ancestors.
//!
//! Lines that match nothing are skipped.

use crate::explain::error::{ExplainError, Result};
use crate::explain::label::labeled_node;
use convert_case::{Case, Casing};
use indexmap::IndexMap;
use planlens_core::{Node, PlanContent, PropValue, Worker, keys};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Integer, decimal or scientific notation
const NUMBER: &str = r"\d+(?:\.\d+)?(?:[eE][+-]?\d+)?";

/// Lines starting with one of these words always open a new logical line
static TOP_LEVEL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:Total\s+runtime|Planning(?:\s+time)?|Execution\s+time|Time|Filter|Output|JIT|Trigger|Settings)",
    )
    .expect("valid regex")
});

static ARROW_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*->").expect("valid regex"));

static TRAILING_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""\s*$"#).expect("valid regex"));

static LEADING_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*""#).expect("valid regex"));

static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:QUERY|---|#)").expect("valid regex"));

/// `(cost=1.00..2.00 rows=3 width=4)`, with the range and width optional
static COST_FRAGMENT: LazyLock<String> = LazyLock::new(|| {
    format!(
        r"\(cost=(?P<startup>{NUMBER})(?:\.\.(?P<total>{NUMBER}))?\s+rows=(?P<rows>{NUMBER})(?:\s+width=(?P<width>\d+))?\)"
    )
});

/// `actual time=0.1..0.2 rows=3 loops=1` (time optional) or `never executed`
static ACTUAL_FRAGMENT: LazyLock<String> = LazyLock::new(|| {
    format!(
        r"(?:actual(?:\s+time=(?P<time_first>{NUMBER})\.\.(?P<time_last>{NUMBER}))?\s+rows=(?P<actual_rows>{NUMBER})\s+loops=(?P<loops>\d+)|(?P<never>never\s+executed))"
    )
});

/// Node line shapes, tried in order
static NODE_LINES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    let cost = COST_FRAGMENT.as_str();
    let actual = ACTUAL_FRAGMENT.as_str();
    [
        node_line_pattern(&format!(r"{cost}\s+\({actual}\)")),
        node_line_pattern(cost),
        node_line_pattern(&format!(r"\({actual}\)")),
    ]
});

static SUBPLAN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:Sub|Init)Plan)\s*(?:\d+\s*)?\s*(?:\(returns.*\)\s*)?$").expect("valid regex")
});

static CTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CTE\s+(\S+)\s*$").expect("valid regex"));

static WORKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^Worker\s+(?P<number>\d+):\s+(?:{})?(?P<extra>.*?)\s*$",
        ACTUAL_FRAGMENT.as_str()
    ))
    .expect("valid regex")
});

static TRIGGER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Trigger\s+(.*):\s+time=(\d+\.\d+)\s+calls=(\d+)\s*$").expect("valid regex")
});

static EXTRA_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S.*\S)\s*$").expect("valid regex"));

static MS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+ms$").expect("valid regex"));

static NUMERIC_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?$").expect("valid regex"));

fn node_line_pattern(metrics: &str) -> Regex {
    Regex::new(&format!(
        r"^(?:->\s*)?(?:(?P<partial>Finalize|Simple|Partial)\s+)?(?P<label>.*?)\s*{metrics}\s*$"
    ))
    .expect("valid regex")
}

// ============================================================================
// Phase A: logical lines
// ============================================================================

/// Splits source into logical lines, undoing force-wrapping.
///
/// A physical line continues the previous logical line when parentheses
/// are still open, when it starts with `(` or closes a parenthesis before
/// opening one, or when the previous line ends with a comma and this one
/// is indented differently and is not a `->` node line. Lines starting
/// with a top-level keyword (`Planning Time`, `Filter`, `JIT`, ...) always
/// start a new logical line.
pub fn split_into_lines(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut balance = 0i32;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let line_balance = paren_balance(line);

        let continues = match out.last() {
            None => false,
            Some(_) if TOP_LEVEL_KEYWORD.is_match(line) => false,
            Some(_) if balance != 0 => true,
            Some(_) if line.trim_start().starts_with('(') || closes_first(line) => true,
            Some(previous) => {
                previous.trim_end().ends_with(',')
                    && first_non_blank(previous) != first_non_blank(line)
                    && !ARROW_LINE.is_match(line)
            }
        };

        match out.last_mut() {
            Some(last) if continues => {
                last.push_str(line);
                balance += line_balance;
            }
            _ => {
                out.push(line.to_string());
                balance = line_balance;
            }
        }
    }

    out
}

fn paren_balance(line: &str) -> i32 {
    line.chars().fold(0, |balance, c| match c {
        '(' => balance + 1,
        ')' => balance - 1,
        _ => balance,
    })
}

/// A `)` appears before any `(`
fn closes_first(line: &str) -> bool {
    match (line.find(')'), line.find('(')) {
        (Some(close), Some(open)) => close < open,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Index of the first non-whitespace character, -1 for a blank line
fn first_non_blank(line: &str) -> isize {
    line.find(|c: char| !c.is_whitespace())
        .map_or(-1, |index| index as isize)
}

// ============================================================================
// Line classification
// ============================================================================

/// Estimated figures of a node line
#[derive(Debug, Clone, PartialEq)]
struct CostInfo {
    startup: Option<f64>,
    total: f64,
    rows: f64,
    width: Option<u64>,
}

impl CostInfo {
    fn from_captures(caps: &Captures) -> Option<Self> {
        let first = parse_number(caps.name("startup")?.as_str())?;
        // A single figure (MySQL) is the total cost
        let (startup, total) = match caps.name("total").and_then(|m| parse_number(m.as_str())) {
            Some(total) => (Some(first), total),
            None => (None, first),
        };
        Some(Self {
            startup,
            total,
            rows: parse_number(caps.name("rows")?.as_str())?,
            width: caps.name("width").and_then(|m| m.as_str().parse().ok()),
        })
    }
}

/// Measured figures of a node or worker line
#[derive(Debug, Clone, PartialEq)]
enum ActualInfo {
    Measured {
        time: Option<(f64, f64)>,
        rows: f64,
        rows_fractional: bool,
        loops: u64,
    },
    NeverExecuted,
}

impl ActualInfo {
    fn from_captures(caps: &Captures) -> Option<Self> {
        if caps.name("never").is_some() {
            return Some(Self::NeverExecuted);
        }
        let rows = caps.name("actual_rows")?.as_str();
        let time = match (caps.name("time_first"), caps.name("time_last")) {
            (Some(first), Some(last)) => {
                Some((parse_number(first.as_str())?, parse_number(last.as_str())?))
            }
            _ => None,
        };
        Some(Self::Measured {
            time,
            rows: parse_number(rows)?,
            rows_fractional: rows.contains('.'),
            loops: caps.name("loops")?.as_str().parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NodeLine {
    partial_mode: Option<String>,
    label: String,
    cost: Option<CostInfo>,
    actual: Option<ActualInfo>,
}

impl NodeLine {
    fn into_node(self) -> Node {
        let mut node = labeled_node(&self.label);

        if let Some(cost) = self.cost {
            node.startup_cost = cost.startup;
            node.total_cost = Some(cost.total);
            node.plan_rows = Some(cost.rows);
            node.plan_width = cost.width;
        }

        match self.actual {
            Some(ActualInfo::Measured {
                time,
                rows,
                rows_fractional,
                loops,
            }) => {
                if let Some((startup, total)) = time {
                    node.actual_startup_time = Some(startup);
                    node.actual_total_time = Some(total);
                }
                node.actual_rows = Some(rows);
                node.actual_rows_fractional = rows_fractional;
                node.actual_loops = Some(loops);
            }
            Some(ActualInfo::NeverExecuted) => {
                node.actual_loops = Some(0);
                node.actual_rows = Some(0.0);
                node.actual_total_time = None;
            }
            None => {}
        }

        if self.partial_mode.is_some() {
            node.partial_mode = self.partial_mode;
        }

        node
    }
}

/// Links the node that follows a `SubPlan`, `InitPlan` or `CTE` marker to
/// its host
#[derive(Debug, Clone, PartialEq)]
struct SubplanLink {
    relationship: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq)]
struct WorkerLine {
    number: u32,
    actual: Option<ActualInfo>,
    extra: String,
}

impl WorkerLine {
    /// Applies the line to a worker record. Returns false when the line
    /// carries text that is not a `key: value` pair.
    fn apply(self, worker: &mut Worker) -> bool {
        if let Some(ActualInfo::Measured {
            time: Some((startup, total)),
            rows,
            loops,
            ..
        }) = self.actual
        {
            worker.actual_startup_time = Some(startup);
            worker.actual_total_time = Some(total);
            worker.actual_rows = Some(rows);
            worker.actual_loops = Some(loops);
        }

        if self.extra.is_empty() {
            return true;
        }
        match split_property(&self.extra) {
            Some((key, value)) => {
                worker
                    .extra
                    .insert(key.to_case(Case::Title), PropValue::from(value));
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LineKind {
    Node(NodeLine),
    Marker(SubplanLink),
    Worker(WorkerLine),
    Trigger,
    Property(String),
    Ignored,
}

/// Classifies a logical line with its indentation already removed
fn classify(line: &str) -> LineKind {
    if line.is_empty() || HEADER_LINE.is_match(line) {
        return LineKind::Ignored;
    }

    if let Some(caps) = SUBPLAN_MARKER.captures(line) {
        return LineKind::Marker(SubplanLink {
            relationship: caps[1].to_string(),
            name: line.trim_end().to_string(),
        });
    }

    if let Some(caps) = CTE_MARKER.captures(line) {
        return LineKind::Marker(SubplanLink {
            relationship: "InitPlan".to_string(),
            name: format!("CTE {}", &caps[1]),
        });
    }

    if let Some(caps) = NODE_LINES.iter().find_map(|pattern| pattern.captures(line)) {
        return LineKind::Node(NodeLine {
            partial_mode: caps.name("partial").map(|m| m.as_str().to_string()),
            label: caps["label"].to_string(),
            cost: CostInfo::from_captures(&caps),
            actual: ActualInfo::from_captures(&caps),
        });
    }

    if let Some(caps) = WORKER_LINE.captures(line)
        && let Ok(number) = caps["number"].parse()
    {
        return LineKind::Worker(WorkerLine {
            number,
            actual: ActualInfo::from_captures(&caps),
            extra: caps["extra"].to_string(),
        });
    }

    if TRIGGER_LINE.is_match(line) {
        return LineKind::Trigger;
    }

    if let Some(caps) = EXTRA_LINE.captures(line) {
        return LineKind::Property(caps[1].to_string());
    }

    LineKind::Ignored
}

/// Splits `key: value` at the first `": "`, requiring a non-empty value
fn split_property(text: &str) -> Option<(&str, &str)> {
    text.split_once(": ").filter(|(_, value)| !value.is_empty())
}

/// Turns a property value into a number when it is one, dropping a ` ms` unit
fn coerce_value(value: &str) -> PropValue {
    let value = MS_SUFFIX.replace(value, "");
    if NUMERIC_VALUE.is_match(&value)
        && let Some(number) = parse_number(&value)
    {
        return PropValue::Number(number);
    }
    PropValue::Text(value.into_owned())
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse().ok()
}

// ============================================================================
// Phase B: tree assembly
// ============================================================================

/// An open ancestor: a node, or a marker hosted by a node
#[derive(Debug, Clone)]
struct Frame {
    depth: usize,
    node: Option<usize>,
    link: Option<SubplanLink>,
}

/// Chain of open ancestors, innermost last
#[derive(Debug, Default)]
struct AncestorStack {
    frames: Vec<Frame>,
}

impl AncestorStack {
    /// Closes every frame at `depth` or deeper
    fn pop_to_depth(&mut self, depth: usize) {
        while self.frames.last().is_some_and(|frame| frame.depth >= depth) {
            self.frames.pop();
        }
    }

    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn top_node(&self) -> Option<usize> {
        self.top().and_then(|frame| frame.node)
    }

    fn clear(&mut self) {
        self.frames.clear();
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Nodes under construction, linked by index until the tree is complete
#[derive(Debug, Default)]
struct NodeArena {
    nodes: Vec<Node>,
    children: Vec<Vec<usize>>,
    root: Option<usize>,
}

impl NodeArena {
    fn add(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.children.push(Vec::new());
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: usize, child: usize) {
        self.children[parent].push(child);
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }

    fn into_root(mut self) -> Option<Node> {
        let root = self.root?;
        Some(self.build(root))
    }

    fn build(&mut self, index: usize) -> Node {
        let mut node = std::mem::take(&mut self.nodes[index]);
        let children = std::mem::take(&mut self.children[index]);
        node.plans = children.into_iter().map(|child| self.build(child)).collect();
        node
    }
}

#[derive(Debug, Default)]
struct TextPlanBuilder {
    stack: AncestorStack,
    arena: NodeArena,
    /// Plan level properties (timings, `Query Text`, ...) in source order
    root_props: IndexMap<String, PropValue>,
}

impl TextPlanBuilder {
    fn process(&mut self, raw: &str) {
        let line = TRAILING_QUOTE.replace(raw, "");
        let line = LEADING_QUOTE.replace(&line, "");
        let line = line.replace('\t', "    ");

        let content = line.trim_start();
        let depth = line.chars().count() - content.chars().count();
        let content = content.trim_end();

        match classify(content) {
            LineKind::Node(node_line) => self.add_node(depth, node_line.into_node()),
            LineKind::Marker(link) => self.open_marker(depth, link),
            LineKind::Worker(worker_line) => self.add_worker(worker_line),
            LineKind::Trigger => self.stack.pop_to_depth(depth),
            LineKind::Property(text) => self.add_property(depth, &text),
            LineKind::Ignored => {}
        }
    }

    fn add_node(&mut self, depth: usize, mut node: Node) {
        if self.stack.is_empty() {
            let index = self.arena.add(node);
            self.arena.root = Some(index);
            self.stack.push(Frame {
                depth,
                node: Some(index),
                link: None,
            });
            return;
        }

        self.stack.pop_to_depth(depth);
        let Some(Frame {
            node: Some(parent),
            link,
            ..
        }) = self.stack.top().cloned()
        else {
            tracing::trace!(node_type = node.node_type(), "dropping node line without parent");
            return;
        };

        if let Some(link) = link {
            node.parent_relationship = Some(link.relationship);
            node.subplan_name = Some(link.name);
        }

        let index = self.arena.add(node);
        self.arena.attach(parent, index);
        self.stack.push(Frame {
            depth,
            node: Some(index),
            link: None,
        });
    }

    fn open_marker(&mut self, depth: usize, link: SubplanLink) {
        self.stack.pop_to_depth(depth);
        let host = self.stack.top_node();
        self.stack.push(Frame {
            depth,
            node: host,
            link: Some(link),
        });
    }

    fn add_worker(&mut self, worker_line: WorkerLine) {
        let Some(index) = self.stack.top_node() else {
            tracing::trace!(worker = worker_line.number, "dropping worker line without node");
            return;
        };
        let number = worker_line.number;
        let worker = self.arena.node_mut(index).worker_mut(number);
        if !worker_line.apply(worker) {
            tracing::trace!(worker = number, "worker line without key/value pair");
        }
    }

    fn add_property(&mut self, depth: usize, text: &str) {
        // Plan level lines (timings) sit at depth 1 when the root node is
        // at depth 0, so they close every open node.
        if depth == 1 {
            self.stack.clear();
        } else {
            self.stack.pop_to_depth(depth);
        }

        let target = if self.stack.is_empty() {
            None
        } else {
            match self.stack.top_node() {
                Some(index) => Some(index),
                None => return,
            }
        };

        // Before the first node, lines after `Query Text` belong to the query
        if target.is_none()
            && self.arena.root.is_none()
            && let Some(PropValue::Text(query)) = self.root_props.get_mut(keys::QUERY_TEXT)
        {
            query.push('\n');
            query.push_str(text);
            return;
        }

        let Some((key, value)) = split_property(text) else {
            tracing::trace!(line = text, "skipping unrecognized line");
            return;
        };

        let key = if key.contains(" runtime") || key.contains(" time") {
            key.to_case(Case::Title)
        } else {
            key.to_string()
        };
        let value = coerce_value(value);

        match target {
            Some(index) => self.arena.node_mut(index).set_property(&key, value),
            None => {
                self.root_props.insert(key, value);
            }
        }
    }

    fn finish(self) -> Result<PlanContent> {
        let root = self.arena.into_root().ok_or(ExplainError::UnableToParse)?;
        let mut content = PlanContent::new(root);
        for (key, value) in self.root_props {
            content.set_property(&key, value);
        }
        Ok(content)
    }
}

/// Parses a text plan into plan content
pub fn parse_text(text: &str) -> Result<PlanContent> {
    let mut builder = TextPlanBuilder::default();
    for line in split_into_lines(text) {
        builder.process(&line);
    }
    let content = builder.finish()?;
    tracing::debug!(nodes = content.plan.node_count(), "parsed text plan");
    Ok(content)
}
