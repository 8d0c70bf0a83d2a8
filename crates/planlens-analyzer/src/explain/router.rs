//! Format detection
//!
//! Decides whether normalized EXPLAIN output is JSON or text, and for JSON
//! whether it is a Postgres `{"Plan": ...}` wrapper or one of the MySQL
//! shapes. JSON is recognized in three attempts:
//! 1. the whole input
//! 2. the input with one layer of surrounding quotes removed
//! 3. the block between the first line that is exactly `[` or `{` and the
//!    matching closing line, with pgAdmin's doubled quotes collapsed
//!
//! Anything that is not JSON goes to the text parser.

use crate::explain::error::{ExplainError, Result};
use crate::explain::{mysql, postgres, text};
use planlens_core::{Node, PlanContent, PropValue, keys};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static BLOCK_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)[\[{]\s*$").expect("valid regex"));

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("valid regex"));

/// Parses normalized source into plan content, whatever its format
pub fn parse_normalized(source: &str) -> Result<PlanContent> {
    match detect_json(source) {
        Some(value) => content_from_json(value),
        None => {
            tracing::debug!("no JSON plan found, using text parser");
            text::parse_text(source)
        }
    }
}

/// Finds a JSON document (object or array) in the source
pub fn detect_json(source: &str) -> Option<Value> {
    parse_json_document(source)
        .or_else(|| strip_quotes(source).and_then(parse_json_document))
        .or_else(|| extract_json_block(source))
}

/// Classifies a JSON document and builds plan content from it
pub fn content_from_json(value: Value) -> Result<PlanContent> {
    let value = match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| ExplainError::InvalidPlan("empty plan array".into()))?,
        other => other,
    };

    let Value::Object(data) = value else {
        return Err(ExplainError::InvalidPlan("expected a JSON object".into()));
    };

    if data.contains_key(keys::PLAN) {
        tracing::debug!("detected Postgres JSON plan");
        return postgres::parse_json_content(Value::Object(data));
    }

    if mysql::is_mysql(&data) {
        tracing::debug!("detected MySQL JSON plan");
        let root = mysql::parse_mysql(&data);
        return Ok(mysql_content(root, data));
    }

    Err(ExplainError::InvalidPlan(
        "no Plan key and no recognized MySQL shape".into(),
    ))
}

/// Wraps a MySQL tree, keeping the document's top-level scalar metadata
fn mysql_content(root: Node, data: Map<String, Value>) -> PlanContent {
    let mut content = PlanContent::new(root);
    for (key, value) in data {
        if matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_)) {
            content.set_property(&key, PropValue::from_json(value));
        }
    }
    content
}

fn parse_json_document(source: &str) -> Option<Value> {
    serde_json::from_str::<Value>(source)
        .ok()
        .filter(|value| value.is_object() || value.is_array())
}

fn strip_quotes(source: &str) -> Option<&str> {
    let trimmed = source.trim();
    ['\'', '"'].into_iter().find_map(|quote| {
        trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}

fn extract_json_block(source: &str) -> Option<Value> {
    let lines: Vec<&str> = LINE_BREAKS.split(source).collect();

    let (first, prefix) = lines.iter().enumerate().find_map(|(index, line)| {
        BLOCK_START
            .captures(line)
            .map(|caps| (index, caps[1].to_string()))
    })?;

    let block_end = Regex::new(&format!(r"^{}[\]}}]\s*$", regex::escape(&prefix))).ok()?;
    let last = (first..lines.len()).find(|index| block_end.is_match(lines[*index]))?;

    let block = lines[first..=last].join("\n").replace("\"\"", "\"");
    let value = parse_json_document(&block);
    if value.is_some() {
        tracing::debug!(first, last, "extracted JSON block from surrounding text");
    }
    value
}

#[cfg(test)]
mod tests;
