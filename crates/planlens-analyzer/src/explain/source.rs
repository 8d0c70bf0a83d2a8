//! Source cleanup
//!
//! EXPLAIN output is usually pasted out of psql, the mysql client or a GUI
//! and carries table borders, quoting and continuation markers. This module
//! strips that decoration so the router and parsers only see plan text.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A line wrapped in the same frame character on both ends
static FRAMED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:\|(.*)\||║(.*)║|│(.*)│)(\r?\n|$)").expect("valid regex")
});

static TRAILING_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[|║│]\r?$").expect("valid regex"));

static SEPARATOR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?:\+-+\+|-{2,}|─{2,}|═{2,}|[├╟╠╞](?:─+|═+)[┤╢╣╡]|└─+┘|╚═+╝|┌─+┐|╔═+╗)\r?(?:\n|$)",
    )
    .expect("valid regex")
});

static QUOTED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^(?:"(.*)"|'(.*)')\r?"#).expect("valid regex"));

static PLUS_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\+\r?\n").expect("valid regex"));

static RETURN_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"↵\r?\n?").expect("valid regex"));

static QUERY_PLAN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*QUERY PLAN\s*\r?\n").expect("valid regex"));

/// Row count footer such as `(8 rows)`, `(1 ligne)` or `(3 Zeilen)`
static ROW_COUNT_FOOTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\(\d+\s+[^)]+\)(?:\r?\n|$)").expect("valid regex"));

/// Strips client decoration from raw EXPLAIN output.
///
/// Removes frame characters, border and separator lines, line quoting,
/// `+`/`↵` continuation markers, the `QUERY PLAN` header and the row count
/// footer. Running it on its own output changes nothing.
pub fn normalize_source(source: &str) -> String {
    let source = FRAMED_LINE.replace_all(source, |caps: &Captures| {
        let inner = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        let newline = if caps[4].is_empty() { "" } else { "\n" };
        format!("{inner}{newline}")
    });
    let source = TRAILING_FRAME.replace_all(&source, "");
    // Quotes go first so quoted separator and header lines are seen below
    let source = QUOTED_LINE.replace_all(&source, |caps: &Captures| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map_or(String::new(), |m| m.as_str().to_string())
    });
    let source = SEPARATOR_LINE.replace_all(&source, "");
    let source = PLUS_CONTINUATION.replace_all(&source, "\n");
    let source = RETURN_CONTINUATION.replace_all(&source, "\n");
    let source = QUERY_PLAN_HEADER.replacen(&source, 1, "");
    let source = ROW_COUNT_FOOTER.replace_all(&source, "\n");
    source.into_owned()
}
