//! Plan service
//!
//! Entry point for callers holding raw EXPLAIN output. Parsing produces a
//! `PlanContent`; `create_plan` turns it into a derived `Plan`.

use crate::explain::error::{ExplainError, Result};
use crate::explain::source::normalize_source;
use crate::explain::{metrics, router};
use crate::settings::AnalyzerSettings;
use chrono::Utc;
use planlens_core::{Plan, PlanContent};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A non-whitespace character followed by a run of two or more whitespace
/// characters
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S)(\s{2,})").expect("valid regex"));

/// Parses EXPLAIN output and derives plans from it
#[derive(Debug, Clone, Default)]
pub struct PlanService {
    settings: AnalyzerSettings,
}

impl PlanService {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Parses raw EXPLAIN output in any supported format
    #[tracing::instrument(skip(self, source), fields(source_preview = %source.chars().take(60).collect::<String>()))]
    pub fn from_source(&self, source: &str) -> Result<PlanContent> {
        parse_source(source)
    }

    /// Parses raw EXPLAIN output off the calling task.
    ///
    /// The parse runs on the tokio blocking pool when offloading is enabled
    /// and a runtime is available. If the blocking task fails the source is
    /// parsed again on the caller's thread. Dropping the future does not
    /// stop a parse that already started.
    #[tracing::instrument(skip(self, source), fields(len = source.len()))]
    pub async fn from_source_async(&self, source: String) -> Result<PlanContent> {
        if !self.settings.offload_parsing || tokio::runtime::Handle::try_current().is_err() {
            return parse_source(&source);
        }

        let task_source = source.clone();
        match tokio::task::spawn_blocking(move || parse_source(&task_source)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    error = %ExplainError::Worker(e.to_string()),
                    "background parse failed, parsing inline"
                );
                parse_source(&source)
            }
        }
    }

    /// Wraps parsed content into a plan and derives its metrics.
    ///
    /// An empty `name` falls back to the configured default name, then to
    /// `plan created on <date>`.
    pub fn create_plan(&self, name: &str, content: PlanContent, query: &str) -> Plan {
        let now = Utc::now();
        let name = if name.is_empty() {
            self.settings
                .default_plan_name
                .clone()
                .unwrap_or_else(|| format!("plan created on {}", now.format("%a %b %d %Y")))
        } else {
            name.to_string()
        };

        let mut plan = Plan::new(
            format!("plan_{}", now.timestamp_millis()),
            name,
            content,
            collapse_whitespace(query),
        );
        plan.created_on = now;
        metrics::derive(&mut plan);

        tracing::debug!(plan_id = %plan.id, nodes = plan.nodes().count(), "created plan");
        plan
    }

    /// Parses `source` and derives a plan in one step
    pub fn parse(&self, name: &str, source: &str, query: &str) -> Result<Plan> {
        let content = self.from_source(source)?;
        Ok(self.create_plan(name, content, query))
    }
}

fn parse_source(source: &str) -> Result<PlanContent> {
    let normalized = normalize_source(source);
    router::parse_normalized(&normalized)
}

/// Replaces inner whitespace runs with a single space. A run that starts a
/// new line is kept so line breaks and indentation survive.
fn collapse_whitespace(query: &str) -> String {
    WHITESPACE_RUN
        .replace_all(query, |caps: &Captures| {
            if caps[2].starts_with(['\n', '\r']) {
                caps[0].to_string()
            } else {
                format!("{} ", &caps[1])
            }
        })
        .into_owned()
}
