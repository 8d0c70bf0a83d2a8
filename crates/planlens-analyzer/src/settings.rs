//! Analyzer settings
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) gives the stock behavior.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs for `PlanService`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    /// Run the async parse on the tokio blocking pool when a runtime exists
    #[serde(default = "default_offload_parsing")]
    pub offload_parsing: bool,

    /// Name given to plans created without one. When unset the name is
    /// `plan created on <date>`.
    #[serde(default)]
    pub default_plan_name: Option<String>,
}

fn default_offload_parsing() -> bool {
    true
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            offload_parsing: default_offload_parsing(),
            default_plan_name: None,
        }
    }
}

impl AnalyzerSettings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse analyzer settings")
    }

    /// Reads settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid settings file: {:?}", path))
    }
}
