//! Values held in a node's open property bag

use serde::{Deserialize, Serialize};

/// A loosely typed property value.
///
/// Plan sources attach many properties the model does not know about
/// (sort keys, buffer counters, MySQL `cost_info` objects, ...). They are
/// kept in this union instead of being dropped so renderers can show them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Json(serde_json::Value),
}

impl PropValue {
    /// Converts an arbitrary JSON value into the narrowest matching variant
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Json(serde_json::Value::Number(n)),
            },
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) if items.iter().all(|v| v.is_string()) => Self::List(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        serde_json::Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Self::Json(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text used when the value takes part in a textual search: strings as
    /// they are, lists joined by spaces, nothing for other variants.
    pub fn search_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::List(items) => Some(items.join(" ")),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for PropValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(value)
    }
}
