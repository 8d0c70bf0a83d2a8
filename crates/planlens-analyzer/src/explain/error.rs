use thiserror::Error;

/// Errors that can occur when turning EXPLAIN output into a plan
#[derive(Debug, Error)]
pub enum ExplainError {
    /// The input is neither a recognized JSON plan nor a text plan with at
    /// least one node line
    #[error("Unable to parse plan")]
    UnableToParse,

    /// The input is valid JSON but has no `Plan` key and no MySQL shape
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// A `Plan` document that does not fit the plan model
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The background parse task could not deliver a result
    #[error("Parser worker failed: {0}")]
    Worker(String),
}

/// Result type for plan parsing
pub type Result<T> = std::result::Result<T, ExplainError>;
