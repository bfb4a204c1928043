//! Errors raised while loading property sources.

/// A property source could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A `key=value` line could not be parsed.
    #[error("line {line}: {message}")]
    Syntax {
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// The text is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON document is not an object.
    #[error("expected a JSON object at the top level")]
    NotAnObject,
}
