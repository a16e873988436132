//! Query error types
//!
//! Compiling a query string never fails; these errors come from the strict
//! helpers around it (class lookup, relative-time resolution, transport).

use thiserror::Error;

/// Errors that can occur around query compilation
#[derive(Error, Debug)]
pub enum QueryError {
    /// Malformed input to a strict helper
    #[error("Parse error: {0}")]
    Parse(String),

    /// Entity class is not registered with the parser
    #[error("Unknown entity class: {0}")]
    UnknownClass(String),

    /// Relative-time expression could not be resolved
    #[error("Invalid relative time: {0}")]
    RelativeTime(String),

    /// JSON transport form could not be read or written
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
