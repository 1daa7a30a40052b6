//! Error taxonomy for the retrieval and generation pipeline.
//!
//! Library components return [`Result`]; the CLI and configuration loader
//! use `anyhow` on top of it. Each variant carries a stable machine code
//! (see [`Error::code`]) that the HTTP layer forwards to clients.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or blank required input. Raised before any external call.
    #[error("{0}")]
    Validation(String),

    /// Invalid component configuration (e.g. overlap >= chunk size).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Embedding call failed (quota, timeout, malformed input or response).
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Chat completion call failed upstream.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A safety filter rejected the prompt or the completion. Terminal.
    #[error("content policy violation: {0}")]
    ContentPolicy(String),

    /// Read or write failure against chunk or record storage.
    #[error("store error: {0}")]
    Store(String),

    /// A vector's dimensionality differs from the vectors it is compared with.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Error {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Config(_) => "config_error",
            Error::Embedding(_) => "embedding_error",
            Error::Generation(_) => "generation_error",
            Error::ContentPolicy(_) => "content_policy_error",
            Error::Store(_) => "store_error",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            Error::Validation("x".into()),
            Error::Config("x".into()),
            Error::Embedding("x".into()),
            Error::Generation("x".into()),
            Error::ContentPolicy("x".into()),
            Error::Store("x".into()),
            Error::DimensionMismatch {
                expected: 3,
                actual: 2,
            },
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_dimension_message() {
        let err = Error::DimensionMismatch {
            expected: 1536,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "vector dimension mismatch: expected 1536, got 384"
        );
    }
}
