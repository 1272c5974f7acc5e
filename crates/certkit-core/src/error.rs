//! Error types for certkit core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages.

use thiserror::Error;

/// Result type alias for certkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for certkit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced template, page or element does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Data validation error (bad element payload, malformed record)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Sequence invariant violation: a gap or duplicate was detected
    /// within a template or page scope
    #[error("Sequence invariant violated: {0}")]
    Sequence(String),

    /// Rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Generic error (fallback)
    #[error("{0}")]
    Other(String),
}
