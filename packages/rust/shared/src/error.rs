//! Error types for docsmith.
//!
//! Library crates use [`DocsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The content reader has no handler for this extension.
    #[error("unsupported file type: .{0}")]
    UnsupportedFileType(String),

    /// Tabular or text content could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Relational database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Completion service error (transport, HTTP status, or response shape).
    #[error("completion error: {0}")]
    Completion(String),

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsmithError>;

impl DocsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
