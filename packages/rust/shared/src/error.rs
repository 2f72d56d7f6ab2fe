//! Error types for Codestep.
//!
//! Library crates use [`CodestepError`] via `thiserror`.
//! The `codestep` binary wraps this with `color-eyre` for rich diagnostics,
//! and the web crate maps it onto HTTP status codes.

use std::path::PathBuf;

/// Top-level error type for all Codestep operations.
#[derive(Debug, thiserror::Error)]
pub enum CodestepError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external service (feature flags).
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input shape or value rejected before touching the store.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A record addressed by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request carries no user identity but the operation requires one.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is signed in but may not act on the addressed record.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CodestepError>;

impl CodestepError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for `entity` with the given id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
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
