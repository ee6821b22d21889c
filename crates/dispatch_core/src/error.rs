//! Error types for the dispatch core.
//!
//! Only configuration loading and snapshot writes produce errors. A failed
//! match is a normal outcome and never surfaces here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Alias for `Result<T, DispatchError>`.
pub type DispatchResult<T> = Result<T, DispatchError>;
