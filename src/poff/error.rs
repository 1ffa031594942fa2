use std::path::PathBuf;

use thiserror::Error;

/// Errors the metadata core surfaces to callers.
///
/// Missing or malformed sidecars and unreadable directories are not errors here:
/// the store and scanner degrade those to "no prior state" and "empty tree".
#[derive(Debug, Error)]
pub enum PoffError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode sidecar JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type PoffResult<T> = std::result::Result<T, PoffError>;
