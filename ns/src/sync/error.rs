//! Sync error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing notes to a memory sink
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Memory sink rejected write: {0}")]
    Rejected(String),

    #[error("Note {id} has neither title nor content")]
    EmptyNote { id: String },

    #[error("Memory sink returned no record")]
    EmptyResponse,
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
