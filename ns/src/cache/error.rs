//! Cache error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, writing or checking the note cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No cache snapshot at {path}")]
    NotFound { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed cache file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Failed to replace cache file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Notes hash mismatch: stored {stored}, computed {computed}")]
    Tampered { stored: String, computed: String },

    #[error("Cache key mismatch: stored {stored}, expected {expected}")]
    Stale { stored: String, expected: String },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the snapshot exists but cannot be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, CacheError::Malformed(_) | CacheError::Tampered { .. })
    }

    /// Check if this is an ordinary miss rather than a failure worth reporting
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound { .. } | CacheError::Stale { .. })
    }
}
