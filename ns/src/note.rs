//! Note entity shared by the cache, the note sources and the sync layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a note, assigned by its source
pub type NoteId = String;

/// A single note as read from a note source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Source-assigned identifier
    pub id: NoteId,
    /// Note title
    pub title: String,
    /// Note body
    pub content: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create a note whose creation and modification times are both `at`
    pub fn new(id: impl Into<NoteId>, title: impl Into<String>, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            created_at: at,
            updated_at: at,
        }
    }

    /// Size of the note body in UTF-8 bytes
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}
