//! Note sync: chunk notes and write each chunk as one memory record

mod error;
mod memory;

use serde::Serialize;
use tracing::{debug, info, warn};

pub use error::SyncError;
pub use memory::{JsonlMemorySink, MemoryRecord, MemoryResponse, MemorySink};

use crate::chunker::SemanticChunker;
use crate::note::Note;

/// Which slice of the loaded notes an import covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportLimit {
    #[default]
    All,
    First(usize),
    Last(usize),
}

impl ImportLimit {
    /// Build from optional `first`/`last` counts; `first` wins and zero means no limit
    pub fn from_args(first: Option<usize>, last: Option<usize>) -> Self {
        match (first, last) {
            (Some(n), _) if n > 0 => Self::First(n),
            (_, Some(n)) if n > 0 => Self::Last(n),
            _ => Self::All,
        }
    }

    pub fn apply<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        match *self {
            Self::All => items,
            Self::First(n) => &items[..n.min(items.len())],
            Self::Last(n) => &items[items.len().saturating_sub(n)..],
        }
    }
}

impl std::fmt::Display for ImportLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all notes"),
            Self::First(n) => write!(f, "first {} notes", n),
            Self::Last(n) => write!(f, "last {} notes", n),
        }
    }
}

/// Progress notifications emitted while importing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEvent {
    Start {
        parsed: usize,
        total: usize,
    },
    Note {
        note: Note,
        current: usize,
        total: usize,
        imported: usize,
        errors: usize,
    },
    Error {
        note_id: String,
        title: String,
        error: String,
        current: usize,
        total: usize,
        imported: usize,
        errors: usize,
    },
    Progress {
        current: usize,
        total: usize,
        imported: usize,
        errors: usize,
    },
    Complete {
        total: usize,
        imported: usize,
        errors: usize,
    },
}

/// A note that could not be synced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub note_id: String,
    pub title: String,
    pub error: String,
}

/// Outcome of [`NoteSyncer::import`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Notes available before the limit was applied
    pub parsed: usize,
    /// Notes as returned by the sink, one per synced note
    pub imported: Vec<Note>,
    pub errors: Vec<ImportFailure>,
}

/// Writes notes to a memory sink, one record per chunk
pub struct NoteSyncer<M: MemorySink> {
    sink: M,
    chunker: SemanticChunker,
    assistant_id: String,
}

impl<M: MemorySink> NoteSyncer<M> {
    pub fn new(sink: M, chunker: SemanticChunker, assistant_id: impl Into<String>) -> Self {
        Self {
            sink,
            chunker,
            assistant_id: assistant_id.into(),
        }
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    /// Chunk `note` and store every chunk; returns the note as recorded for the first chunk
    ///
    /// A note with an empty body is stored as its title alone.
    pub fn sync_note(&self, note: &Note) -> Result<Note, SyncError> {
        debug!(id = %note.id, content_len = note.content_len(), "NoteSyncer::sync_note: called");
        if note.title.trim().is_empty() && note.content.trim().is_empty() {
            return Err(SyncError::EmptyNote { id: note.id.clone() });
        }
        let mut contents: Vec<String> = self
            .chunker
            .chunk(&note.content, &note.title)
            .into_iter()
            .map(|chunk| chunk.content)
            .collect();
        if contents.is_empty() {
            contents.push(note.title.clone());
        }

        let mut first = None;
        for content in &contents {
            let response = self.sink.add_memory(&self.assistant_id, content)?;
            first.get_or_insert(response);
        }
        debug!(id = %note.id, chunks = contents.len(), "NoteSyncer::sync_note: stored");
        first.map(MemoryResponse::into_note).ok_or(SyncError::EmptyResponse)
    }

    /// Sync the notes selected by `limit`, collecting failures instead of stopping
    pub fn import<F>(&self, notes: &[Note], limit: ImportLimit, mut on_event: F) -> ImportReport
    where
        F: FnMut(&ImportEvent),
    {
        let selected = limit.apply(notes);
        let total = selected.len();
        info!(parsed = notes.len(), total, %limit, "Starting note import");
        on_event(&ImportEvent::Start {
            parsed: notes.len(),
            total,
        });

        let mut report = ImportReport {
            parsed: notes.len(),
            ..Default::default()
        };

        for (idx, note) in selected.iter().enumerate() {
            let current = idx + 1;
            match self.sync_note(note) {
                Ok(synced) => {
                    report.imported.push(synced.clone());
                    on_event(&ImportEvent::Note {
                        note: synced,
                        current,
                        total,
                        imported: report.imported.len(),
                        errors: report.errors.len(),
                    });
                }
                Err(e) => {
                    warn!(id = %note.id, error = %e, "Failed to sync note");
                    report.errors.push(ImportFailure {
                        note_id: note.id.clone(),
                        title: note.title.clone(),
                        error: e.to_string(),
                    });
                    on_event(&ImportEvent::Error {
                        note_id: note.id.clone(),
                        title: note.title.clone(),
                        error: e.to_string(),
                        current,
                        total,
                        imported: report.imported.len(),
                        errors: report.errors.len(),
                    });
                }
            }
            on_event(&ImportEvent::Progress {
                current,
                total,
                imported: report.imported.len(),
                errors: report.errors.len(),
            });
        }

        info!(
            imported = report.imported.len(),
            errors = report.errors.len(),
            "Note import complete"
        );
        on_event(&ImportEvent::Complete {
            total,
            imported: report.imported.len(),
            errors: report.errors.len(),
        });
        report
    }
}
