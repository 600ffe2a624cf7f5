//! Note sources and the cached loader in front of them

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::cache::CacheStore;
use crate::note::Note;

/// Something that can list notes, typically at a cost worth caching
pub trait NoteSource {
    /// Read every note
    fn notes(&self) -> Result<Vec<Note>>;

    /// Number of notes currently available
    fn note_count(&self) -> Result<usize>;

    /// Most recent modification time across all notes
    fn last_modification(&self) -> Result<Option<DateTime<Utc>>>;
}

/// Notes stored as plain files under a directory, one note per file
#[derive(Debug, Clone)]
pub struct DirNoteSource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirNoteSource {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Note files in file-name order, skipping hidden entries below the root
    fn files(&self) -> Result<Vec<DirEntry>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
        for entry in walker {
            let entry = entry.context(format!("Failed to walk notes directory: {}", self.root.display()))?;
            if entry.file_type().is_file() && self.matches_extension(entry.path()) {
                files.push(entry);
            }
        }
        Ok(files)
    }

    fn read_note(&self, entry: &DirEntry) -> Result<Note> {
        let path = entry.path();
        let content = fs::read_to_string(path).context(format!("Failed to read note: {}", path.display()))?;
        let meta = entry
            .metadata()
            .context(format!("Failed to stat note: {}", path.display()))?;
        let modified = meta.modified().context("File modification time unavailable")?;
        let created = meta.created().unwrap_or(modified);

        let id = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        Ok(Note {
            id,
            title,
            content: content.trim().to_string(),
            created_at: DateTime::<Utc>::from(created),
            updated_at: DateTime::<Utc>::from(modified),
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

impl NoteSource for DirNoteSource {
    fn notes(&self) -> Result<Vec<Note>> {
        debug!(root = ?self.root, "DirNoteSource::notes: called");
        let mut notes = self
            .files()?
            .iter()
            .map(|entry| self.read_note(entry))
            .collect::<Result<Vec<_>>>()?;
        notes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(notes)
    }

    fn note_count(&self) -> Result<usize> {
        Ok(self.files()?.len())
    }

    fn last_modification(&self) -> Result<Option<DateTime<Utc>>> {
        let mut newest: Option<DateTime<Utc>> = None;
        for entry in self.files()? {
            let modified = entry
                .metadata()
                .context(format!("Failed to stat note: {}", entry.path().display()))?
                .modified()
                .context("File modification time unavailable")?;
            let modified = DateTime::<Utc>::from(modified);
            newest = Some(newest.map_or(modified, |n| n.max(modified)));
        }
        Ok(newest)
    }
}

/// Where a loaded note listing came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOrigin {
    /// Snapshot passed fast validation
    FastCache,
    /// Snapshot passed validation against the source's signals
    ValidatedCache,
    /// Read from the source
    Source,
}

impl std::fmt::Display for NoteOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FastCache => write!(f, "cache"),
            Self::ValidatedCache => write!(f, "validated cache"),
            Self::Source => write!(f, "source"),
        }
    }
}

/// Notes returned by [`NoteLoader::load`]
#[derive(Debug, Clone)]
pub struct LoadedNotes {
    pub notes: Vec<Note>,
    pub origin: NoteOrigin,
}

/// Reads notes from a source, reusing the cached snapshot when it is still good
pub struct NoteLoader<S: NoteSource> {
    source: S,
    cache: Option<CacheStore>,
    verify_with_source: bool,
}

impl<S: NoteSource> NoteLoader<S> {
    /// Create a loader; `cache = None` always reads from the source
    pub fn new(source: S, cache: Option<CacheStore>) -> Self {
        Self {
            source,
            cache,
            verify_with_source: false,
        }
    }

    /// Skip fast validation and always check the snapshot against the source's signals
    pub fn verify_with_source(mut self, verify: bool) -> Self {
        self.verify_with_source = verify;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load all notes, consulting the cache first unless `force_refresh` is set
    pub fn load(&self, force_refresh: bool) -> Result<LoadedNotes> {
        debug!(force_refresh, verify = self.verify_with_source, "NoteLoader::load: called");

        if let Some(cache) = self.cache.as_ref().filter(|_| !force_refresh) {
            if !self.verify_with_source
                && let Some(notes) = cache.fast_validate()
            {
                info!(count = notes.len(), "Loaded notes from cache");
                return Ok(LoadedNotes {
                    notes,
                    origin: NoteOrigin::FastCache,
                });
            }

            let note_count = self.source.note_count().context("Failed to count notes")?;
            let last_modification = self
                .source
                .last_modification()
                .context("Failed to read last modification time")?;
            if let Some(notes) = cache.validate(note_count, last_modification) {
                info!(count = notes.len(), "Loaded notes from validated cache");
                return Ok(LoadedNotes {
                    notes,
                    origin: NoteOrigin::ValidatedCache,
                });
            }
        }

        let notes = self.source.notes().context("Failed to read notes from source")?;
        info!(count = notes.len(), "Loaded notes from source");

        if let Some(cache) = &self.cache {
            let last_modification = self
                .source
                .last_modification()
                .context("Failed to read last modification time")?;
            cache.store(&notes, notes.len(), last_modification);
        }

        Ok(LoadedNotes {
            notes,
            origin: NoteOrigin::Source,
        })
    }
}
