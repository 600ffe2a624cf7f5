//! Local note cache
//!
//! Persists one snapshot of the note listing as a JSON document and decides
//! whether it can be reused. Two checks are available:
//!
//! - fast validation recomputes the notes hash over the stored notes, catching
//!   corruption and edits to the file without consulting the note source;
//! - full validation additionally compares the stored cache key with one derived
//!   from the source's current note count and last modification time.
//!
//! Writes go through a temporary file renamed over the snapshot, so readers see
//! either the previous or the new snapshot. Writers serialize on an exclusive
//! lock held on a sidecar `<cache>.lock` file.

mod error;
mod metadata;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub use error::CacheError;
pub use metadata::{CacheMetadata, cache_key, notes_hash, truncate_to_seconds};

use crate::note::Note;

/// The persisted document: metadata plus the notes it describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub metadata: CacheMetadata,
    pub notes: Vec<Note>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    metadata: &'a CacheMetadata,
    notes: &'a [Note],
}

/// Single-slot note cache backed by one JSON file
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Open the cache at `path`, creating its directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let dir = store.dir();
        fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
        debug!(path = ?store.path, "CacheStore::open: called");
        Ok(store)
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Cached notes if the snapshot is intact, without consulting the note source
    pub fn fast_validate(&self) -> Option<Vec<Note>> {
        debug!("CacheStore::fast_validate: called");
        match self.check() {
            Ok(snapshot) => {
                debug!(count = snapshot.notes.len(), "CacheStore::fast_validate: hit");
                Some(snapshot.notes)
            }
            Err(e) => {
                report_miss("fast_validate", &e);
                None
            }
        }
    }

    /// Cached notes if the snapshot is intact and matches the source's current signals
    pub fn validate(&self, note_count: usize, last_modification: Option<DateTime<Utc>>) -> Option<Vec<Note>> {
        debug!(note_count, ?last_modification, "CacheStore::validate: called");
        let checked = self.check().and_then(|snapshot| {
            let expected = cache_key(note_count, last_modification);
            if snapshot.metadata.cache_key == expected {
                Ok(snapshot)
            } else {
                Err(CacheError::Stale {
                    stored: snapshot.metadata.cache_key,
                    expected,
                })
            }
        });
        match checked {
            Ok(snapshot) => {
                debug!(count = snapshot.notes.len(), "CacheStore::validate: hit");
                Some(snapshot.notes)
            }
            Err(e) => {
                report_miss("validate", &e);
                None
            }
        }
    }

    /// Check if the snapshot is intact and current for the given signals
    pub fn is_valid(&self, note_count: usize, last_modification: Option<DateTime<Utc>>) -> bool {
        self.validate(note_count, last_modification).is_some()
    }

    /// Metadata of the stored snapshot, whether or not its notes still verify
    pub fn metadata(&self) -> Option<CacheMetadata> {
        self.load().ok().map(|snapshot| snapshot.metadata)
    }

    /// Replace the snapshot; failures are logged and otherwise ignored
    pub fn store(&self, notes: &[Note], note_count: usize, last_modification: Option<DateTime<Utc>>) {
        if let Err(e) = self.try_store(notes, note_count, last_modification) {
            warn!(path = ?self.path, error = %e, "Failed to write note cache");
        }
    }

    /// Replace the snapshot, reporting failures
    pub fn try_store(
        &self,
        notes: &[Note],
        note_count: usize,
        last_modification: Option<DateTime<Utc>>,
    ) -> Result<CacheMetadata, CacheError> {
        debug!(notes = notes.len(), note_count, "CacheStore::try_store: called");
        let metadata = CacheMetadata::new(notes, note_count, last_modification)?;
        let _lock = self.write_lock()?;

        let dir = self.dir();
        let tmp = NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
        let mut writer = BufWriter::new(tmp);
        serde_json::to_writer_pretty(
            &mut writer,
            &SnapshotRef {
                metadata: &metadata,
                notes,
            },
        )?;
        writer.flush().map_err(|e| CacheError::io(dir, e))?;
        let tmp = writer.into_inner().map_err(|e| CacheError::io(dir, e.into_error()))?;
        tmp.as_file().sync_all().map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&self.path)?;

        info!(path = ?self.path, notes = notes.len(), cache_key = %metadata.cache_key, "Stored note cache");
        Ok(metadata)
    }

    /// Delete the snapshot; deleting an absent snapshot succeeds
    pub fn invalidate(&self) -> Result<(), CacheError> {
        debug!(path = ?self.path, "CacheStore::invalidate: called");
        let _lock = self.write_lock()?;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = ?self.path, "Invalidated note cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("CacheStore::invalidate: nothing to delete");
                Ok(())
            }
            Err(e) => Err(CacheError::io(&self.path, e)),
        }
    }

    fn load(&self) -> Result<CacheSnapshot, CacheError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(CacheError::io(&self.path, e)),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Load the snapshot and verify its notes hash, reporting why it is unusable
    pub fn check(&self) -> Result<CacheSnapshot, CacheError> {
        let snapshot = self.load()?;
        let computed = notes_hash(&snapshot.notes)?;
        if snapshot.metadata.notes_hash != computed {
            return Err(CacheError::Tampered {
                stored: snapshot.metadata.notes_hash,
                computed,
            });
        }
        Ok(snapshot)
    }

    fn write_lock(&self) -> Result<File, CacheError> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| CacheError::io(&lock_path, e))?;
        file.lock_exclusive().map_err(|e| CacheError::io(&lock_path, e))?;
        Ok(file)
    }
}

fn report_miss(operation: &str, e: &CacheError) {
    if e.is_miss() {
        debug!(operation, reason = %e, "Note cache miss");
    } else {
        warn!(operation, reason = %e, "Ignoring unusable note cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, secs).unwrap()
    }

    fn sample_notes() -> Vec<Note> {
        vec![
            Note::new("id-2", "Second", "body two", at(2)),
            Note::new("id-1", "First", "body one", at(1)),
        ]
    }

    fn open(temp: &TempDir) -> CacheStore {
        CacheStore::open(temp.path().join("nested").join("notes_cache.json")).unwrap()
    }

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        assert!(temp.path().join("nested").is_dir());
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_absent_cache_misses() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        assert!(cache.fast_validate().is_none());
        assert!(cache.validate(0, None).is_none());
        assert!(cache.metadata().is_none());
    }

    #[test]
    fn test_store_then_fast_validate() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        let notes = sample_notes();

        cache.store(&notes, 2, Some(at(5)));

        assert_eq!(cache.fast_validate(), Some(notes));
    }

    #[test]
    fn test_validate_detects_staleness() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        let notes = sample_notes();

        cache.store(&notes, 5, Some(at(10)));

        assert_eq!(cache.validate(5, Some(at(10))), Some(notes.clone()));
        assert!(cache.validate(5, Some(at(11))).is_none());
        assert!(cache.validate(6, Some(at(10))).is_none());
        assert!(cache.validate(5, None).is_none());
    }

    #[test]
    fn test_validate_tolerates_subsecond_drift() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);

        cache.store(&sample_notes(), 2, Some(at(10) + Duration::milliseconds(900)));

        assert!(cache.is_valid(2, Some(at(10))));
        assert!(cache.is_valid(2, Some(at(10) + Duration::milliseconds(10))));
    }

    #[test]
    fn test_store_replaces_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);

        cache.store(&sample_notes(), 2, None);
        let replacement = vec![Note::new("id-9", "Only", "", at(9))];
        cache.store(&replacement, 1, None);

        assert_eq!(cache.fast_validate(), Some(replacement));
        assert_eq!(cache.metadata().map(|m| m.note_count), Some(1));
    }

    #[test]
    fn test_tampered_title_is_rejected() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        cache.store(&sample_notes(), 2, None);

        let raw = fs::read_to_string(cache.path()).unwrap();
        let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        doc["notes"][0]["title"] = serde_json::Value::from("Edited");
        fs::write(cache.path(), serde_json::to_string(&doc).unwrap()).unwrap();

        assert!(cache.fast_validate().is_none());
        assert!(cache.validate(2, None).is_none());
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        fs::write(cache.path(), "{ not json").unwrap();

        assert!(cache.fast_validate().is_none());
        assert!(cache.metadata().is_none());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        cache.store(&sample_notes(), 2, None);

        cache.invalidate().unwrap();
        assert!(cache.fast_validate().is_none());
        cache.invalidate().unwrap();
        assert!(cache.fast_validate().is_none());
    }

    #[test]
    fn test_failed_write_is_swallowed() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("occupied");
        fs::create_dir_all(target.join("child")).unwrap();
        let cache = CacheStore::open(&target).unwrap();

        assert!(cache.try_store(&sample_notes(), 2, None).is_err());
        cache.store(&sample_notes(), 2, None);
        assert!(target.join("child").is_dir());
    }

    #[test]
    fn test_failed_write_keeps_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        let notes = sample_notes();
        cache.try_store(&notes, 2, Some(at(3))).unwrap();

        // a directory where the lock file belongs makes every write fail
        let lock_path = cache.lock_path();
        fs::remove_file(&lock_path).unwrap();
        fs::create_dir(&lock_path).unwrap();

        let replacement = vec![Note::new("id-9", "Only", "", at(9))];
        assert!(matches!(
            cache.try_store(&replacement, 1, None),
            Err(CacheError::Io { .. })
        ));
        cache.store(&replacement, 1, None);

        assert_eq!(cache.fast_validate(), Some(notes.clone()));
        assert_eq!(cache.validate(2, Some(at(3))), Some(notes));
        assert_eq!(cache.metadata().map(|m| m.note_count), Some(2));
    }

    #[test]
    fn test_check_classifies_problems() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        assert!(cache.check().unwrap_err().is_miss());

        cache.store(&sample_notes(), 2, None);
        assert_eq!(cache.check().unwrap().notes, sample_notes());

        fs::write(cache.path(), "{ not json").unwrap();
        assert!(cache.check().unwrap_err().is_corruption());
    }

    #[test]
    fn test_persisted_document_shape() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        let meta = cache.try_store(&sample_notes(), 2, Some(at(4))).unwrap();

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(cache.path()).unwrap()).unwrap();
        assert_eq!(doc["metadata"]["note_count"], 2);
        assert_eq!(doc["metadata"]["cache_key"], meta.cache_key.as_str());
        assert_eq!(doc["metadata"]["last_modification"], "2024-01-15T12:00:04Z");
        assert_eq!(doc["notes"].as_array().map(Vec::len), Some(2));
        assert_eq!(doc["notes"][0]["id"], "id-2");
    }
}
