//! Snapshot metadata and the fingerprints it carries

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::note::Note;

/// Bookkeeping for one persisted snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Note count reported by the source when the snapshot was taken
    pub note_count: usize,
    /// Fingerprint of `(note_count, last_modification)`
    pub cache_key: String,
    /// When the snapshot was written, whole seconds
    pub cached_at: DateTime<Utc>,
    /// Fingerprint of the cached notes' `(id, title, updated_at)`
    pub notes_hash: String,
    /// Source modification signal, whole seconds
    pub last_modification: Option<DateTime<Utc>>,
}

impl CacheMetadata {
    /// Build metadata for `notes` as of now
    pub fn new(
        notes: &[Note],
        note_count: usize,
        last_modification: Option<DateTime<Utc>>,
    ) -> Result<Self, serde_json::Error> {
        let last_modification = last_modification.map(truncate_to_seconds);
        Ok(Self {
            note_count,
            cache_key: cache_key(note_count, last_modification),
            cached_at: truncate_to_seconds(Utc::now()),
            notes_hash: notes_hash(notes)?,
            last_modification,
        })
    }
}

/// Drop sub-second precision; truncates, never rounds up
pub fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

/// Fingerprint of the source signals, stable across sub-second jitter
pub fn cache_key(note_count: usize, last_modification: Option<DateTime<Utc>>) -> String {
    let modified = match last_modification {
        Some(at) => truncate_to_seconds(at).to_rfc3339_opts(SecondsFormat::Secs, true),
        None => "none".to_string(),
    };
    sha256_hex(&format!("{}_{}", note_count, modified))
}

#[derive(Serialize, PartialEq, Eq, PartialOrd, Ord)]
struct NoteFingerprint<'a> {
    id: &'a str,
    title: &'a str,
    updated_at: String,
}

/// Fingerprint of the identity-bearing note fields, independent of input order
pub fn notes_hash(notes: &[Note]) -> Result<String, serde_json::Error> {
    let mut entries: Vec<NoteFingerprint<'_>> = notes
        .iter()
        .map(|note| NoteFingerprint {
            id: &note.id,
            title: &note.title,
            updated_at: note.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        })
        .collect();
    entries.sort();
    Ok(sha256_hex(&serde_json::to_string(&entries)?))
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, secs).unwrap()
    }

    #[test]
    fn test_truncate_never_rounds_up() {
        let t = at(7) + Duration::milliseconds(999);
        assert_eq!(truncate_to_seconds(t), at(7));
    }

    #[test]
    fn test_cache_key_ignores_subseconds() {
        let plain = cache_key(5, Some(at(1)));
        let jittered = cache_key(5, Some(at(1) + Duration::milliseconds(400)));
        assert_eq!(plain, jittered);
        assert_eq!(plain.len(), 64);
    }

    #[test]
    fn test_cache_key_tracks_count_and_time() {
        let base = cache_key(5, Some(at(1)));
        assert_ne!(base, cache_key(6, Some(at(1))));
        assert_ne!(base, cache_key(5, Some(at(2))));
        assert_ne!(base, cache_key(5, None));
    }

    #[test]
    fn test_notes_hash_is_order_independent() {
        let a = Note::new("a", "Alpha", "one", at(1));
        let b = Note::new("b", "Beta", "two", at(2));

        let forward = notes_hash(&[a.clone(), b.clone()]).unwrap();
        let reverse = notes_hash(&[b, a]).unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_notes_hash_ignores_content_but_not_title() {
        let note = Note::new("a", "Alpha", "one", at(1));
        let mut edited_body = note.clone();
        edited_body.content = "changed".to_string();
        let mut edited_title = note.clone();
        edited_title.title = "Changed".to_string();

        let base = notes_hash(std::slice::from_ref(&note)).unwrap();
        assert_eq!(base, notes_hash(&[edited_body]).unwrap());
        assert_ne!(base, notes_hash(&[edited_title]).unwrap());
    }

    #[test]
    fn test_metadata_truncates_timestamps() {
        let modified = at(3) + Duration::milliseconds(250);
        let meta = CacheMetadata::new(&[], 0, Some(modified)).unwrap();

        assert_eq!(meta.last_modification, Some(at(3)));
        assert_eq!(meta.cached_at, truncate_to_seconds(meta.cached_at));
        assert_eq!(meta.cache_key, cache_key(0, Some(at(3))));
    }
}
