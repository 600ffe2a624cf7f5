//! notesync - semantic note chunking and a fingerprint-validated note cache
//!
//! Reads notes from a source, keeps a local snapshot of the listing so that
//! repeated imports skip the expensive read, and writes every note to a memory
//! sink split into size-bounded chunks.
//!
//! # Architecture
//!
//! ```text
//! NoteSource ──► NoteLoader ──► NoteSyncer ──► MemorySink
//!                    │               │
//!               CacheStore    SemanticChunker
//!          (notes_cache.json)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use notesync::{CacheStore, DirNoteSource, ImportLimit, JsonlMemorySink, NoteLoader, NoteSyncer, SemanticChunker};
//!
//! let source = DirNoteSource::new("notes", &["md".into()]);
//! let loader = NoteLoader::new(source, Some(CacheStore::open(".cache/notes_cache.json")?));
//! let loaded = loader.load(false)?;
//!
//! let syncer = NoteSyncer::new(JsonlMemorySink::open("memories.jsonl")?, SemanticChunker::default(), "default");
//! let report = syncer.import(&loaded.notes, ImportLimit::All, |_| {});
//! ```

pub mod cache;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod note;
pub mod source;
pub mod sync;

pub use cache::{CacheError, CacheMetadata, CacheSnapshot, CacheStore};
pub use chunker::{Chunk, ChunkerError, HEADER_OVERHEAD, MIN_CHUNK_SIZE, SemanticChunker};
pub use config::Config;
pub use note::{Note, NoteId};
pub use source::{DirNoteSource, LoadedNotes, NoteLoader, NoteOrigin, NoteSource};
pub use sync::{
    ImportEvent, ImportFailure, ImportLimit, ImportReport, JsonlMemorySink, MemoryRecord, MemoryResponse, MemorySink,
    NoteSyncer, SyncError,
};

/// Default upper bound for a chunk, in bytes
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 3800;
