//! Memory sinks: where synced note chunks end up

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::SyncError;
use crate::note::Note;

/// Longest title recovered from the first line of a memory's content
const MAX_TITLE_CHARS: usize = 100;

/// Stores one memory record per call
pub trait MemorySink {
    /// Persist `content` as a memory of `assistant_id`
    fn add_memory(&self, assistant_id: &str, content: &str) -> Result<MemoryResponse, SyncError>;
}

impl<M: MemorySink + ?Sized> MemorySink for &M {
    fn add_memory(&self, assistant_id: &str, content: &str) -> Result<MemoryResponse, SyncError> {
        (**self).add_memory(assistant_id, content)
    }
}

/// A memory sink's answer to a write, in any of the shapes sinks are known to return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryResponse {
    /// Memory record keyed by `memory_id`; the title lives in the content's first line
    Memory {
        memory_id: String,
        #[serde(default, alias = "data")]
        content: String,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
        #[serde(default)]
        updated_at: Option<DateTime<Utc>>,
    },
    /// Note-shaped record keyed by `id`
    Note {
        id: String,
        #[serde(default)]
        title: String,
        #[serde(default, alias = "data")]
        content: String,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
        #[serde(default)]
        updated_at: Option<DateTime<Utc>>,
    },
}

impl MemoryResponse {
    /// Identifier assigned by the sink
    pub fn id(&self) -> &str {
        match self {
            Self::Memory { memory_id, .. } => memory_id,
            Self::Note { id, .. } => id,
        }
    }

    /// Convert to a note; missing timestamps become the current time
    pub fn into_note(self) -> Note {
        let now = Utc::now();
        let (id, title, content, created_at, updated_at) = match self {
            Self::Memory {
                memory_id,
                content,
                created_at,
                updated_at,
            } => (memory_id, String::new(), content, created_at, updated_at),
            Self::Note {
                id,
                title,
                content,
                created_at,
                updated_at,
            } => (id, title, content, created_at, updated_at),
        };
        let (title, content) = if title.is_empty() {
            split_title(&content)
        } else {
            (title, content)
        };
        Note {
            id,
            title,
            content,
            created_at: created_at.unwrap_or(now),
            updated_at: updated_at.unwrap_or(now),
        }
    }
}

/// Take the title from the first line and the body from the lines after it
fn split_title(content: &str) -> (String, String) {
    let mut lines = content.split('\n');
    let first = lines.next().unwrap_or_default().trim();
    if first.is_empty() {
        return ("Untitled".to_string(), content.to_string());
    }
    let title = first.chars().take(MAX_TITLE_CHARS).collect();
    let body = lines
        .skip_while(|line| line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (title, body)
}

/// One line of a [`JsonlMemorySink`] file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub memory_id: String,
    pub assistant_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appends memories to a local JSONL file
#[derive(Debug, Clone)]
pub struct JsonlMemorySink {
    path: PathBuf,
}

impl JsonlMemorySink {
    /// Open the sink at `path`, creating its directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))?;
        }
        debug!(?path, "JsonlMemorySink::open: called");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record written so far, oldest first
    pub fn records(&self) -> Result<Vec<MemoryRecord>, SyncError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| SyncError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl MemorySink for JsonlMemorySink {
    fn add_memory(&self, assistant_id: &str, content: &str) -> Result<MemoryResponse, SyncError> {
        debug!(%assistant_id, content_len = content.len(), "JsonlMemorySink::add_memory: called");
        let now = Utc::now();
        let record = MemoryRecord {
            memory_id: Uuid::now_v7().to_string(),
            assistant_id: assistant_id.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        let line = serde_json::to_string(&record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SyncError::io(&self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| SyncError::io(&self.path, e))?;

        Ok(serde_json::from_str(&line)?)
    }
}
