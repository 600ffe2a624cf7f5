//! Configuration for notesync

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunker::SemanticChunker;

/// Main notesync configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Note cache settings
    pub cache: CacheConfig,

    /// Chunking settings
    pub chunking: ChunkingConfig,

    /// Where notes are read from
    pub source: SourceConfig,

    /// Where synced memories are written
    pub memory: MemoryConfig,
}

impl Config {
    /// Check settings that would make later operations misbehave
    pub fn validate(&self) -> Result<()> {
        SemanticChunker::try_new(self.chunking.max_chunk_size).context("Invalid chunking.max-chunk-size")?;
        if self.source.extensions.is_empty() {
            return Err(eyre::eyre!("source.extensions must name at least one file extension"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: ./notesync.yml
        let local_config = PathBuf::from("notesync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/notesync/notesync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("notesync").join("notesync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notesync")
}

/// Note cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the cache at all
    pub enabled: bool,

    /// Snapshot file location
    pub path: PathBuf,

    /// Always check the snapshot against the source's count and modification time
    #[serde(rename = "verify-with-source")]
    pub verify_with_source: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: data_dir().join("notes_cache.json"),
            verify_with_source: false,
        }
    }
}

/// Chunking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound for a chunk in UTF-8 bytes, title and part label included
    #[serde(rename = "max-chunk-size")]
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: crate::DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

/// Note source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding one note per file
    #[serde(rename = "notes-dir")]
    pub notes_dir: PathBuf,

    /// File extensions treated as notes
    pub extensions: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            notes_dir: PathBuf::from("."),
            extensions: vec!["md".to_string(), "txt".to_string()],
        }
    }
}

/// Memory sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// JSONL file receiving one record per chunk
    pub path: PathBuf,

    /// Assistant the memories are filed under
    #[serde(rename = "assistant-id")]
    pub assistant_id: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("memories.jsonl"),
            assistant_id: "default".to_string(),
        }
    }
}
