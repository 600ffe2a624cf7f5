//! CLI argument parsing for notesync

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ns")]
#[command(author, version, about = "Semantic note chunking and cached note import", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a text file into chunks
    Chunk {
        /// File to split
        #[arg(required = true)]
        file: PathBuf,

        /// Title placed on every chunk (default: file name without extension)
        #[arg(short, long)]
        title: Option<String>,

        /// Maximum chunk size in bytes (default: from config, 3800)
        #[arg(short = 's', long)]
        max_size: Option<usize>,

        /// Print chunks as JSON
        #[arg(long)]
        json: bool,
    },

    /// List notes, using the cache when it is valid
    Notes {
        /// Ignore the cache and re-read the source
        #[arg(short, long)]
        force_refresh: bool,
    },

    /// Chunk notes and write them to the memory file
    Import {
        /// Only import the first N notes
        #[arg(long, conflicts_with = "last")]
        first: Option<usize>,

        /// Only import the last N notes
        #[arg(long)]
        last: Option<usize>,

        /// Ignore the cache and re-read the source
        #[arg(short, long)]
        force_refresh: bool,

        /// Print progress events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the note cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show the cached snapshot's metadata
    Status,

    /// Delete the cached snapshot
    Invalidate,
}
