use std::fs;
use std::io::IsTerminal;
use std::path::Path;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use notesync::cli::{CacheCommand, Cli, Command};
use notesync::config::Config;
use notesync::{
    CacheStore, DirNoteSource, ImportEvent, ImportLimit, JsonlMemorySink, NoteLoader, NoteSyncer, SemanticChunker,
};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    info!("notesync starting");

    match cli.command {
        Command::Chunk {
            file,
            title,
            max_size,
            json,
        } => cmd_chunk(&config, &file, title, max_size, json),
        Command::Notes { force_refresh } => cmd_notes(&config, force_refresh),
        Command::Import {
            first,
            last,
            force_refresh,
            json,
        } => cmd_import(&config, ImportLimit::from_args(first, last), force_refresh, json),
        Command::Cache { command } => match command {
            CacheCommand::Status => cmd_cache_status(&config),
            CacheCommand::Invalidate => cmd_cache_invalidate(&config),
        },
    }
}

fn build_loader(config: &Config) -> Result<NoteLoader<DirNoteSource>> {
    let source = DirNoteSource::new(&config.source.notes_dir, &config.source.extensions);
    let cache = if config.cache.enabled {
        Some(CacheStore::open(&config.cache.path).context("Failed to open note cache")?)
    } else {
        None
    };
    Ok(NoteLoader::new(source, cache).verify_with_source(config.cache.verify_with_source))
}

fn cmd_chunk(config: &Config, file: &Path, title: Option<String>, max_size: Option<usize>, json: bool) -> Result<()> {
    let text = fs::read_to_string(file).context(format!("Failed to read file: {}", file.display()))?;
    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    let chunker = SemanticChunker::try_new(max_size.unwrap_or(config.chunking.max_chunk_size))
        .context("Invalid chunk size")?;
    let chunks = chunker.chunk(&text, &title);

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    if chunks.is_empty() {
        println!("No content to chunk");
        return Ok(());
    }
    for chunk in &chunks {
        println!(
            "{} {}",
            format!("── part {}/{}", chunk.part_number, chunk.total_parts).cyan(),
            format!("({}/{} bytes)", chunk.byte_len(), chunker.max_chunk_size()).dimmed()
        );
        println!("{}", chunk.content);
    }
    Ok(())
}

fn cmd_notes(config: &Config, force_refresh: bool) -> Result<()> {
    let loader = build_loader(config)?;
    let loaded = loader.load(force_refresh)?;
    println!(
        "{} {} notes in {} (from {})",
        "✓".green(),
        loaded.notes.len(),
        loader.source().root().display(),
        loaded.origin.to_string().yellow()
    );
    for note in &loaded.notes {
        println!(
            "{}  {} {}",
            note.id.cyan(),
            note.title,
            format!("({} bytes)", note.content_len()).dimmed()
        );
    }
    Ok(())
}

fn cmd_import(config: &Config, limit: ImportLimit, force_refresh: bool, json: bool) -> Result<()> {
    let loaded = build_loader(config)?.load(force_refresh)?;
    let sink = JsonlMemorySink::open(&config.memory.path).context("Failed to open memory file")?;
    let syncer = NoteSyncer::new(
        sink,
        SemanticChunker::new(config.chunking.max_chunk_size),
        config.memory.assistant_id.clone(),
    );

    let report = syncer.import(&loaded.notes, limit, |event| {
        if json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Failed to encode import event"),
            }
            return;
        }
        match event {
            ImportEvent::Start { parsed, total } => {
                println!("Importing {} of {} notes (from {})", total, parsed, loaded.origin);
            }
            ImportEvent::Note {
                note, current, total, ..
            } => {
                println!("{} [{}/{}] {}", "✓".green(), current, total, note.title);
            }
            ImportEvent::Error {
                title,
                error,
                current,
                total,
                ..
            } => {
                println!("{} [{}/{}] {}: {}", "✗".red(), current, total, title, error);
            }
            ImportEvent::Progress { .. } | ImportEvent::Complete { .. } => {}
        }
    });

    if !json {
        println!(
            "{} Import complete: {} imported, {} errors ({})",
            if report.errors.is_empty() { "✓".green() } else { "!".yellow() },
            report.imported.len(),
            report.errors.len(),
            syncer.sink().path().display()
        );
    }
    Ok(())
}

fn cmd_cache_status(config: &Config) -> Result<()> {
    let cache = CacheStore::open(&config.cache.path).context("Failed to open note cache")?;
    let Some(meta) = cache.metadata() else {
        println!("No cached snapshot at {}", cache.path().display());
        return Ok(());
    };

    let state = match cache.check() {
        Ok(_) => "intact".green(),
        Err(e) if e.is_corruption() => "corrupt".red(),
        Err(e) => format!("unreadable: {}", e).red(),
    };
    println!("Cache: {} ({})", cache.path().display().to_string().cyan(), state);
    println!("  Notes: {}", meta.note_count);
    println!("  Cached at: {}", meta.cached_at.to_rfc3339());
    match meta.last_modification {
        Some(at) => println!("  Last modification: {}", at.to_rfc3339()),
        None => println!("  Last modification: none"),
    }
    println!("  Cache key: {}", meta.cache_key.dimmed());
    println!("  Notes hash: {}", meta.notes_hash.dimmed());
    Ok(())
}

fn cmd_cache_invalidate(config: &Config) -> Result<()> {
    let cache = CacheStore::open(&config.cache.path).context("Failed to open note cache")?;
    cache.invalidate()?;
    println!("{} Cache invalidated: {}", "✓".green(), cache.path().display());
    Ok(())
}
