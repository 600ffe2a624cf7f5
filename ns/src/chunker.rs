//! Semantic text chunking
//!
//! Splits note text into size-bounded chunks along natural boundaries. Units are
//! taken from a boundary hierarchy (paragraphs, then sentences, then words, then
//! raw byte offsets) and a finer granularity is only used for a unit that alone
//! does not fit. Sizes are UTF-8 byte lengths, since the downstream memory store
//! limits records by bytes.
//!
//! Chunks of a multi-part split are written as:
//!
//! ```text
//! {title}
//!
//! {body}
//!
//! [Part {n}/{total}]
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Bytes reserved per chunk, on top of the title, for separators and the part label
pub const HEADER_OVERHEAD: usize = 50;

/// Smallest usable chunk size: one body byte beyond the overhead
pub const MIN_CHUNK_SIZE: usize = HEADER_OVERHEAD + 1;

/// Joins units inside a chunk and separates title, body and label
const SEPARATOR: &str = "\n\n";

static PARAGRAPH_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"));

static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("valid sentence regex"));

/// Errors from configuring a chunker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkerError {
    #[error("max chunk size must be at least {min} bytes, got {max}")]
    TooSmall { max: usize, min: usize },
}

/// One piece of split text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, including title and part label for multi-part splits
    pub content: String,
    /// 1-indexed position within the split
    pub part_number: usize,
    /// Number of chunks the text was split into
    pub total_parts: usize,
}

impl Chunk {
    /// Size of the chunk content in UTF-8 bytes
    pub fn byte_len(&self) -> usize {
        self.content.len()
    }
}

/// Splits text at paragraph, sentence and word boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticChunker {
    max_chunk_size: usize,
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_CHUNK_SIZE)
    }
}

impl SemanticChunker {
    /// Create a chunker whose chunks never exceed `max_chunk_size` bytes
    ///
    /// Sizes below [`MIN_CHUNK_SIZE`] are raised to it; use [`SemanticChunker::try_new`]
    /// to reject them instead.
    pub fn new(max_chunk_size: usize) -> Self {
        if max_chunk_size < MIN_CHUNK_SIZE {
            warn!(
                requested = max_chunk_size,
                used = MIN_CHUNK_SIZE,
                "Chunk size too small, raising to minimum"
            );
        }
        Self {
            max_chunk_size: max_chunk_size.max(MIN_CHUNK_SIZE),
        }
    }

    /// Create a chunker, refusing sizes that leave no room for a body
    pub fn try_new(max_chunk_size: usize) -> Result<Self, ChunkerError> {
        if max_chunk_size < MIN_CHUNK_SIZE {
            return Err(ChunkerError::TooSmall {
                max: max_chunk_size,
                min: MIN_CHUNK_SIZE,
            });
        }
        Ok(Self { max_chunk_size })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Bytes available for the body of each chunk once `title` and the label are reserved
    pub fn body_limit(&self, title: &str) -> usize {
        self.max_chunk_size.saturating_sub(title.len() + HEADER_OVERHEAD)
    }

    /// Title as it will appear in chunks: cut at a character boundary when it
    /// would take more than half the room left after [`HEADER_OVERHEAD`]
    pub fn fit_title<'a>(&self, title: &'a str) -> &'a str {
        let room = (self.max_chunk_size - HEADER_OVERHEAD) / 2;
        if title.len() <= room {
            return title;
        }
        let mut cut = room;
        while !title.is_char_boundary(cut) {
            cut -= 1;
        }
        warn!(title_len = title.len(), kept = cut, "Title too long for chunk size, truncating");
        title[..cut].trim_end()
    }

    /// Split `text` into ordered chunks headed by `title`
    ///
    /// Empty text yields no chunks. A text that fits in one chunk comes back as a
    /// single chunk without a part label; whitespace-only text is such a chunk,
    /// holding just the title.
    pub fn chunk(&self, text: &str, title: &str) -> Vec<Chunk> {
        debug!(
            text_len = text.len(),
            title_len = title.len(),
            max = self.max_chunk_size,
            "SemanticChunker::chunk: called"
        );
        if text.is_empty() {
            return vec![];
        }
        let title = self.fit_title(title);
        let limit = self.body_limit(title);
        let bodies = pack(split_units(text, limit), limit);
        debug!(parts = bodies.len(), limit, "SemanticChunker::chunk: packed");
        if bodies.is_empty() {
            return vec![Chunk {
                content: title.to_string(),
                part_number: 1,
                total_parts: 1,
            }];
        }
        stamp(bodies, title)
    }
}

/// Flatten `text` into units that each fit within `limit`, descending the boundary hierarchy as needed
fn split_units(text: &str, limit: usize) -> Vec<Cow<'_, str>> {
    let mut units = Vec::new();
    for paragraph in split_paragraphs(text) {
        if paragraph.len() <= limit {
            units.push(Cow::Borrowed(paragraph));
            continue;
        }
        for sentence in split_sentences(paragraph) {
            if sentence.len() <= limit {
                units.push(Cow::Borrowed(sentence));
            } else {
                units.extend(split_words(sentence, limit));
            }
        }
    }
    units
}

/// Blank-line separated blocks, trimmed, empties dropped
fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK_RE.split(text).map(str::trim).filter(|p| !p.is_empty())
}

/// Sentences ending in a run of `.`, `!` or `?` followed by whitespace; punctuation stays attached
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for end in SENTENCE_END_RE.find_iter(paragraph) {
        let sentence = paragraph[start..end.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end.end();
    }
    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Accumulate whole words up to `limit`; a word longer than `limit` is cut into pieces
fn split_words(sentence: &str, limit: usize) -> Vec<Cow<'_, str>> {
    let mut pieces = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;

    for word in sentence.split_whitespace() {
        // counts the joining space
        let word_size = word.len() + 1;
        if current_size + word_size > limit {
            if !current.is_empty() {
                pieces.push(Cow::Owned(current.join(" ")));
                current.clear();
                current_size = 0;
            }
            if word.len() > limit {
                pieces.extend(split_at_char_boundaries(word, limit).into_iter().map(Cow::Borrowed));
                continue;
            }
        }
        current.push(word);
        current_size += word_size;
    }

    if !current.is_empty() {
        pieces.push(Cow::Owned(current.join(" ")));
    }
    pieces
}

/// Cut `text` every `limit` bytes, moving each cut back to the previous character boundary
///
/// No character is ever split. When not even one character fits in `limit`, the
/// piece holds exactly one character so that the split always advances.
fn split_at_char_boundaries(text: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut cut = limit.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    pieces
}

/// Greedily join units into chunk bodies no larger than `limit`, separator bytes included
fn pack(units: Vec<Cow<'_, str>>, limit: usize) -> Vec<String> {
    let mut bodies = Vec::new();
    let mut current = String::new();

    for unit in units {
        if !current.is_empty() && current.len() + SEPARATOR.len() + unit.len() > limit {
            bodies.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(SEPARATOR);
        }
        current.push_str(&unit);
    }

    if !current.is_empty() {
        bodies.push(current);
    }
    bodies
}

/// Attach title and, for multi-part splits, the `[Part n/total]` label
fn stamp(bodies: Vec<String>, title: &str) -> Vec<Chunk> {
    let total_parts = bodies.len();
    bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let part_number = i + 1;
            let mut content = with_title(title, body);
            if total_parts > 1 {
                content.push_str(SEPARATOR);
                content.push_str(&format!("[Part {}/{}]", part_number, total_parts));
            }
            Chunk {
                content,
                part_number,
                total_parts,
            }
        })
        .collect()
}

fn with_title(title: &str, body: String) -> String {
    if title.is_empty() {
        body
    } else {
        format!("{}{}{}", title, SEPARATOR, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = SemanticChunker::default();
        assert!(chunker.chunk("", "Title").is_empty());
        assert!(chunker.chunk("", "").is_empty());
    }

    #[test]
    fn test_whitespace_text_is_single_title_chunk() {
        let chunker = SemanticChunker::default();
        let chunks = chunker.chunk("   \n\n  ", "Title");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Title");
        assert_eq!(chunks[0].part_number, 1);
        assert_eq!(chunks[0].total_parts, 1);

        let untitled = chunker.chunk(" \t ", "");
        assert_eq!(untitled.len(), 1);
        assert_eq!(untitled[0].content, "");
    }

    #[test]
    fn test_long_title_is_truncated_to_fit() {
        let chunker = SemanticChunker::new(200);
        let title = "t".repeat(300);
        let chunks = chunker.chunk("hello world. again here", &title);

        // room = (200 - 50) / 2 = 75
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, format!("{}\n\nhello world. again here", "t".repeat(75)));
        assert!(chunks[0].byte_len() <= 200);
    }

    #[test]
    fn test_fit_title_cuts_at_char_boundary() {
        // room = (60 - 50) / 2 = 5; "日" is 3 bytes
        let chunker = SemanticChunker::new(60);
        assert_eq!(chunker.fit_title("日本語"), "日");
        assert_eq!(chunker.fit_title("short"), "short");
    }

    #[test]
    fn test_try_new_rejects_tiny_sizes() {
        assert_eq!(
            SemanticChunker::try_new(HEADER_OVERHEAD),
            Err(ChunkerError::TooSmall {
                max: HEADER_OVERHEAD,
                min: MIN_CHUNK_SIZE
            })
        );
        assert_eq!(SemanticChunker::try_new(MIN_CHUNK_SIZE).map(|c| c.max_chunk_size()), Ok(MIN_CHUNK_SIZE));
        assert_eq!(SemanticChunker::new(10).max_chunk_size(), MIN_CHUNK_SIZE);
    }

    #[test]
    fn test_single_chunk_has_no_label() {
        let chunker = SemanticChunker::default();
        let chunks = chunker.chunk("Hello world.\n\nSecond paragraph.", "Title");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].part_number, 1);
        assert_eq!(chunks[0].total_parts, 1);
        assert_eq!(chunks[0].content, "Title\n\nHello world.\n\nSecond paragraph.");
    }

    #[test]
    fn test_single_chunk_without_title() {
        let chunker = SemanticChunker::default();
        let chunks = chunker.chunk("  just a line  ", "");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "just a line");
    }

    #[test]
    fn test_long_word_splits_in_two() {
        let chunker = SemanticChunker::new(3800);
        let text = "A".repeat(5000);
        let chunks = chunker.chunk(&text, "T");

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.ends_with("[Part 1/2]"));
        assert!(chunks[1].content.ends_with("[Part 2/2]"));
        for chunk in &chunks {
            assert!(chunk.byte_len() <= 3800, "chunk of {} bytes", chunk.byte_len());
            assert!(chunk.content.starts_with("T\n\n"));
            assert_eq!(chunk.total_parts, 2);
        }
    }

    #[test]
    fn test_paragraphs_pack_greedily() {
        // limit = 80 - (1 + 50) = 29: two 20-byte paragraphs plus separator do not fit
        let chunker = SemanticChunker::new(80);
        let para = "x".repeat(20);
        let text = format!("{para}\n\n{para}\n  \n{para}");
        let chunks = chunker.chunk(&text, "T");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, format!("T\n\n{para}\n\n[Part 1/3]"));
        assert_eq!(chunks[2].content, format!("T\n\n{para}\n\n[Part 3/3]"));
    }

    #[test]
    fn test_oversized_paragraph_falls_back_to_sentences() {
        // limit = 100 - 50 = 50; the paragraph is 56 bytes
        let chunker = SemanticChunker::new(100);
        let text = "First sentence here. Second sentence is here! Third one?";
        let chunks = chunker.chunk(text, "");

        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].content,
            "First sentence here.\n\nSecond sentence is here!\n\n[Part 1/2]"
        );
        assert_eq!(chunks[1].content, "Third one?\n\n[Part 2/2]");
    }

    #[test]
    fn test_split_sentences_keeps_punctuation() {
        let sentences = split_sentences("Wait... really?! Yes. done");
        assert_eq!(sentences, vec!["Wait...", "really?!", "Yes.", "done"]);
    }

    #[test]
    fn test_split_sentences_ignores_inner_dots() {
        let sentences = split_sentences("Version 1.2 shipped. Next");
        assert_eq!(sentences, vec!["Version 1.2 shipped.", "Next"]);
    }

    #[test]
    fn test_split_words_accumulates_whole_words() {
        let pieces = split_words("alpha beta gamma delta", 12);
        assert_eq!(pieces, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn test_split_words_cuts_oversized_word() {
        let pieces = split_words("hi abcdefghijkl yo", 5);
        assert_eq!(pieces, vec!["hi", "abcde", "fghij", "kl", "yo"]);
    }

    #[test]
    fn test_char_boundary_cut_keeps_every_character() {
        let word = "aéééééé";
        let pieces = split_at_char_boundaries(word, 10);
        assert_eq!(pieces, vec!["aéééé", "éé"]);
        assert_eq!(pieces.concat(), word);
    }

    #[test]
    fn test_char_boundary_cut_advances_when_nothing_fits() {
        let pieces = split_at_char_boundaries("日本", 2);
        assert_eq!(pieces, vec!["日", "本"]);
    }

    #[test]
    fn test_multibyte_text_stays_within_limit() {
        let chunker = SemanticChunker::new(60);
        let text = "é".repeat(40);
        let chunks = chunker.chunk(&text, "");

        let rebuilt: String = chunks
            .iter()
            .map(|c| c.content.split("\n\n[Part").next().unwrap_or_default())
            .collect();
        assert_eq!(rebuilt, text);
        assert!(chunks.iter().all(|c| c.byte_len() <= 60));
    }

    #[test]
    fn test_body_limit_saturates() {
        let chunker = SemanticChunker::new(60);
        assert_eq!(chunker.body_limit("a title this long"), 0);
        assert_eq!(SemanticChunker::new(3800).body_limit("abc"), 3800 - 53);
    }
}
