//! Recursive-separator text chunker with character overlap.
//!
//! Splits normalized document text into [`Chunk`]s of at most
//! `chunk_size` characters. Consecutive chunks share exactly
//! `chunk_overlap` characters: the tail of one chunk is the head of the
//! next, so no boundary information is lost for retrieval.
//!
//! Every chunk is a contiguous slice of the normalized text, which makes
//! the split auditable: dropping the overlap from every chunk after the
//! first and concatenating gives back the normalized document (see
//! [`reconstruct`]).
//!
//! # Algorithm
//!
//! 1. Normalize the input ([`normalize_text`]). Empty results yield no chunks.
//! 2. Starting at offset `s`, if the remainder fits in `chunk_size`, emit it
//!    and stop.
//! 3. Otherwise look for a cut inside the window `(s + overlap, s + chunk_size]`,
//!    trying the separators in priority order
//!    (`"\n\n"`, `"\n"`, `". "`, `"! "`, `"? "`, `"; "`, `", "`, `" "`).
//!    The first separator that occurs in the window wins, and the chunk
//!    ends right after its last occurrence.
//! 4. If no separator occurs (the `""` entry), cut at exactly `chunk_size`.
//! 5. If the planned chunk repeats the previous chunk's text (periodic
//!    input), the cut moves back one character.
//! 6. The next chunk starts `overlap` characters before the cut.
//!
//! # Example
//!
//! ```rust
//! use ragcite_core::chunk::{Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig::default());
//! let chunks = chunker.chunk("Hello world. Second sentence.", "notes.txt", "Notes", Some("doc-1"));
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_id, "doc-1_chunk_0");
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{Chunk, Language};

/// Approximate characters-per-token ratio used for token estimates.
const CHARS_PER_TOKEN: usize = 4;

/// Section labels longer than this are treated as body text, not headers.
const MAX_SECTION_LABEL: usize = 100;

/// Separators tried from highest to lowest priority. `""` means raw
/// character slicing.
pub const DEFAULT_SEPARATORS: [&str; 9] = ["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " ", ""];

/// Title recorded for documents uploaded without one.
pub const UNTITLED: &str = "Untitled Document";

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be `< chunk_size`.
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
    /// Keep line structure during normalization instead of collapsing
    /// every whitespace run to a single space.
    pub preserve_line_breaks: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            preserve_line_breaks: false,
        }
    }
}

/// Splits documents into overlapping, citable chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker. Out-of-range parameters are clamped
    /// (`chunk_size >= 1`, `chunk_overlap < chunk_size`) so chunking never
    /// fails on well-formed input.
    pub fn new(mut config: ChunkerConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        config.chunk_overlap = config.chunk_overlap.min(config.chunk_size - 1);
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a document.
    ///
    /// When `doc_id` is `None` the id is derived from `source` and `title`
    /// (see [`derive_doc_id`]). An empty `title` is recorded as
    /// `"Untitled Document"`.
    ///
    /// Returns an empty vector for empty or whitespace-only input.
    pub fn chunk(&self, text: &str, source: &str, title: &str, doc_id: Option<&str>) -> Vec<Chunk> {
        let normalized = normalize_text(text, self.config.preserve_line_breaks);
        if normalized.is_empty() {
            return Vec::new();
        }

        let doc_id = match doc_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => derive_doc_id(source, title),
        };
        let title = if title.trim().is_empty() { UNTITLED } else { title };

        let chars: Vec<char> = normalized.chars().collect();
        let spans = plan_spans(
            &chars,
            self.config.chunk_size,
            self.config.chunk_overlap,
            &self.config.separators,
        );
        let total = spans.len();

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                let text: String = chars[start..end].iter().collect();
                make_chunk(&doc_id, source, title, index, total, start, end, text)
            })
            .collect();

        tracing::debug!(
            doc_id = %doc_id,
            chunks = chunks.len(),
            chars = chars.len(),
            "chunked document"
        );
        chunks
    }

    /// Report chunk quality statistics.
    ///
    /// Pure and side-effect free: the same input always yields an equal
    /// report.
    pub fn validate(&self, chunks: &[Chunk]) -> ValidationReport {
        if chunks.is_empty() {
            return ValidationReport::Empty {
                error: "No chunks to validate".to_string(),
            };
        }

        let size = self.config.chunk_size as f64;
        let total_chunks = chunks.len();
        let total_estimated_tokens: usize = chunks.iter().map(|c| c.estimated_token_count).sum();
        let average = total_estimated_tokens as f64 / total_chunks as f64;

        let oversized_chunks = chunks
            .iter()
            .filter(|c| c.estimated_token_count as f64 > size * 1.2)
            .count();
        let undersized_chunks = chunks
            .iter()
            .filter(|c| (c.estimated_token_count as f64) < size * 0.5)
            .count();
        let broken_sentences = chunks
            .iter()
            .filter(|c| !c.text.is_empty() && !ends_on_sentence_boundary(&c.text))
            .count();

        let overall_quality = if oversized_chunks == 0 && broken_sentences == 0 {
            Quality::Good
        } else {
            Quality::NeedsImprovement
        };

        ValidationReport::Stats(ChunkStats {
            total_chunks,
            total_estimated_tokens,
            average_tokens_per_chunk: (average * 100.0).round() / 100.0,
            oversized_chunks,
            undersized_chunks,
            broken_sentences,
            chunk_size_compliance: oversized_chunks == 0,
            sentence_boundary_compliance: broken_sentences == 0,
            overall_quality,
        })
    }

    /// Describe the active chunking parameters.
    pub fn parameters(&self) -> ChunkingParameters {
        ChunkingParameters {
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            overlap_percentage: self.config.chunk_overlap as f64 / self.config.chunk_size as f64
                * 100.0,
            separators: self.config.separators.clone(),
            strategy: "recursive-separator",
            token_estimation: "char_count / 4",
            preserve_line_breaks: self.config.preserve_line_breaks,
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// Overall chunk quality verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Good,
    NeedsImprovement,
}

/// Statistics produced by [`Chunker::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkStats {
    pub total_chunks: usize,
    pub total_estimated_tokens: usize,
    pub average_tokens_per_chunk: f64,
    /// Chunks with more than `chunk_size * 1.2` estimated tokens.
    pub oversized_chunks: usize,
    /// Chunks with fewer than `chunk_size * 0.5` estimated tokens.
    pub undersized_chunks: usize,
    /// Chunks not ending in `.`, `!`, `?` or a newline.
    pub broken_sentences: usize,
    pub chunk_size_compliance: bool,
    pub sentence_boundary_compliance: bool,
    pub overall_quality: Quality,
}

/// Result of [`Chunker::validate`].
///
/// Serializes either as `{"error": "No chunks to validate"}` or as the
/// flat statistics object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidationReport {
    Empty { error: String },
    Stats(ChunkStats),
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        matches!(self, ValidationReport::Empty { .. })
    }

    pub fn stats(&self) -> Option<&ChunkStats> {
        match self {
            ValidationReport::Stats(s) => Some(s),
            ValidationReport::Empty { .. } => None,
        }
    }
}

/// Active chunking parameters, as reported by [`Chunker::parameters`].
#[derive(Debug, Clone, Serialize)]
pub struct ChunkingParameters {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub overlap_percentage: f64,
    pub separators: Vec<String>,
    pub strategy: &'static str,
    pub token_estimation: &'static str,
    pub preserve_line_breaks: bool,
}

/// Normalize raw document text before chunking.
///
/// - `\r\n` and lone `\r` become `\n`.
/// - Control characters (C0 except whitespace, DEL, C1) are removed.
/// - Whitespace runs collapse to a single space. With
///   `preserve_line_breaks`, runs containing one line break collapse to
///   `"\n"` and runs containing several to `"\n\n"`.
/// - Leading and trailing whitespace is dropped.
pub fn normalize_text(text: &str, preserve_line_breaks: bool) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut pending_space = false;
    let mut pending_breaks = 0usize;

    for c in unified.chars() {
        if c.is_whitespace() {
            if preserve_line_breaks && c == '\n' {
                pending_breaks += 1;
            } else {
                pending_space = true;
            }
            continue;
        }
        if is_stripped_control(c) {
            continue;
        }
        if !out.is_empty() {
            match pending_breaks {
                0 if pending_space => out.push(' '),
                0 => {}
                1 => out.push('\n'),
                _ => out.push_str("\n\n"),
            }
        }
        pending_space = false;
        pending_breaks = 0;
        out.push(c);
    }

    out
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0b}' | '\u{0c}' | '\u{0e}'..='\u{1f}' | '\u{7f}'..='\u{9f}')
}

/// Rebuild the normalized text from a complete, ordered chunk sequence by
/// skipping the characters each chunk shares with its predecessor.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start_offset);
        out.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.end_offset);
    }
    out
}

/// Derive a stable 16-hex-char document id from `source` and `title`.
pub fn derive_doc_id(source: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", source, title).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Plan `(start, end)` character spans for all chunks.
fn plan_spans(
    chars: &[char],
    size: usize,
    overlap: usize,
    separators: &[String],
) -> Vec<(usize, usize)> {
    let n = chars.len();
    let mut spans = Vec::new();
    if n == 0 {
        return spans;
    }

    let seps: Vec<Vec<char>> = separators
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().collect())
        .collect();

    let mut start = 0usize;
    loop {
        // The next chunk must start after this one, so the cut has to land
        // past the overlap region.
        let min_end = start + overlap + 1;
        let (mut end, mut last) = if n - start <= size {
            (n, true)
        } else {
            let limit = start + size;
            let end = seps
                .iter()
                .find_map(|sep| last_cut(chars, start, min_end, limit, sep))
                .unwrap_or(limit);
            (end, false)
        };
        // Periodic text can repeat the previous chunk verbatim; shorten by one.
        if let Some(&(prev_start, prev_end)) = spans.last() {
            if end > min_end && chars[prev_start..prev_end] == chars[start..end] {
                end -= 1;
                last = false;
            }
        }
        spans.push((start, end));
        if last {
            break;
        }
        start = end - overlap;
    }
    spans
}

/// Largest `e` in `[min_end, limit]` such that `sep` ends at `e` and starts
/// at or after `start`.
fn last_cut(chars: &[char], start: usize, min_end: usize, limit: usize, sep: &[char]) -> Option<usize> {
    let k = sep.len();
    let lo = min_end.max(start + k);
    if lo > limit {
        return None;
    }
    (lo..=limit).rev().find(|&e| chars[e - k..e] == *sep)
}

#[allow(clippy::too_many_arguments)]
fn make_chunk(
    doc_id: &str,
    source: &str,
    title: &str,
    index: usize,
    total: usize,
    start: usize,
    end: usize,
    text: String,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let char_count = end - start;
    Chunk {
        chunk_id: format!("{}_chunk_{}", doc_id, index),
        doc_id: doc_id.to_string(),
        chunk_index: index,
        total_chunks: total,
        position: index,
        source: source.to_string(),
        title: title.to_string(),
        section: extract_section(&text, index),
        word_count: text.split_whitespace().count(),
        char_count,
        estimated_token_count: char_count / CHARS_PER_TOKEN,
        has_numbers: digit_re().is_match(&text),
        has_questions: text.trim_end().ends_with('?'),
        has_lists: list_re().is_match(&text),
        language_tag: detect_language(&text),
        start_offset: start,
        end_offset: end,
        hash,
        text,
    }
}

fn ends_on_sentence_boundary(text: &str) -> bool {
    if text.ends_with('\n') {
        return true;
    }
    matches!(text.trim_end().chars().last(), Some('.' | '!' | '?'))
}

fn digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d").expect("valid regex"))
}

fn list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[-*•]\s").expect("valid regex"))
}

/// `(pattern, capture group holding the label)`; group 0 means the whole line.
fn section_patterns() -> &'static [(Regex, usize)] {
    static PATTERNS: OnceLock<Vec<(Regex, usize)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"^#+\s*(.+)$").expect("valid regex"), 1),
            (Regex::new(r"^[A-Z][A-Z\s]+$").expect("valid regex"), 0),
            (Regex::new(r"^\d+\.\s*(.+)$").expect("valid regex"), 1),
            (Regex::new(r"^[A-Z][a-z]+.*:$").expect("valid regex"), 0),
        ]
    })
}

/// Best-effort section label from the first three lines of a chunk:
/// markdown headers, ALL-CAPS lines, numbered headers, or `Title Case:`
/// lines. Falls back to `"Section {index + 1}"`.
pub fn extract_section(text: &str, index: usize) -> String {
    for line in text.split('\n').take(3) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        for (re, group) in section_patterns() {
            let Some(caps) = re.captures(line) else {
                continue;
            };
            let label = caps
                .get(*group)
                .map(|m| m.as_str())
                .unwrap_or(line)
                .trim()
                .trim_end_matches(':')
                .trim();
            if !label.is_empty() && label.chars().count() <= MAX_SECTION_LABEL {
                return label.to_string();
            }
        }
    }
    format!("Section {}", index + 1)
}

/// Coarse script-range language tag. Deterministic, not linguistically exact.
///
/// Checked in order: accented Latin letters → `NonEnglish`; CJK unified
/// ideographs → `Chinese`; Hiragana → `Japanese`; Hangul syllables →
/// `Korean`; otherwise `English`.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(is_latin_extended) {
        Language::NonEnglish
    } else if text.chars().any(|c| ('\u{4e00}'..='\u{9faf}').contains(&c)) {
        Language::Chinese
    } else if text.chars().any(|c| ('\u{3041}'..='\u{3096}').contains(&c)) {
        Language::Japanese
    } else if text.chars().any(|c| ('\u{ac00}'..='\u{d7a3}').contains(&c)) {
        Language::Korean
    } else {
        Language::English
    }
}

fn is_latin_extended(c: char) -> bool {
    matches!(c, '\u{c0}'..='\u{d6}' | '\u{d8}'..='\u{f6}' | '\u{f8}'..='\u{24f}')
}
