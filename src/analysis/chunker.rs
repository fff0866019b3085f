//! Boundary-Aware Manuscript Chunker
//!
//! Splits prose into chunks that respect narrative structure. Each cut point
//! is searched within a ±10% window around the size target, preferring (in
//! order) a chapter heading, a paragraph break, a sentence end, and finally
//! the raw target position. Consecutive chunks overlap by a fixed tail so a
//! scene split mid-flow still reads coherently in both chunks.
//!
//! Offsets are byte offsets into the original manuscript, always clamped to
//! UTF-8 character boundaries.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ai::tokenizer::estimate_tokens;
use crate::constants::chunking;
use crate::types::{RedpenError, Result};

static CHAPTER_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*(chapter\b|ch\.|scene\b|part\b|book\b|prologue\b|epilogue\b|interlude\b)[^\n]*$")
        .expect("invalid chapter heading pattern")
});

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]["']?\s"#).expect("invalid sentence end pattern")
});

/// A chapter heading detected in the manuscript
#[derive(Debug, Clone, Serialize)]
pub struct ChapterInfo {
    /// Heading line, trimmed
    pub title: String,
    /// Byte offset of the heading start
    pub offset: usize,
}

/// One slice of the manuscript, ready for analysis
#[derive(Debug, Clone)]
pub struct ManuscriptChunk {
    /// 0-based position in the chunk sequence
    pub index: usize,
    /// Chunk text, including any overlap carried from the previous chunk
    pub text: String,
    /// Byte offset where this chunk starts in the manuscript
    pub start_offset: usize,
    /// Byte offset where this chunk ends (exclusive)
    pub end_offset: usize,
    /// Chapter headings falling inside this chunk
    pub chapters: Vec<ChapterInfo>,
}

impl ManuscriptChunk {
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}

/// Chunking parameters
#[derive(Debug, Clone, serde::Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Chunk size target in characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Overlap carried between consecutive chunks
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    /// Break-point search window, as a fraction of `max_chars`
    #[serde(default = "default_deviation")]
    pub deviation_fraction: f64,
}

fn default_max_chars() -> usize {
    chunking::MAX_CHARS_PER_CHUNK
}

fn default_overlap_chars() -> usize {
    chunking::OVERLAP_CHARS
}

fn default_deviation() -> f64 {
    chunking::DEVIATION_FRACTION
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
            deviation_fraction: default_deviation(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(RedpenError::Validation(
                "chunking.max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(RedpenError::Validation(
                "chunking.overlap_chars must be smaller than max_chars".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.deviation_fraction) {
            return Err(RedpenError::Validation(
                "chunking.deviation_fraction must be in [0, 0.5)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of a chunking pass, for logging and metadata
#[derive(Debug, Clone, Serialize)]
pub struct ChunkingStats {
    pub chunk_count: usize,
    pub total_chars: usize,
    pub avg_chunk_chars: usize,
    pub max_chunk_tokens: usize,
    pub chapters_detected: usize,
}

impl ChunkingStats {
    pub fn from_chunks(chunks: &[ManuscriptChunk], chapters_detected: usize) -> Self {
        let total_chars: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        Self {
            chunk_count: chunks.len(),
            total_chars,
            avg_chunk_chars: if chunks.is_empty() {
                0
            } else {
                total_chars / chunks.len()
            },
            max_chunk_tokens: chunks
                .iter()
                .map(ManuscriptChunk::estimated_tokens)
                .max()
                .unwrap_or(0),
            chapters_detected,
        }
    }
}

/// Largest char-boundary index not exceeding `idx`
fn clamp_to_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Detect chapter-style headings across the whole manuscript
pub fn detect_chapters(manuscript: &str) -> Vec<ChapterInfo> {
    CHAPTER_HEADING
        .find_iter(manuscript)
        .map(|m| ChapterInfo {
            title: m.as_str().trim().to_string(),
            offset: m.start(),
        })
        .collect()
}

/// Pick the best break point inside `[search_start, search_end]`.
///
/// Preference order: the last chapter heading in the window, the last
/// paragraph break, the first sentence end at or past `target` (else the
/// last one before it), then the raw `target`. Every candidate must land
/// strictly after `cursor` so a chunk can never be empty.
fn find_break_point(
    manuscript: &str,
    chapters: &[ChapterInfo],
    cursor: usize,
    target: usize,
    search_start: usize,
    search_end: usize,
) -> usize {
    let fallback = clamp_to_char_boundary(manuscript, target.min(manuscript.len()));
    if search_start >= search_end {
        return fallback;
    }

    // Chapter heading: break right before the last one in the window so the
    // chunk runs as far as possible and the heading opens the next chunk
    if let Some(heading) = chapters
        .iter()
        .filter(|c| c.offset > cursor && (search_start..=search_end).contains(&c.offset))
        .last()
    {
        return clamp_to_char_boundary(manuscript, heading.offset);
    }

    let window = &manuscript[clamp_to_char_boundary(manuscript, search_start)
        ..clamp_to_char_boundary(manuscript, search_end)];
    let window_base = clamp_to_char_boundary(manuscript, search_start);

    // Paragraph break: cut after the blank line
    if let Some(pos) = window.rfind("\n\n") {
        let end = window_base + pos + 2;
        if end > cursor {
            return end;
        }
    }

    // Sentence end: cut after the first terminator at or past the target so
    // the chunk hugs the size target; fall back to the last one before it
    let mut before_target = None;
    for m in SENTENCE_END.find_iter(window) {
        let end = window_base + m.end();
        if end <= cursor {
            continue;
        }
        if end >= target {
            return end;
        }
        before_target = Some(end);
    }
    if let Some(end) = before_target {
        return end;
    }

    fallback
}

/// Split a manuscript into overlapping, boundary-aware chunks.
///
/// A manuscript that fits in one chunk comes back as a single chunk with no
/// overlap. An empty manuscript is a validation error.
pub fn chunk_manuscript(manuscript: &str, config: &ChunkingConfig) -> Result<Vec<ManuscriptChunk>> {
    if manuscript.trim().is_empty() {
        return Err(RedpenError::Validation(
            "Cannot chunk an empty manuscript".to_string(),
        ));
    }
    config.validate()?;

    let chapters = detect_chapters(manuscript);
    let deviation = (config.max_chars as f64 * config.deviation_fraction) as usize;
    let len = manuscript.len();

    let mut chunks = Vec::new();
    let mut cursor = 0usize;

    while cursor < len {
        let target = cursor + config.max_chars;

        let end = if target >= len {
            len
        } else {
            let search_start = target.saturating_sub(deviation).max(cursor + 1);
            let search_end = (target + deviation).min(len);
            find_break_point(manuscript, &chapters, cursor, target, search_start, search_end)
        };

        let mut end = clamp_to_char_boundary(manuscript, end.min(len));
        if end <= cursor {
            // Degenerate configs (tiny max_chars over multibyte text) can
            // clamp back onto the cursor; step to the next boundary instead
            end = (cursor + 1..=len)
                .find(|&i| manuscript.is_char_boundary(i))
                .unwrap_or(len);
        }

        let text = manuscript[cursor..end].to_string();
        let chunk_chapters: Vec<ChapterInfo> = chapters
            .iter()
            .filter(|c| (cursor..end).contains(&c.offset))
            .cloned()
            .collect();

        let chunk = ManuscriptChunk {
            index: chunks.len(),
            text,
            start_offset: cursor,
            end_offset: end,
            chapters: chunk_chapters,
        };

        if chunk.estimated_tokens() > chunking::MAX_TOKENS_PER_CHUNK {
            warn!(
                index = chunk.index,
                tokens = chunk.estimated_tokens(),
                limit = chunking::MAX_TOKENS_PER_CHUNK,
                "chunk exceeds the soft token cap"
            );
        }

        chunks.push(chunk);

        if end >= len {
            break;
        }

        // Overlap: step back from the cut, but always make forward progress
        let next = end.saturating_sub(config.overlap_chars).max(cursor + 1);
        cursor = clamp_to_char_boundary(manuscript, next);
        if cursor <= chunks[chunks.len() - 1].start_offset {
            cursor = end;
        }
    }

    let stats = ChunkingStats::from_chunks(&chunks, chapters.len());
    debug!(
        chunks = stats.chunk_count,
        avg_chars = stats.avg_chunk_chars,
        chapters = stats.chapters_detected,
        "manuscript chunked"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_config() -> ChunkingConfig {
        ChunkingConfig {
            max_chars: 200,
            overlap_chars: 20,
            deviation_fraction: 0.1,
        }
    }

    #[test]
    fn test_empty_manuscript_is_validation_error() {
        let err = chunk_manuscript("   \n  ", &ChunkingConfig::default()).unwrap_err();
        assert!(matches!(err, RedpenError::Validation(_)));
    }

    #[test]
    fn test_short_manuscript_single_chunk() {
        let text = "A quiet morning. Nothing stirred.";
        let chunks = chunk_manuscript(text, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.len());
    }

    #[test]
    fn test_detect_chapters() {
        let text = "Prologue\n\nrain fell.\n\nChapter 1: The Harbor\n\nships left.\n\nCHAPTER 2\n\nmore.";
        let chapters = detect_chapters(text);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Prologue", "Chapter 1: The Harbor", "CHAPTER 2"]);
    }

    #[test]
    fn test_detect_scene_and_abbreviated_markers() {
        let text = "Chapter 1\n\nrain fell.\n\nScene 2\n\nwind rose.\n\nCh. 3\n\ntide turned.\n\nSCENE 4\n\ncalm.";
        let chapters = detect_chapters(text);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Chapter 1", "Scene 2", "Ch. 3", "SCENE 4"]);
    }

    #[test]
    fn test_chapter_boundary_preferred_over_sentence() {
        // Heading sits inside the search window; the cut must land on it
        // even though sentence ends are everywhere.
        let sentence = "The galley drifted onward. ";
        let mut text = String::new();
        while text.len() < 190 {
            text.push_str(sentence);
        }
        text.truncate(190);
        text.push_str("\nChapter 2\n");
        let heading_offset = 191;
        while text.len() < 400 {
            text.push_str(sentence);
        }

        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].end_offset, heading_offset);
        assert_eq!(chunks[1].chapters[0].title, "Chapter 2");
    }

    #[test]
    fn test_last_heading_in_window_wins() {
        // Two headings inside the search window [180, 220]: the cut must
        // land on the later one so the chunk runs as far as possible.
        let mut text = "x".repeat(185);
        text.push('\n');
        text.push_str("Chapter 2\n"); // offset 186
        while text.len() < 205 {
            text.push('x');
        }
        text.push('\n');
        text.push_str("Chapter 3\n"); // offset 206
        while text.len() < 400 {
            text.push('x');
        }

        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        assert_eq!(chunks[0].end_offset, 206);
        // The earlier heading stays inside the first chunk
        assert_eq!(chunks[0].chapters.len(), 1);
        assert_eq!(chunks[0].chapters[0].title, "Chapter 2");
        assert!(chunks[1].chapters.iter().any(|c| c.title == "Chapter 3"));
    }

    #[test]
    fn test_paragraph_break_preferred_over_sentence() {
        let sentence = "The galley drifted onward. ";
        let mut text = String::new();
        while text.len() < 185 {
            text.push_str(sentence);
        }
        text.truncate(185);
        text.push_str("\n\n");
        let para_end = text.len();
        while text.len() < 400 {
            text.push_str(sentence);
        }

        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        assert_eq!(chunks[0].end_offset, para_end);
    }

    #[test]
    fn test_sentence_break_when_no_structure() {
        let sentence = "The galley drifted onward. ";
        let mut text = String::new();
        while text.len() < 400 {
            text.push_str(sentence);
        }

        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        assert!(chunks.len() >= 2);
        // Cut lands after a sentence terminator
        assert!(chunks[0].text.trim_end().ends_with('.'));
    }

    #[test]
    fn test_sentence_cut_hugs_target() {
        // Terminators near both edges of the search window [180, 220]: the
        // cut takes the first one at or past the 200-char target (end 203)
        // instead of drifting to the far window edge (end 219).
        let mut text = "x".repeat(201);
        text.push_str(". ");
        text.push_str(&"x".repeat(14));
        text.push_str(". ");
        while text.len() < 400 {
            text.push('x');
        }

        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        assert_eq!(chunks[0].end_offset, 203);
    }

    #[test]
    fn test_overlap_between_chunks() {
        let sentence = "The galley drifted onward. ";
        let mut text = String::new();
        while text.len() < 500 {
            text.push_str(sentence);
        }

        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        assert!(chunks.len() >= 2);
        let gap = chunks[0].end_offset - chunks[1].start_offset;
        assert!(gap > 0 && gap <= 20, "overlap was {}", gap);
    }

    #[test]
    fn test_multibyte_text_stays_on_char_boundaries() {
        let text = "Élan était là. ".repeat(60);
        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        for chunk in &chunks {
            // Would panic on a bad boundary; also verify the slice matches
            assert_eq!(
                &text[chunk.start_offset..chunk.end_offset],
                chunk.text.as_str()
            );
        }
    }

    #[test]
    fn test_novel_with_chapter_markers() {
        // 100k chars, headings every 12.5k, padding with no other break
        // opportunities: cuts land on headings inside the window, then on
        // the raw target once headings fall outside it.
        let mut text = String::new();
        for i in 1..=8 {
            text.push_str(&format!("Chapter {}\n", i));
            while text.len() < i * 12_500 - 1 {
                text.push('x');
            }
            text.push('\n');
        }
        assert_eq!(text.len(), 100_000);

        let config = ChunkingConfig {
            max_chars: 24_000,
            overlap_chars: 500,
            deviation_fraction: 0.1,
        };
        let chunks = chunk_manuscript(&text, &config).unwrap();

        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].end_offset, 25_000);
        assert_eq!(chunks[1].start_offset, 24_500);
        assert_eq!(chunks[1].end_offset, 50_000);
        assert_eq!(chunks[2].end_offset, 75_000);
        assert_eq!(chunks[4].end_offset, 100_000);
        assert!(chunks[1].text.contains("Chapter 3"));
    }

    #[test]
    fn test_indices_are_sequential() {
        let text = "word ".repeat(200);
        let chunks = chunk_manuscript(&text, &small_config()).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(
            ChunkingConfig {
                overlap_chars: 300,
                max_chars: 200,
                deviation_fraction: 0.1,
            }
            .validate()
            .is_err()
        );
        assert!(
            ChunkingConfig {
                max_chars: 0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }

    proptest! {
        /// Stripping each chunk's overlap prefix and concatenating the rest
        /// reconstructs the manuscript exactly.
        #[test]
        fn prop_chunks_cover_manuscript(words in proptest::collection::vec("[a-zA-Z]{1,10}", 1..400)) {
            let text = words.join(" ");
            let config = small_config();
            let chunks = chunk_manuscript(&text, &config).unwrap();

            prop_assert_eq!(chunks[0].start_offset, 0);
            prop_assert_eq!(chunks.last().unwrap().end_offset, text.len());

            let mut rebuilt = String::new();
            let mut covered = 0usize;
            for chunk in &chunks {
                prop_assert!(chunk.start_offset <= covered);
                prop_assert!(chunk.end_offset > covered);
                rebuilt.push_str(&text[covered..chunk.end_offset]);
                covered = chunk.end_offset;
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}
