//! Chunking strategies
//!
//! Groups ordered sentence segments into request-sized [`Chunk`]s:
//! - Sentence-based: size is measured in characters
//! - Word-count-based: size is measured in words
//!
//! Sentences are never split. A sentence larger than the max size becomes
//! its own oversized chunk.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{Result, TtsError};
use crate::text::segmenter::{SentenceSegmenter, TextSegment, DEFAULT_ABBREVIATIONS};

/// How chunk size is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Sum of segment character counts (joining spaces not counted)
    #[default]
    SentenceBased,
    /// Sum of segment word counts
    WordCountBased,
}

impl ChunkingStrategy {
    /// Size of one segment under this strategy
    pub fn measure(&self, segment: &TextSegment) -> usize {
        match self {
            Self::SentenceBased => segment.char_len(),
            Self::WordCountBased => segment.word_count(),
        }
    }

    /// Unit name used in logs and errors
    pub fn unit(&self) -> &'static str {
        match self {
            Self::SentenceBased => "chars",
            Self::WordCountBased => "words",
        }
    }

    /// Partition segments into chunks
    ///
    /// The next segment joins the current chunk iff
    /// `current_size + next_size <= max_size`.
    pub fn chunk(
        &self,
        segments: &[TextSegment],
        target_size: usize,
        max_size: usize,
    ) -> Result<Vec<Chunk>> {
        self.chunk_within(segments, target_size, max_size, None)
    }

    /// Partition segments into chunks whose request text fits `request_limit`
    ///
    /// The request limit counts characters of [`Chunk::text`], joining
    /// spaces included, and applies under both size measures. A single
    /// segment longer than the limit still becomes its own chunk.
    pub fn chunk_within(
        &self,
        segments: &[TextSegment],
        target_size: usize,
        max_size: usize,
        request_limit: Option<usize>,
    ) -> Result<Vec<Chunk>> {
        validate_sizes(target_size, max_size)?;

        let mut chunks = Vec::new();
        let mut current: Vec<TextSegment> = Vec::new();
        let mut current_size = 0usize;
        let mut current_chars = 0usize;

        for segment in segments {
            let size = self.measure(segment);
            let chars = segment.char_len();
            if !current.is_empty() {
                let fits_size = current_size + size <= max_size;
                let fits_request =
                    request_limit.map_or(true, |limit| current_chars + 1 + chars <= limit);
                if !(fits_size && fits_request) {
                    chunks.push(Chunk::new(chunks.len(), std::mem::take(&mut current)));
                    current_size = 0;
                    current_chars = 0;
                }
            }
            current_chars += if current.is_empty() { chars } else { chars + 1 };
            current.push(segment.clone());
            current_size += size;
        }
        if !current.is_empty() {
            chunks.push(Chunk::new(chunks.len(), current));
        }

        let undersized = chunks
            .iter()
            .take(chunks.len().saturating_sub(1))
            .filter(|c| c.size(*self) < target_size)
            .count();
        let oversized = chunks.iter().filter(|c| c.size(*self) > max_size).count();
        debug!(
            "Chunked {} segments into {} chunks (target {} / max {} {}, request limit {:?}, {} below target, {} oversized)",
            segments.len(),
            chunks.len(),
            target_size,
            max_size,
            self.unit(),
            request_limit,
            undersized,
            oversized
        );

        Ok(chunks)
    }
}

/// One chunk per segment, preserving order
pub fn chunk_individually(segments: &[TextSegment]) -> Vec<Chunk> {
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| Chunk::new(index, vec![segment.clone()]))
        .collect()
}

fn validate_sizes(target_size: usize, max_size: usize) -> Result<()> {
    if max_size == 0 {
        return Err(TtsError::config("chunk max size must be greater than zero"));
    }
    if target_size > max_size {
        return Err(TtsError::config(format!(
            "chunk target size {} exceeds max size {}",
            target_size, max_size
        )));
    }
    Ok(())
}

/// An ordered group of whole segments sent to a backend as one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    index: usize,
    segments: Vec<TextSegment>,
}

impl Chunk {
    fn new(index: usize, segments: Vec<TextSegment>) -> Self {
        Self { index, segments }
    }

    /// Position of the chunk in the document
    pub fn index(&self) -> usize {
        self.index
    }

    /// Member segments in order
    pub fn segments(&self) -> &[TextSegment] {
        &self.segments
    }

    /// Number of member segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the chunk has no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Request text: member segments joined by one space
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(TextSegment::text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Total words across member segments
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(TextSegment::word_count).sum()
    }

    /// Chunk size under a strategy (joining spaces not counted)
    pub fn size(&self, strategy: ChunkingStrategy) -> usize {
        self.segments.iter().map(|s| strategy.measure(s)).sum()
    }

    /// Characters in the request text, joining spaces included
    pub fn request_len(&self) -> usize {
        let chars: usize = self.segments.iter().map(TextSegment::char_len).sum();
        chars + self.segments.len().saturating_sub(1)
    }

    /// The chunk as a single chunk-level segment
    pub fn as_text_segment(&self) -> TextSegment {
        TextSegment::chunk(self.text())
    }

    /// Member sentence texts, for backends that mark sentence boundaries
    pub fn sentence_texts(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.text().to_string()).collect()
    }
}

/// Chunking parameters supplied per document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Size measure
    #[serde(default)]
    pub strategy: ChunkingStrategy,

    /// Preferred chunk size
    #[serde(default = "default_target_size")]
    pub target_size: usize,

    /// Hard chunk size limit (oversized single sentences excepted)
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Abbreviations that do not end a sentence
    #[serde(default = "default_abbreviations")]
    pub abbreviations: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            target_size: default_target_size(),
            max_size: default_max_size(),
            abbreviations: default_abbreviations(),
        }
    }
}

impl ChunkingConfig {
    /// Fail fast on inconsistent sizes
    pub fn validate(&self) -> Result<()> {
        validate_sizes(self.target_size, self.max_size)
    }

    /// Limit sizes to what a backend accepts per request
    ///
    /// Only applies to the character measure; callers validate first.
    pub fn clamped_to(&self, backend_max_chars: usize) -> Self {
        let mut clamped = self.clone();
        if self.strategy == ChunkingStrategy::SentenceBased && backend_max_chars > 0 {
            clamped.max_size = self.max_size.min(backend_max_chars);
            clamped.target_size = self.target_size.min(clamped.max_size);
        }
        clamped
    }

    /// Segmenter using this configuration's abbreviations
    pub fn segmenter(&self) -> SentenceSegmenter {
        SentenceSegmenter::new(&self.abbreviations)
    }

    /// Partition segments with this configuration
    pub fn chunk(&self, segments: &[TextSegment]) -> Result<Vec<Chunk>> {
        self.strategy.chunk(segments, self.target_size, self.max_size)
    }

    /// Partition segments for a backend accepting `backend_max_chars` per request
    ///
    /// Sizes are clamped as in [`clamped_to`](Self::clamped_to) and every
    /// multi-segment request text stays within the backend limit.
    pub fn chunk_for_backend(
        &self,
        segments: &[TextSegment],
        backend_max_chars: usize,
    ) -> Result<Vec<Chunk>> {
        let clamped = self.clamped_to(backend_max_chars);
        let request_limit = (backend_max_chars > 0).then_some(backend_max_chars);
        clamped
            .strategy
            .chunk_within(segments, clamped.target_size, clamped.max_size, request_limit)
    }
}

fn default_target_size() -> usize {
    3000
}

fn default_max_size() -> usize {
    5000
}

fn default_abbreviations() -> Vec<String> {
    DEFAULT_ABBREVIATIONS.iter().map(|a| a.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(lengths: &[usize]) -> Vec<TextSegment> {
        lengths
            .iter()
            .map(|&n| TextSegment::sentence("a".repeat(n)))
            .collect()
    }

    fn shape(chunks: &[Chunk]) -> Vec<usize> {
        chunks.iter().map(Chunk::len).collect()
    }

    #[test]
    fn test_greedy_fills_to_max_inclusive() {
        let segs = sentences(&[20, 20, 20]);
        let chunks = ChunkingStrategy::SentenceBased.chunk(&segs, 50, 60).unwrap();
        assert_eq!(shape(&chunks), vec![3]);
        assert_eq!(chunks[0].size(ChunkingStrategy::SentenceBased), 60);
    }

    #[test]
    fn test_greedy_boundary_one_below_max() {
        let segs = sentences(&[20, 20, 20]);
        let chunks = ChunkingStrategy::SentenceBased.chunk(&segs, 40, 59).unwrap();
        assert_eq!(shape(&chunks), vec![2, 1]);
        assert_eq!(chunks[1].index(), 1);
    }

    #[test]
    fn test_target_above_max_is_config_error() {
        let segs = sentences(&[10]);
        let err = ChunkingStrategy::SentenceBased.chunk(&segs, 70, 60).unwrap_err();
        assert!(err.is_config());
        assert!(ChunkingStrategy::WordCountBased.chunk(&segs, 0, 0).is_err());
    }

    #[test]
    fn test_oversized_sentence_is_own_chunk() {
        let segs = sentences(&[10, 100, 10, 10]);
        let chunks = ChunkingStrategy::SentenceBased.chunk(&segs, 10, 30).unwrap();
        assert_eq!(shape(&chunks), vec![1, 1, 2]);
        assert_eq!(chunks[1].size(ChunkingStrategy::SentenceBased), 100);
    }

    #[test]
    fn test_word_count_strategy() {
        let segs = vec![
            TextSegment::sentence("one two three."),
            TextSegment::sentence("four five."),
            TextSegment::sentence("six seven eight nine."),
        ];
        let chunks = ChunkingStrategy::WordCountBased.chunk(&segs, 4, 5).unwrap();
        assert_eq!(shape(&chunks), vec![2, 1]);
        assert_eq!(chunks[0].word_count(), 5);
        assert_eq!(chunks[0].text(), "one two three. four five.");
    }

    #[test]
    fn test_chunking_is_idempotent_and_lossless() {
        let segs = sentences(&[5, 17, 3, 40, 12, 12, 9, 1, 33]);
        let first = ChunkingStrategy::SentenceBased.chunk(&segs, 20, 40).unwrap();
        let second = ChunkingStrategy::SentenceBased.chunk(&segs, 20, 40).unwrap();
        assert_eq!(first, second);

        let regrouped: Vec<TextSegment> = first
            .iter()
            .flat_map(|c| c.segments().iter().cloned())
            .collect();
        assert_eq!(regrouped, segs);
        assert!(first.iter().enumerate().all(|(i, c)| c.index() == i));
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunks = ChunkingStrategy::SentenceBased.chunk(&[], 10, 20).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunk_individually() {
        let segs = sentences(&[3, 4, 5]);
        let chunks = chunk_individually(&segs);
        assert_eq!(shape(&chunks), vec![1, 1, 1]);
        assert_eq!(chunks[2].index(), 2);
        assert_eq!(chunks[2].as_text_segment().segment_type(), crate::text::SegmentType::Chunk);
    }

    #[test]
    fn test_request_limit_counts_joining_spaces() {
        // 2048 + 1 + 2048 = 4097 characters on the wire
        let segs = sentences(&[2048, 2048]);
        let chunks = ChunkingStrategy::SentenceBased
            .chunk_within(&segs, 100, 5000, Some(4096))
            .unwrap();
        assert_eq!(shape(&chunks), vec![1, 1]);

        // 2048 + 1 + 2047 fills the limit exactly
        let segs = sentences(&[2048, 2047]);
        let chunks = ChunkingStrategy::SentenceBased
            .chunk_within(&segs, 100, 5000, Some(4096))
            .unwrap();
        assert_eq!(shape(&chunks), vec![2]);
        assert_eq!(chunks[0].request_len(), 4096);
        assert_eq!(chunks[0].text().chars().count(), 4096);
    }

    #[test]
    fn test_request_limit_applies_to_word_count() {
        let segs = sentences(&[30, 30, 30]);
        let chunks = ChunkingStrategy::WordCountBased
            .chunk_within(&segs, 1, 5000, Some(61))
            .unwrap();
        assert_eq!(shape(&chunks), vec![2, 1]);
        assert!(chunks.iter().all(|c| c.request_len() <= 61));
    }

    #[test]
    fn test_chunk_for_backend_keeps_requests_within_limit() {
        let segs = sentences(&[2048, 2048, 10]);
        let chunks = ChunkingConfig::default().chunk_for_backend(&segs, 4096).unwrap();
        assert_eq!(shape(&chunks), vec![1, 2]);
        assert!(chunks.iter().all(|c| c.request_len() <= 4096));

        let words = ChunkingConfig {
            strategy: ChunkingStrategy::WordCountBased,
            ..ChunkingConfig::default()
        };
        let chunks = words.chunk_for_backend(&segs, 4096).unwrap();
        assert!(chunks.iter().all(|c| c.request_len() <= 4096));
    }

    #[test]
    fn test_config_clamped_to_backend_limit() {
        let config = ChunkingConfig::default();
        let clamped = config.clamped_to(4000);
        assert_eq!(clamped.max_size, 4000);
        assert_eq!(clamped.target_size, 3000);

        let tight = config.clamped_to(1000);
        assert_eq!(tight.max_size, 1000);
        assert_eq!(tight.target_size, 1000);

        let words = ChunkingConfig {
            strategy: ChunkingStrategy::WordCountBased,
            ..ChunkingConfig::default()
        };
        assert_eq!(words.clamped_to(100).max_size, 5000);
    }
}
