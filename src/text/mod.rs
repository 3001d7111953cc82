//! Text processing module
//!
//! Provides:
//! - Sentence segmentation with abbreviation handling
//! - Chunking of sentences into backend-sized requests

mod chunker;
mod segmenter;

pub use chunker::{chunk_individually, Chunk, ChunkingConfig, ChunkingStrategy};
pub use segmenter::{
    count_words, strip_markup, SegmentType, SentenceSegmenter, TextSegment,
    DEFAULT_ABBREVIATIONS,
};
