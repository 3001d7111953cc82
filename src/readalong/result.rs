//! Document-level results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::core::error::Result;
use crate::orchestrator::ChunkFailure;
use crate::readalong::segment::TimedSegment;

/// Narrated audio plus its sentence timeline
///
/// Only [`ResultBuilder`](crate::readalong::ResultBuilder) constructs
/// this type, so every instance satisfies the ordering and coverage checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAudioResult {
    pub(crate) request_id: String,
    pub(crate) audio_reference: String,
    pub(crate) format: AudioFormat,
    pub(crate) segments: Vec<TimedSegment>,
    pub(crate) total_duration: f64,
    pub(crate) generated_at: DateTime<Utc>,
}

impl TimedAudioResult {
    /// Request identifier
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Where the audio artifact lives
    pub fn audio_reference(&self) -> &str {
        &self.audio_reference
    }

    /// Delivered audio format
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Ordered timeline
    pub fn segments(&self) -> &[TimedSegment] {
        &self.segments
    }

    /// Audio length in seconds
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Creation timestamp
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Pretty JSON for the timing sidecar
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Segment being read at playback time `t` seconds
    pub fn segment_at(&self, t: f64) -> Option<&TimedSegment> {
        if !t.is_finite() {
            return None;
        }
        let idx = self.segments.partition_point(|s| s.end_time() <= t);
        self.segments.get(idx).filter(|s| s.contains(t))
    }
}

/// A document where some chunks have no audio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialFailure {
    /// Timed result covering the chunks that succeeded, if any did
    pub partial: Option<TimedAudioResult>,
    /// Chunks missing from the result, in order
    pub failed_chunks: Vec<ChunkFailure>,
}

impl PartialFailure {
    /// Indices a caller would resubmit
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed_chunks.iter().map(|f| f.chunk_index).collect()
    }
}

/// What one `process` call produced
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Every chunk made it into the timeline
    Complete(TimedAudioResult),
    /// At least one chunk failed
    Partial(PartialFailure),
}

impl ProcessOutcome {
    /// Whether every chunk succeeded
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Timed result, full or partial
    pub fn result(&self) -> Option<&TimedAudioResult> {
        match self {
            Self::Complete(result) => Some(result),
            Self::Partial(partial) => partial.partial.as_ref(),
        }
    }

    /// Failed chunks (empty when complete)
    pub fn failures(&self) -> &[ChunkFailure] {
        match self {
            Self::Complete(_) => &[],
            Self::Partial(partial) => &partial.failed_chunks,
        }
    }
}
