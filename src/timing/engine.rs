//! Timing reconciliation
//!
//! Converts per-chunk audio and raw timing into one gap-free timeline.
//! Every successful chunk is measured with the audio assembler; the measured
//! duration is the ground truth the chunk's segments must fill. Chunk
//! boundaries are rounded from the exact running total, so rounding never
//! accumulates across chunks.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::AudioAssembler;
use crate::channels::NativeTimestamp;
use crate::core::error::{Invariant, Result, TtsError};
use crate::orchestrator::{ChunkFailure, ChunkOutcome, FailureReason};
use crate::readalong::TimedSegment;
use crate::text::Chunk;
use crate::timing::distribution::{distribute_ms, starts_ms, to_ms, to_secs};
use crate::timing::mode::TimingStrategy;

/// Slack when checking native offsets against the measured duration
const NATIVE_OFFSET_SLACK: f64 = 0.001;

/// Measured length of one included chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkDuration {
    /// Chunk position in the document
    pub chunk_index: usize,
    /// Measured audio duration in seconds
    pub duration: f64,
}

/// Reconciled timeline plus the chunks it covers
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Ordered, gap-free segments of the included chunks
    pub segments: Vec<TimedSegment>,
    /// Included chunks in order; their audio makes up the final file
    pub chunk_durations: Vec<ChunkDuration>,
    /// Chunks left out of the timeline, in order
    pub failures: Vec<ChunkFailure>,
}

impl Reconciliation {
    /// Sum of included chunk durations in seconds
    pub fn measured_total(&self) -> f64 {
        self.chunk_durations.iter().map(|c| c.duration).sum()
    }

    /// Indices of chunks whose audio belongs in the final file
    pub fn included_chunks(&self) -> Vec<usize> {
        self.chunk_durations.iter().map(|c| c.chunk_index).collect()
    }

    /// End of the last segment in seconds
    pub fn timeline_end(&self) -> f64 {
        self.segments.last().map_or(0.0, TimedSegment::end_time)
    }
}

/// Reconciles one document's chunk results
pub struct TimingEngine<'a> {
    strategy: TimingStrategy,
    assembler: &'a dyn AudioAssembler,
    native_timestamps: bool,
}

impl<'a> TimingEngine<'a> {
    /// Create an engine for a strategy
    ///
    /// Native timestamps are ignored until enabled with
    /// [`TimingEngine::with_native_timestamps`].
    pub fn new(strategy: TimingStrategy, assembler: &'a dyn AudioAssembler) -> Self {
        Self {
            strategy,
            assembler,
            native_timestamps: false,
        }
    }

    /// Trust engine-reported timestamps (batched strategy only)
    pub fn with_native_timestamps(mut self, enabled: bool) -> Self {
        self.native_timestamps = enabled;
        self
    }

    /// Strategy in use
    pub fn strategy(&self) -> TimingStrategy {
        self.strategy
    }

    /// Build the timeline from chunk outcomes in chunk order
    pub async fn reconcile(
        &self,
        chunks: &[Chunk],
        outcomes: &[ChunkOutcome],
    ) -> Result<Reconciliation> {
        if chunks.len() != outcomes.len() {
            return Err(TtsError::invariant(
                Invariant::ChunkAccounting,
                format!("{} chunks but {} outcomes", chunks.len(), outcomes.len()),
            ));
        }

        let mut segments = Vec::new();
        let mut chunk_durations = Vec::new();
        let mut failures = Vec::new();
        let mut exact_total = 0.0f64;
        let mut cursor_ms = 0u64;
        let mut first_segment_index = 0usize;

        for (chunk, outcome) in chunks.iter().zip(outcomes) {
            let segment_base = first_segment_index;
            first_segment_index += chunk.len();

            let result = match outcome {
                Ok(result) => result,
                Err(failure) => {
                    failures.push(failure.clone());
                    continue;
                }
            };
            if result.chunk_index != chunk.index() {
                return Err(TtsError::invariant(
                    Invariant::ChunkAccounting,
                    format!(
                        "result for chunk {} arrived in slot {}",
                        result.chunk_index,
                        chunk.index()
                    ),
                ));
            }

            let duration = match self.measure(&result.audio).await {
                Ok(duration) => duration,
                Err(err) => {
                    warn!("Chunk {} excluded: {}", chunk.index(), err);
                    failures.push(ChunkFailure {
                        chunk_index: chunk.index(),
                        attempts: result.attempts,
                        reason: FailureReason::Measurement {
                            error: err.to_string(),
                        },
                    });
                    continue;
                }
            };

            exact_total += duration;
            let end_ms = to_ms(exact_total).max(cursor_ms);
            let chunk_ms = end_ms - cursor_ms;

            let durations_ms = self.segment_durations(
                chunk,
                result.native_timestamps.as_deref(),
                duration,
                chunk_ms,
            );
            let starts = starts_ms(cursor_ms, &durations_ms);

            for (offset, (segment, (&start, &len))) in chunk
                .segments()
                .iter()
                .zip(starts.iter().zip(&durations_ms))
                .enumerate()
            {
                segments.push(TimedSegment::new(
                    segment.text(),
                    to_secs(start),
                    to_secs(len),
                    chunk.index(),
                    segment_base + offset,
                ));
            }

            chunk_durations.push(ChunkDuration {
                chunk_index: chunk.index(),
                duration,
            });
            cursor_ms = end_ms;
        }

        info!(
            "Reconciled {} segments over {:.3}s ({} strategy, {} chunks excluded)",
            segments.len(),
            to_secs(cursor_ms),
            self.strategy,
            failures.len()
        );

        Ok(Reconciliation {
            segments,
            chunk_durations,
            failures,
        })
    }

    async fn measure(&self, audio: &[u8]) -> Result<f64> {
        let duration = self.assembler.measure_duration(audio).await?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(TtsError::Timing {
                message: format!("measured duration {} is not a valid time", duration),
            });
        }
        Ok(duration)
    }

    /// Per-segment millisecond lengths summing to `chunk_ms`
    fn segment_durations(
        &self,
        chunk: &Chunk,
        native: Option<&[NativeTimestamp]>,
        measured: f64,
        chunk_ms: u64,
    ) -> Vec<u64> {
        if self.strategy == TimingStrategy::Batched && self.native_timestamps {
            if let Some(spans) = native.and_then(|ts| native_spans(ts, chunk.len(), measured, chunk_ms)) {
                debug!("Chunk {}: using native timestamps", chunk.index());
                return spans;
            }
            if native.is_some() {
                warn!(
                    "Chunk {}: native timestamps unusable, distributing by word count",
                    chunk.index()
                );
            }
        }

        let weights: Vec<usize> = chunk.segments().iter().map(|s| s.word_count()).collect();
        distribute_ms(chunk_ms, &weights)
    }
}

/// Segment lengths from native sentence offsets
///
/// Segment `i` spans `[offset_i, offset_{i+1})`; the first starts at the
/// chunk start and the last ends at the chunk end, so pauses between
/// sentences belong to the preceding sentence. Returns `None` unless there is
/// exactly one non-decreasing offset per sentence inside the measured audio.
pub fn native_spans(
    timestamps: &[NativeTimestamp],
    segment_count: usize,
    measured: f64,
    chunk_ms: u64,
) -> Option<Vec<u64>> {
    if segment_count == 0 || timestamps.len() != segment_count {
        return None;
    }
    let offsets_valid = timestamps
        .iter()
        .all(|t| t.offset.is_finite() && t.offset >= 0.0 && t.offset <= measured + NATIVE_OFFSET_SLACK);
    let ordered = timestamps.windows(2).all(|w| w[0].offset <= w[1].offset);
    if !offsets_valid || !ordered {
        return None;
    }

    let mut boundaries = Vec::with_capacity(segment_count + 1);
    boundaries.push(0u64);
    for t in &timestamps[1..] {
        boundaries.push(to_ms(t.offset).min(chunk_ms));
    }
    boundaries.push(chunk_ms);

    Some(boundaries.windows(2).map(|w| w[1].saturating_sub(w[0])).collect())
}
