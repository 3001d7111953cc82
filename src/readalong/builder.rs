//! Final validation of a timeline
//!
//! The builder never adjusts a timeline. Anything that fails a check is a
//! reconciliation bug and surfaces as [`TtsError::InvariantViolation`].

use chrono::Utc;

use crate::audio::AudioFormat;
use crate::core::error::{Invariant, Result, TtsError};
use crate::readalong::result::TimedAudioResult;
use crate::readalong::segment::TimedSegment;

/// Default allowed gap between the last segment end and the audio length
pub const DEFAULT_COVERAGE_TOLERANCE: f64 = 0.05;

/// Slack for floating point noise in ordering checks
const ORDERING_EPSILON: f64 = 1e-6;

/// Validates timelines and assembles [`TimedAudioResult`]s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultBuilder {
    tolerance: f64,
}

impl Default for ResultBuilder {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_COVERAGE_TOLERANCE,
        }
    }
}

impl ResultBuilder {
    /// Create a builder with a coverage tolerance in seconds
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: if tolerance.is_finite() && tolerance >= 0.0 {
                tolerance
            } else {
                DEFAULT_COVERAGE_TOLERANCE
            },
        }
    }

    /// Coverage tolerance in seconds
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Validate `segments` against `total_duration` and build the result
    pub fn build(
        &self,
        request_id: impl Into<String>,
        audio_reference: impl Into<String>,
        format: AudioFormat,
        segments: Vec<TimedSegment>,
        total_duration: f64,
    ) -> Result<TimedAudioResult> {
        self.validate(&segments, total_duration)?;
        Ok(TimedAudioResult {
            request_id: request_id.into(),
            audio_reference: audio_reference.into(),
            format,
            segments,
            total_duration,
            generated_at: Utc::now(),
        })
    }

    /// Run every timeline check
    pub fn validate(&self, segments: &[TimedSegment], total_duration: f64) -> Result<()> {
        if !total_duration.is_finite() || total_duration < 0.0 {
            return Err(TtsError::invariant(
                Invariant::ValidTime,
                format!("total duration {} is not a valid time", total_duration),
            ));
        }

        for segment in segments {
            let valid = |t: f64| t.is_finite() && t >= 0.0;
            if !valid(segment.start_time()) || !valid(segment.duration()) {
                return Err(TtsError::invariant(
                    Invariant::ValidTime,
                    format!(
                        "segment {} has start {} and duration {}",
                        segment.segment_index(),
                        segment.start_time(),
                        segment.duration()
                    ),
                ));
            }
        }

        for pair in segments.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.start_time() + ORDERING_EPSILON < prev.end_time() {
                return Err(TtsError::invariant(
                    Invariant::Ordering,
                    format!(
                        "segment {} starts at {:.6}s before segment {} ends at {:.6}s",
                        next.segment_index(),
                        next.start_time(),
                        prev.segment_index(),
                        prev.end_time()
                    ),
                ));
            }
        }

        let last_end = segments.last().map_or(0.0, TimedSegment::end_time);
        let gap = (last_end - total_duration).abs();
        if gap > self.tolerance + ORDERING_EPSILON {
            return Err(TtsError::invariant(
                Invariant::Coverage,
                format!(
                    "timeline ends at {:.3}s but audio lasts {:.3}s (tolerance {:.3}s)",
                    last_end, total_duration, self.tolerance
                ),
            ));
        }

        Ok(())
    }
}
