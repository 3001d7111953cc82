//! Per-chunk synthesis outcomes

use serde::Serialize;
use std::time::Duration;

use crate::channels::NativeTimestamp;
use crate::orchestrator::rate_limit::RateLimitState;

/// Audio and timing for one successfully synthesized chunk
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Chunk position in the document
    pub chunk_index: usize,
    /// Encoded chunk audio
    pub audio: Vec<u8>,
    /// Engine-reported sentence timing, if any
    pub native_timestamps: Option<Vec<NativeTimestamp>>,
    /// Duration of the successful backend call
    pub backend_latency: Duration,
    /// Calls made for this chunk, including the successful one
    pub attempts: u32,
}

/// Why a chunk has no audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Transient failures outlasted the retry budget
    Exhausted { last_error: String },
    /// The backend returned a non-retryable error
    Rejected { error: String },
    /// Not attempted (or not retried) because another chunk failed first
    Cancelled,
    /// Audio arrived but its duration could not be measured
    Measurement { error: String },
}

/// A chunk that did not make it into the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    /// Chunk position in the document
    pub chunk_index: usize,
    /// Backend calls made for this chunk
    pub attempts: u32,
    /// Failure cause
    pub reason: FailureReason,
}

impl ChunkFailure {
    /// Failure for a chunk skipped after the run was aborted
    pub fn cancelled(chunk_index: usize, attempts: u32) -> Self {
        Self {
            chunk_index,
            attempts,
            reason: FailureReason::Cancelled,
        }
    }

    /// Short human-readable reason
    pub fn describe(&self) -> String {
        match &self.reason {
            FailureReason::Exhausted { last_error } => {
                format!("gave up after {} attempts: {}", self.attempts, last_error)
            }
            FailureReason::Rejected { error } => format!("rejected: {}", error),
            FailureReason::Cancelled => "cancelled after an earlier chunk failed".to_string(),
            FailureReason::Measurement { error } => format!("unmeasurable audio: {}", error),
        }
    }
}

/// Outcome of one chunk, in document order
pub type ChunkOutcome = Result<SynthesisResult, ChunkFailure>;

/// Everything one orchestrator run produced
#[derive(Debug, Clone)]
pub struct SynthesisReport {
    /// One entry per input chunk, indexed like the input
    pub outcomes: Vec<ChunkOutcome>,
    /// Wall time of the run
    pub elapsed: Duration,
    /// Pacing state at the end of the run
    pub rate_limit: RateLimitState,
}

impl SynthesisReport {
    /// Successful chunks in order
    pub fn successes(&self) -> impl Iterator<Item = &SynthesisResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    /// Failed chunks in order
    pub fn failures(&self) -> impl Iterator<Item = &ChunkFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    /// Whether every chunk succeeded
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }

    /// Split into successes and failures, both in order
    pub fn into_parts(self) -> (Vec<SynthesisResult>, Vec<ChunkFailure>) {
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                Ok(result) => successes.push(result),
                Err(failure) => failures.push(failure),
            }
        }
        (successes, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serialization() {
        let failure = ChunkFailure {
            chunk_index: 3,
            attempts: 4,
            reason: FailureReason::Exhausted {
                last_error: "[gemini] Service unavailable: busy".to_string(),
            },
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["chunk_index"], 3);
        assert_eq!(json["reason"]["kind"], "exhausted");
        assert!(failure.describe().contains("after 4 attempts"));
    }

    #[test]
    fn test_report_parts_keep_order() {
        let ok = |i: usize| -> ChunkOutcome {
            Ok(SynthesisResult {
                chunk_index: i,
                audio: vec![],
                native_timestamps: None,
                backend_latency: Duration::ZERO,
                attempts: 1,
            })
        };
        let report = SynthesisReport {
            outcomes: vec![ok(0), Err(ChunkFailure::cancelled(1, 0)), ok(2)],
            elapsed: Duration::ZERO,
            rate_limit: RateLimitState::default(),
        };
        assert!(!report.is_complete());
        assert_eq!(report.failures().count(), 1);
        let (successes, failures) = report.into_parts();
        assert_eq!(successes.iter().map(|s| s.chunk_index).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(failures[0].chunk_index, 1);
    }
}
