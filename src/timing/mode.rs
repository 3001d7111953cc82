//! Timing strategy selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configured timing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TimingMode {
    /// Multi-sentence chunks; native timestamps when the engine offers them
    #[default]
    Batched,
    /// One request per sentence, each timed by its measured audio
    Measured,
    /// Measured for short documents, batched otherwise
    Hybrid {
        /// Largest segment count still synthesized per sentence
        measured_max_segments: usize,
    },
}

/// Strategy actually applied to one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingStrategy {
    /// Strategy A: batched chunks
    Batched,
    /// Strategy B: per-sentence measurement
    Measured,
}

impl TimingMode {
    /// Pick the strategy for a document with `segment_count` sentences
    pub fn resolve(&self, segment_count: usize) -> TimingStrategy {
        match self {
            Self::Batched => TimingStrategy::Batched,
            Self::Measured => TimingStrategy::Measured,
            Self::Hybrid {
                measured_max_segments,
            } => {
                if segment_count <= *measured_max_segments {
                    TimingStrategy::Measured
                } else {
                    TimingStrategy::Batched
                }
            }
        }
    }
}

impl fmt::Display for TimingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batched => write!(f, "batched"),
            Self::Measured => write!(f, "measured"),
        }
    }
}

impl FromStr for TimingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "batched" | "batch" => Ok(Self::Batched),
            "measured" | "individual" => Ok(Self::Measured),
            other => Err(format!("Unknown timing strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hybrid_threshold_is_inclusive() {
        let mode = TimingMode::Hybrid {
            measured_max_segments: 10,
        };
        assert_eq!(mode.resolve(10), TimingStrategy::Measured);
        assert_eq!(mode.resolve(11), TimingStrategy::Batched);
        assert_eq!(TimingMode::Measured.resolve(1000), TimingStrategy::Measured);
        assert_eq!(TimingMode::Batched.resolve(1), TimingStrategy::Batched);
    }

    #[test]
    fn test_mode_yaml() {
        let mode: TimingMode =
            serde_yaml::from_str("kind: hybrid\nmeasured_max_segments: 25\n").unwrap();
        assert_eq!(
            mode,
            TimingMode::Hybrid {
                measured_max_segments: 25
            }
        );
        let batched: TimingMode = serde_yaml::from_str("kind: batched").unwrap();
        assert_eq!(batched, TimingMode::Batched);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("Measured".parse::<TimingStrategy>().unwrap(), TimingStrategy::Measured);
        assert!("sometimes".parse::<TimingStrategy>().is_err());
    }
}
