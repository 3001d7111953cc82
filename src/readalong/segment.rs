//! Timeline units

use serde::{Deserialize, Serialize};

/// One sentence placed on the audio timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    text: String,
    start_time: f64,
    duration: f64,
    chunk_index: usize,
    segment_index: usize,
}

impl TimedSegment {
    /// Create a timed segment
    pub fn new(
        text: impl Into<String>,
        start_time: f64,
        duration: f64,
        chunk_index: usize,
        segment_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            start_time,
            duration,
            chunk_index,
            segment_index,
        }
    }

    /// Sentence text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Start offset in seconds
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// `start_time + duration`
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Chunk the sentence was synthesized in
    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    /// Position among all sentences of the document
    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    /// Whether `t` falls in `[start, end)`
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_time && t < self.end_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let segment = TimedSegment::new("Hello.", 1.0, 0.5, 0, 0);
        assert!(segment.contains(1.0));
        assert!(segment.contains(1.49));
        assert!(!segment.contains(1.5));
        assert_eq!(segment.end_time(), 1.5);
    }

    #[test]
    fn test_json_field_names() {
        let segment = TimedSegment::new("Hi.", 0.0, 0.25, 2, 7);
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(json["text"], "Hi.");
        assert_eq!(json["start_time"], 0.0);
        assert_eq!(json["duration"], 0.25);
        assert_eq!(json["chunk_index"], 2);
        assert_eq!(json["segment_index"], 7);
    }
}
