//! Read-along output contract
//!
//! - `segment`: [`TimedSegment`], one sentence on the timeline
//! - `result`: [`TimedAudioResult`], [`PartialFailure`] and [`ProcessOutcome`]
//! - `builder`: [`ResultBuilder`], the last line of validation

pub mod builder;
pub mod result;
pub mod segment;

pub use builder::{ResultBuilder, DEFAULT_COVERAGE_TOLERANCE};
pub use result::{PartialFailure, ProcessOutcome, TimedAudioResult};
pub use segment::TimedSegment;
