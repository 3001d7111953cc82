//! Timing reconciliation
//!
//! Two strategies share one output contract:
//!
//! - **Batched**: multi-sentence chunks; engine-reported sentence offsets
//!   when usable, otherwise the measured chunk duration split by word count
//! - **Measured**: one sentence per request, each timed by its own audio
//!
//! [`TimingMode::Hybrid`] picks between them by document length.

pub mod distribution;
pub mod engine;
pub mod mode;

pub use distribution::distribute_ms;
pub use engine::{native_spans, ChunkDuration, Reconciliation, TimingEngine};
pub use mode::{TimingMode, TimingStrategy};
