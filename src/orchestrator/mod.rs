//! Synthesis orchestration
//!
//! Turns an ordered list of chunks into an ordered list of per-chunk
//! outcomes while respecting backend limits.
//!
//! # Modules
//!
//! - `rate_limit`: Per-run call pacing with failure-aware spacing
//! - `retry`: Exponential backoff policy
//! - `outcome`: Per-chunk results and failures
//! - `scheduler`: Bounded-concurrency driver

pub mod outcome;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;

pub use outcome::{ChunkFailure, ChunkOutcome, FailureReason, SynthesisReport, SynthesisResult};
pub use rate_limit::{RateLimitState, RateLimiter};
pub use retry::RetryPolicy;
pub use scheduler::{OrchestratorConfig, SynthesisOrchestrator};
