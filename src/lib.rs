//! # SDKWork Read-Along - Narrated Audio with Sentence Timing
//!
//! Turns long-form cleaned text into one continuous narrated audio file plus
//! a sentence-level timeline for read-along playback.
//!
//! ## Features
//!
//! - **Sentence-aware chunking**: Character or word budgets, never splitting a sentence
//! - **Concurrent synthesis**: Bounded concurrency, per-document pacing and exponential backoff
//! - **Timing reconciliation**: Engine timestamps or measured audio, merged into one gap-free timeline
//! - **Multiple backends**: Gemini, Google Cloud TTS, OpenAI and local Piper
//! - **Partial results**: Failed chunks are reported, never hidden in a shorter timeline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sdkwork_readalong::{PipelineConfig, ProcessOutcome, ReadAlongPipeline};
//!
//! let mut config = PipelineConfig::load("readalong.yaml")?;
//! config.apply_env_overrides()?;
//!
//! let pipeline = ReadAlongPipeline::from_config(&config)?;
//! match pipeline.process(&text, &config.chunking, config.timing.mode).await? {
//!     ProcessOutcome::Complete(result) => println!("{}", result.to_json()?),
//!     ProcessOutcome::Partial(partial) => eprintln!("failed chunks: {:?}", partial.failed_indices()),
//! }
//! ```
//!
//! ## Supported Backends
//!
//! | Backend | Timestamps | Default pacing |
//! |---------|------------|----------------|
//! | Gemini | Measured | 2000ms |
//! | Google Cloud TTS | Native (SSML marks) | 500ms |
//! | OpenAI | Measured | 1000ms |
//! | Piper (local) | Measured | 100ms |

pub mod audio;
pub mod channels;
pub mod config;
pub mod core;
pub mod orchestrator;
pub mod pipeline;
pub mod readalong;
pub mod text;
pub mod timing;

// Core re-exports
pub use core::error::{Result, ResultExt, TtsError};

// Pipeline re-exports
pub use config::PipelineConfig;
pub use pipeline::{ArtifactStore, DirectoryStore, PipelineOptions, ReadAlongPipeline};

// Text re-exports
pub use text::{Chunk, ChunkingConfig, ChunkingStrategy, SentenceSegmenter, TextSegment};

// Synthesis re-exports
pub use channels::{BackendOutput, BackendRequest, ChannelConfig, ChannelError, ChannelType, SynthesisBackend};
pub use orchestrator::{OrchestratorConfig, RetryPolicy, SynthesisOrchestrator};

// Timing and result re-exports
pub use audio::{AudioAssembler, AudioFormat};
pub use readalong::{PartialFailure, ProcessOutcome, ResultBuilder, TimedAudioResult, TimedSegment};
pub use timing::{TimingEngine, TimingMode, TimingStrategy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework name
pub const FRAMEWORK_NAME: &str = "SDKWork-ReadAlong";
