//! Configuration for the read-along pipeline

pub mod pipeline_config;

pub use pipeline_config::{
    AssemblerKind, AudioSettings, LoggingSettings, PipelineConfig, SynthesisSettings,
    TimingSettings, MAX_CONCURRENCY_LIMIT,
};
