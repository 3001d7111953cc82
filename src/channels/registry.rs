//! Channel factory
//!
//! Builds the configured synthesis backend

use std::sync::Arc;
use tracing::info;

use crate::channels::error::ChannelResult;
use crate::channels::traits::{ChannelConfig, ChannelType, SynthesisBackend};
use crate::channels::{GeminiChannel, GoogleCloudChannel, OpenAiChannel, PiperChannel};

/// Create a backend for a channel configuration
pub fn create_backend(config: &ChannelConfig) -> ChannelResult<Arc<dyn SynthesisBackend>> {
    let backend: Arc<dyn SynthesisBackend> = match config.channel_type {
        ChannelType::Gemini => Arc::new(GeminiChannel::new(config.clone())?),
        ChannelType::Google => Arc::new(GoogleCloudChannel::new(config.clone())?),
        ChannelType::Openai => Arc::new(OpenAiChannel::new(config.clone())?),
        ChannelType::Piper => Arc::new(PiperChannel::new(config.clone())?),
    };
    info!(
        "Created {} channel '{}' (max request {} chars)",
        config.channel_type.as_str(),
        backend.name(),
        backend.max_request_size()
    );
    Ok(backend)
}
