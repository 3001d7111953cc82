//! Synthesis Backend Traits
//!
//! Defines the port every TTS provider implements for the pipeline

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::AudioFormat;
use crate::channels::error::ChannelResult;
use crate::text::Chunk;

/// Backend channel type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Google Gemini speech generation
    #[default]
    Gemini,
    /// Google Cloud Text-to-Speech
    Google,
    /// OpenAI speech endpoint
    Openai,
    /// Local Piper binary
    Piper,
}

impl ChannelType {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Google => "google",
            Self::Openai => "openai",
            Self::Piper => "piper",
        }
    }

    /// Minimum spacing between calls that keeps the provider's quota happy
    pub fn recommended_min_interval(&self) -> Duration {
        match self {
            Self::Gemini => Duration::from_millis(2000),
            Self::Openai => Duration::from_millis(1000),
            Self::Google => Duration::from_millis(500),
            Self::Piper => Duration::from_millis(100),
        }
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "google" | "gcp" => Ok(Self::Google),
            "openai" => Ok(Self::Openai),
            "piper" => Ok(Self::Piper),
            other => Err(format!("unknown channel type: {}", other)),
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name (used in logs and errors)
    #[serde(default)]
    pub name: String,
    /// Channel type
    #[serde(rename = "type", default)]
    pub channel_type: ChannelType,
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// Base URL (if custom)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model name
    #[serde(default)]
    pub model: Option<String>,
    /// Voice name or speaker id
    #[serde(default)]
    pub voice: Option<String>,
    /// Language code
    #[serde(default)]
    pub language: Option<String>,
    /// Output sample rate requested from the provider
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Path to a local engine binary
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
    /// Path to a local voice model
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Speaking rate multiplier
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Override of the per-request size limit (characters)
    #[serde(default)]
    pub max_request_chars: Option<usize>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            channel_type: ChannelType::default(),
            api_key: String::new(),
            base_url: None,
            model: None,
            voice: None,
            language: None,
            sample_rate: None,
            binary_path: None,
            model_path: None,
            speed: default_speed(),
            timeout: default_timeout(),
            max_request_chars: None,
        }
    }
}

impl ChannelConfig {
    /// Display name, falling back to the channel type
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.channel_type.as_str().to_string()
        } else {
            self.name.clone()
        }
    }
}

fn default_speed() -> f32 {
    1.0
}

fn default_timeout() -> u64 {
    60
}

/// One synthesis call: a chunk's text plus its sentence boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    /// Chunk position in the document
    pub chunk_index: usize,
    /// Full request text
    pub text: String,
    /// Member sentences, in order
    pub sentences: Vec<String>,
}

impl BackendRequest {
    /// Build the request for a chunk
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            chunk_index: chunk.index(),
            text: chunk.text(),
            sentences: chunk.sentence_texts(),
        }
    }
}

/// Engine-reported sentence timing, relative to the start of the chunk audio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NativeTimestamp {
    /// Offset in seconds
    pub offset: f64,
    /// Duration in seconds
    pub duration: f64,
}

/// What a backend returns for one request
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOutput {
    /// Encoded audio in the backend's output format
    pub audio: Vec<u8>,
    /// One entry per request sentence, when the engine reports timing
    pub native_timestamps: Option<Vec<NativeTimestamp>>,
}

impl BackendOutput {
    /// Audio without timing information
    pub fn audio_only(audio: Vec<u8>) -> Self {
        Self {
            audio,
            native_timestamps: None,
        }
    }
}

/// Synthesis backend trait
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Get channel name
    fn name(&self) -> &str;

    /// Get channel type
    fn channel_type(&self) -> ChannelType;

    /// Synthesize one request
    async fn synthesize(&self, request: &BackendRequest) -> ChannelResult<BackendOutput>;

    /// Whether native timestamps for multi-sentence requests can be trusted
    fn supports_batched_timestamps(&self) -> bool {
        false
    }

    /// Largest request the backend accepts, in characters
    fn max_request_size(&self) -> usize;

    /// Container of the returned audio
    fn output_format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    /// Default pacing interval for this backend
    fn recommended_min_interval(&self) -> Duration {
        self.channel_type().recommended_min_interval()
    }

    /// Check if channel is available
    async fn health_check(&self) -> bool {
        true
    }
}
