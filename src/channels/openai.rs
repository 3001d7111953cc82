//! OpenAI TTS Channel Implementation
//!
//! Speech endpoint adapter returning WAV audio.
//! Supports: tts-1, tts-1-hd and gpt-4o-mini-tts models with the built-in voices

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::channels::error::{ChannelError, ChannelResult};
use crate::channels::traits::{
    BackendOutput, BackendRequest, ChannelConfig, ChannelType, SynthesisBackend,
};
use crate::channels::error_from_response;

/// Request limit of the speech endpoint
const MAX_INPUT_CHARS: usize = 4096;

/// OpenAI TTS channel
pub struct OpenAiChannel {
    config: ChannelConfig,
    name: String,
    client: Client,
    timeout: Duration,
}

/// OpenAI voices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiVoice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl OpenAiVoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }

    /// Parse a voice name; unknown names fall back to Alloy
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "echo" => Self::Echo,
            "fable" => Self::Fable,
            "onyx" => Self::Onyx,
            "nova" => Self::Nova,
            "shimmer" => Self::Shimmer,
            _ => Self::Alloy,
        }
    }
}

/// OpenAI TTS request body
#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// OpenAI API error envelope
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

impl OpenAiChannel {
    /// Create new OpenAI channel
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        let name = config.display_name();
        if config.api_key.is_empty() {
            return Err(ChannelError::config(&name, "OpenAI API key is required"));
        }

        let timeout = Duration::from_secs(config.timeout.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    format!("Bearer {}", config.api_key)
                        .parse()
                        .map_err(|e| ChannelError::config(&name, format!("Invalid API key: {}", e)))?,
                );
                headers.insert(
                    reqwest::header::CONTENT_TYPE,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| ChannelError::config(&name, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            name,
            client,
            timeout,
        })
    }

    /// Get OpenAI TTS API endpoint
    fn endpoint(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/audio/speech".to_string())
    }

    fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or("tts-1")
    }

    fn voice(&self) -> OpenAiVoice {
        self.config
            .voice
            .as_deref()
            .map(OpenAiVoice::from_name)
            .unwrap_or(OpenAiVoice::Alloy)
    }
}

#[async_trait]
impl SynthesisBackend for OpenAiChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Openai
    }

    async fn synthesize(&self, request: &BackendRequest) -> ChannelResult<BackendOutput> {
        let start_time = Instant::now();
        if request.text.chars().count() > self.max_request_size() {
            return Err(ChannelError::request(
                &self.name,
                format!("input exceeds {} characters", self.max_request_size()),
                None,
            ));
        }

        let body = SpeechBody {
            model: self.model(),
            input: &request.text,
            voice: self.voice().as_str(),
            response_format: "wav",
            speed: self.config.speed.clamp(0.25, 4.0),
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::from_reqwest(&self.name, &e, self.timeout))?;

        if !response.status().is_success() {
            let err = error_from_response(&self.name, response).await;
            // Surface the provider's own message when the body is an OpenAI envelope
            if let ChannelError::Request { message, status_code, .. } = &err {
                if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(message) {
                    return Err(ChannelError::request(&self.name, parsed.error.message, *status_code));
                }
            }
            return Err(err);
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| ChannelError::response(&self.name, format!("Failed to read body: {}", e)))?;

        debug!(
            "[{}] chunk {} synthesized in {}ms ({} bytes)",
            self.name,
            request.chunk_index,
            start_time.elapsed().as_millis(),
            audio.len()
        );
        Ok(BackendOutput::audio_only(audio.to_vec()))
    }

    fn max_request_size(&self) -> usize {
        self.config.max_request_chars.unwrap_or(MAX_INPUT_CHARS)
    }

    async fn health_check(&self) -> bool {
        let result = self
            .client
            .get("https://api.openai.com/v1/models")
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        result.is_ok_and(|r| r.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_from_name() {
        assert_eq!(OpenAiVoice::from_name("NOVA"), OpenAiVoice::Nova);
        assert_eq!(OpenAiVoice::from_name("unknown"), OpenAiVoice::Alloy);
    }

    #[test]
    fn test_requires_api_key() {
        let err = OpenAiChannel::new(ChannelConfig {
            channel_type: ChannelType::Openai,
            ..ChannelConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ChannelError::Configuration { .. }));
    }

    #[test]
    fn test_defaults() {
        let channel = OpenAiChannel::new(ChannelConfig {
            channel_type: ChannelType::Openai,
            api_key: "sk-test".to_string(),
            ..ChannelConfig::default()
        })
        .unwrap();
        assert_eq!(channel.name(), "openai");
        assert_eq!(channel.model(), "tts-1");
        assert_eq!(channel.max_request_size(), 4096);
        assert!(!channel.supports_batched_timestamps());
    }
}
