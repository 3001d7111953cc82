//! Gemini TTS Channel Implementation
//!
//! Calls `generateContent` with the audio response modality. The model
//! answers with base64 16-bit PCM, which is wrapped into WAV here.
//! Gemini reports no timing, so the pipeline measures audio instead.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::audio::pcm16_to_wav;
use crate::channels::error::{ChannelError, ChannelResult};
use crate::channels::error_from_response;
use crate::channels::traits::{
    BackendOutput, BackendRequest, ChannelConfig, ChannelType, SynthesisBackend,
};
use crate::text::strip_markup;

/// Default speech model
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Default prebuilt voice
const DEFAULT_VOICE: &str = "Kore";

/// Sample rate assumed when the MIME type does not state one
const DEFAULT_PCM_RATE: u32 = 24000;

/// Prebuilt voices
pub const GEMINI_VOICES: &[&str] = &["Kore", "Puck", "Charon", "Fenrir", "Aoede", "Leda"];

/// Gemini TTS channel
pub struct GeminiChannel {
    config: ChannelConfig,
    name: String,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoice<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoice<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl GeminiChannel {
    /// Create new Gemini channel
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        let name = config.display_name();
        if config.api_key.is_empty() {
            return Err(ChannelError::config(&name, "Gemini API key is required"));
        }
        if let Some(voice) = config.voice.as_deref() {
            if !GEMINI_VOICES.iter().any(|v| v.eq_ignore_ascii_case(voice)) {
                warn!("[{}] voice '{}' is not a known prebuilt voice", name, voice);
            }
        }

        let timeout = Duration::from_secs(config.timeout.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "x-goog-api-key",
                    config
                        .api_key
                        .parse()
                        .map_err(|e| ChannelError::config(&name, format!("Invalid API key: {}", e)))?,
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

    fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    fn voice(&self) -> &str {
        self.config.voice.as_deref().unwrap_or(DEFAULT_VOICE)
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
        format!("{}/models/{}:generateContent", base.trim_end_matches('/'), self.model())
    }
}

/// Sample rate from a MIME type such as `audio/L16;codec=pcm;rate=24000`
fn pcm_rate(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
        .unwrap_or(DEFAULT_PCM_RATE)
}

#[async_trait]
impl SynthesisBackend for GeminiChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Gemini
    }

    async fn synthesize(&self, request: &BackendRequest) -> ChannelResult<BackendOutput> {
        let text = strip_markup(&request.text);
        let body = GenerateBody {
            contents: vec![Content {
                parts: vec![TextPart { text: text.trim() }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoice {
                            voice_name: self.voice(),
                        },
                    },
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::from_reqwest(&self.name, &e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(&self.name, response).await);
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::response(&self.name, format!("Failed to parse response: {}", e)))?;

        let inline = result
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
            // An empty candidate list is how quota throttling sometimes shows up
            .ok_or_else(|| ChannelError::unavailable(&self.name, "response contained no audio"))?;

        let pcm = base64::engine::general_purpose::STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| ChannelError::response(&self.name, format!("Invalid audio encoding: {}", e)))?;
        if pcm.is_empty() {
            return Err(ChannelError::unavailable(&self.name, "response audio was empty"));
        }

        let wav = pcm16_to_wav(&pcm, pcm_rate(&inline.mime_type), 1)
            .map_err(|e| ChannelError::response(&self.name, e.to_string()))?;
        Ok(BackendOutput::audio_only(wav))
    }

    fn max_request_size(&self) -> usize {
        self.config.max_request_chars.unwrap_or(5000)
    }
}
