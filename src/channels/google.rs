//! Google Cloud Text-to-Speech Channel Implementation
//!
//! Uses the v1beta1 endpoint with SSML `<mark>` tags and time pointing, so
//! every request comes back with per-sentence native timestamps.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::audio::wav_duration;
use crate::channels::error::{ChannelError, ChannelResult};
use crate::channels::error_from_response;
use crate::channels::traits::{
    BackendOutput, BackendRequest, ChannelConfig, ChannelType, NativeTimestamp, SynthesisBackend,
};
use crate::text::strip_markup;

/// Input limit of the synthesize call, leaving room for marks
const MAX_INPUT_CHARS: usize = 4500;

/// Google Cloud TTS channel
pub struct GoogleCloudChannel {
    config: ChannelConfig,
    name: String,
    client: Client,
    timeout: Duration,
}

/// Google Cloud TTS request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisBody {
    input: SsmlInput,
    voice: VoiceSelectionParams,
    audio_config: AudioConfig,
    enable_time_pointing: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SsmlInput {
    ssml: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelectionParams {
    language_code: String,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
    speaking_rate: f32,
}

/// Google Cloud TTS response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSynthesisResponse {
    audio_content: String,
    #[serde(default)]
    timepoints: Vec<Timepoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Timepoint {
    mark_name: String,
    time_seconds: f64,
}

impl GoogleCloudChannel {
    /// Create new Google Cloud channel
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        let name = config.display_name();
        if config.api_key.is_empty() {
            return Err(ChannelError::config(&name, "Google Cloud API key is required"));
        }

        let timeout = Duration::from_secs(config.timeout.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "X-Goog-Api-Key",
                    config
                        .api_key
                        .parse()
                        .map_err(|e| ChannelError::config(&name, format!("Invalid API key: {}", e)))?,
                );
                headers.insert(
                    reqwest::header::CONTENT_TYPE,
                    reqwest::header::HeaderValue::from_static("application/json; charset=utf-8"),
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

    /// Get Google Cloud TTS API endpoint
    fn endpoint(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://texttospeech.googleapis.com/v1beta1/text:synthesize".to_string())
    }

    fn voice(&self) -> VoiceSelectionParams {
        let name = self
            .config
            .voice
            .clone()
            .unwrap_or_else(|| "en-US-Neural2-F".to_string());
        let language_code = self.config.language.clone().unwrap_or_else(|| {
            // Voice names start with their language code, e.g. en-US-Neural2-F
            name.splitn(3, '-').take(2).collect::<Vec<_>>().join("-")
        });
        VoiceSelectionParams { language_code, name }
    }
}

/// Escape text for inclusion in SSML
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build SSML with one mark before each sentence
fn build_marked_ssml(sentences: &[String]) -> String {
    let mut ssml = String::from("<speak>");
    for (index, sentence) in sentences.iter().enumerate() {
        ssml.push_str(&format!("<mark name=\"s{}\"/>", index));
        ssml.push_str(&escape_xml(strip_markup(sentence).trim()));
        ssml.push(' ');
    }
    ssml.push_str("</speak>");
    ssml
}

/// Convert sentence marks into contiguous timestamps
///
/// Returns `None` unless every sentence has exactly one mark with
/// non-decreasing times inside the audio.
fn timestamps_from_marks(
    timepoints: &[Timepoint],
    sentence_count: usize,
    total_duration: f64,
) -> Option<Vec<NativeTimestamp>> {
    let mut offsets = vec![None; sentence_count];
    for point in timepoints {
        let index: usize = point.mark_name.strip_prefix('s')?.parse().ok()?;
        let slot = offsets.get_mut(index)?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(point.time_seconds);
    }
    let offsets: Vec<f64> = offsets.into_iter().collect::<Option<Vec<_>>>()?;

    let mut timestamps = Vec::with_capacity(sentence_count);
    for (i, &offset) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(total_duration);
        if !offset.is_finite() || offset < 0.0 || end < offset || end > total_duration + 1e-6 {
            return None;
        }
        timestamps.push(NativeTimestamp {
            offset,
            duration: end - offset,
        });
    }
    Some(timestamps)
}

#[async_trait]
impl SynthesisBackend for GoogleCloudChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Google
    }

    async fn synthesize(&self, request: &BackendRequest) -> ChannelResult<BackendOutput> {
        let body = SynthesisBody {
            input: SsmlInput {
                ssml: build_marked_ssml(&request.sentences),
            },
            voice: self.voice(),
            audio_config: AudioConfig {
                audio_encoding: "LINEAR16",
                sample_rate_hertz: self.config.sample_rate.unwrap_or(24000),
                speaking_rate: self.config.speed.clamp(0.25, 4.0),
            },
            enable_time_pointing: vec!["SSML_MARK"],
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

        let result: GoogleSynthesisResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::response(&self.name, format!("Failed to parse response: {}", e)))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(result.audio_content.as_bytes())
            .map_err(|e| ChannelError::response(&self.name, format!("Invalid audio encoding: {}", e)))?;

        // LINEAR16 responses carry a WAV header
        let native_timestamps = match wav_duration(&audio) {
            Ok(total) => {
                let stamps = timestamps_from_marks(&result.timepoints, request.sentences.len(), total);
                if stamps.is_none() {
                    warn!(
                        "[{}] chunk {}: {} marks for {} sentences, dropping native timing",
                        self.name,
                        request.chunk_index,
                        result.timepoints.len(),
                        request.sentences.len()
                    );
                }
                stamps
            }
            Err(e) => {
                debug!("[{}] could not read audio duration: {}", self.name, e);
                None
            }
        };

        Ok(BackendOutput {
            audio,
            native_timestamps,
        })
    }

    fn supports_batched_timestamps(&self) -> bool {
        true
    }

    fn max_request_size(&self) -> usize {
        self.config.max_request_chars.unwrap_or(MAX_INPUT_CHARS)
    }
}
