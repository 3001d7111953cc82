//! Pipeline configuration
//!
//! YAML file with per-section defaults, optionally overridden from the
//! environment. Everything is validated up front so misconfiguration fails
//! before any backend call is made.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{AudioFormat, FfmpegSettings};
use crate::channels::{ChannelConfig, ChannelType};
use crate::core::error::{Result, TtsError};
use crate::orchestrator::{OrchestratorConfig, RetryPolicy};
use crate::readalong::DEFAULT_COVERAGE_TOLERANCE;
use crate::text::ChunkingConfig;
use crate::timing::TimingMode;

/// Upper bound for concurrent backend calls
pub const MAX_CONCURRENCY_LIMIT: usize = 20;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sentence grouping
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Backend call scheduling
    #[serde(default)]
    pub synthesis: SynthesisSettings,

    /// Timing strategy
    #[serde(default)]
    pub timing: TimingSettings,

    /// Audio assembly and delivery
    #[serde(default)]
    pub audio: AudioSettings,

    /// Synthesis backend
    #[serde(default = "default_channel")]
    pub channel: ChannelConfig,

    /// Where artifacts are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    /// Calls in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Spacing between call starts; the backend's recommendation when unset
    #[serde(default)]
    pub min_interval_ms: Option<u64>,

    /// Per-call deadline (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            min_interval_ms: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl SynthesisSettings {
    /// Orchestrator settings, using `fallback_interval` when no interval is set
    pub fn orchestrator(&self, fallback_interval: Duration) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrency: self.max_concurrency,
            min_interval: self
                .min_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback_interval),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.base_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
            },
        }
    }
}

/// Timing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Strategy selection
    #[serde(default)]
    pub mode: TimingMode,

    /// Allowed gap between timeline end and audio length (seconds)
    #[serde(default = "default_coverage_tolerance")]
    pub coverage_tolerance_secs: f64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            mode: TimingMode::default(),
            coverage_tolerance_secs: default_coverage_tolerance(),
        }
    }
}

/// Which audio assembler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblerKind {
    /// In-process WAV handling
    #[default]
    Wav,
    /// External ffmpeg/ffprobe
    Ffmpeg,
}

/// Audio settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Assembler implementation
    #[serde(default)]
    pub assembler: AssemblerKind,

    /// Delivered format
    #[serde(default)]
    pub output_format: AudioFormat,

    /// ffmpeg settings (used by the ffmpeg assembler)
    #[serde(default)]
    pub ffmpeg: FfmpegSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            synthesis: SynthesisSettings::default(),
            timing: TimingSettings::default(),
            audio: AudioSettings::default(),
            channel: default_channel(),
            output_dir: default_output_dir(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_channel() -> ChannelConfig {
    ChannelConfig {
        channel_type: ChannelType::Piper,
        ..ChannelConfig::default()
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("audio_outputs")
}

fn default_max_concurrency() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_coverage_tolerance() -> f64 {
    DEFAULT_COVERAGE_TOLERANCE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PipelineConfig {
    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TtsError::Config {
            message: format!("Failed to read config file: {}", e),
            path: Some(path.to_path_buf()),
        })?;
        serde_yaml::from_str(&content).map_err(|e| TtsError::Config {
            message: format!("Failed to parse config file: {}", e),
            path: Some(path.to_path_buf()),
        })
    }

    /// Save to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).map_err(|e| TtsError::Config {
            message: format!("Failed to serialize config: {}", e),
            path: Some(path.to_path_buf()),
        })?;
        std::fs::write(path, content).map_err(|e| TtsError::Io {
            message: e.to_string(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };

        if let Some(engine) = env.string("TTS_ENGINE") {
            self.channel.channel_type = engine
                .parse()
                .map_err(|e: String| TtsError::config(format!("Invalid TTS_ENGINE: {}", e)))?;
        }
        if let Some(n) = env.int("MAX_CONCURRENT_TTS_REQUESTS", 1, MAX_CONCURRENCY_LIMIT as u64)? {
            self.synthesis.max_concurrency = n as usize;
        }
        if let Some(n) = env.int("AUDIO_TARGET_CHUNK_SIZE", 500, 10_000)? {
            self.chunking.target_size = n as usize;
        }
        if let Some(n) = env.int("AUDIO_MAX_CHUNK_SIZE", 1000, 20_000)? {
            self.chunking.max_size = n as usize;
        }
        if let Some(n) = env.int("TTS_TIMEOUT_SECONDS", 10, 300)? {
            self.synthesis.request_timeout_secs = n;
            self.channel.timeout = n;
        }
        if let Some(n) = env.int("READALONG_MIN_INTERVAL_MS", 0, 60_000)? {
            self.synthesis.min_interval_ms = Some(n);
        }
        if let Some(mode) = env.string("READALONG_TIMING_MODE") {
            self.timing.mode = parse_timing_mode(&mode, &self.timing.mode)?;
        }
        if let Some(dir) = env.string("AUDIO_FOLDER") {
            self.output_dir = PathBuf::from(dir);
        }

        if let Some(bitrate) = env.string("AUDIO_BITRATE") {
            self.audio.ffmpeg.bitrate = bitrate;
        }
        if let Some(rate) = env.int("AUDIO_SAMPLE_RATE", 8000, 48_000)? {
            self.audio.ffmpeg.sample_rate = rate as u32;
        }
        if let Some(codec) = env.string("MP3_CODEC") {
            self.audio.ffmpeg.mp3_codec = codec;
        }
        if let Some(n) = env.int("FFMPEG_TIMEOUT_SECONDS", 30, 600)? {
            self.audio.ffmpeg.timeout_secs = n;
        }

        match self.channel.channel_type {
            ChannelType::Gemini => {
                if let Some(key) = env.string("GOOGLE_AI_API_KEY") {
                    self.channel.api_key = key;
                }
                if let Some(model) = env.string("GEMINI_MODEL_NAME") {
                    self.channel.model = Some(model);
                }
                if let Some(voice) = env.string("GEMINI_VOICE_NAME") {
                    self.channel.voice = Some(voice);
                }
                if let Some(secs) = env.float("GEMINI_MIN_REQUEST_INTERVAL", 0.1, 10.0)? {
                    self.synthesis.min_interval_ms = Some((secs * 1000.0).round() as u64);
                }
                if env.bool("GEMINI_USE_MEASUREMENT_MODE") == Some(true) {
                    self.timing.mode = TimingMode::Measured;
                }
            }
            ChannelType::Google => {
                if let Some(key) = env.string("GOOGLE_CLOUD_API_KEY") {
                    self.channel.api_key = key;
                }
                if let Some(voice) = env.string("GOOGLE_TTS_VOICE") {
                    self.channel.voice = Some(voice);
                }
            }
            ChannelType::Openai => {
                if let Some(key) = env.string("OPENAI_API_KEY") {
                    self.channel.api_key = key;
                }
                if let Some(voice) = env.string("OPENAI_TTS_VOICE") {
                    self.channel.voice = Some(voice);
                }
            }
            ChannelType::Piper => {
                if let Some(name) = env.string("PIPER_MODEL_NAME") {
                    let dir = env
                        .string("PIPER_MODELS_DIR")
                        .unwrap_or_else(|| "piper_models".to_string());
                    self.channel.model_path = Some(Path::new(&dir).join(format!("{}.onnx", name)));
                }
                if let Some(scale) = env.float("PIPER_LENGTH_SCALE", 0.5, 2.0)? {
                    self.channel.speed = (1.0 / scale) as f32;
                }
            }
        }

        Ok(())
    }

    /// Fail fast on unusable settings
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        let synthesis = &self.synthesis;
        if synthesis.max_concurrency == 0 || synthesis.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(TtsError::config(format!(
                "synthesis.max_concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY_LIMIT, synthesis.max_concurrency
            )));
        }
        if synthesis.request_timeout_secs == 0 {
            return Err(TtsError::config("synthesis.request_timeout_secs must be positive"));
        }
        if synthesis.base_delay_ms > synthesis.max_delay_ms {
            return Err(TtsError::config(format!(
                "synthesis.base_delay_ms {} exceeds max_delay_ms {}",
                synthesis.base_delay_ms, synthesis.max_delay_ms
            )));
        }

        let tolerance = self.timing.coverage_tolerance_secs;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(TtsError::config("timing.coverage_tolerance_secs must be non-negative"));
        }

        if self.audio.assembler == AssemblerKind::Wav && self.audio.output_format != AudioFormat::Wav {
            return Err(TtsError::config(format!(
                "the wav assembler cannot deliver {}; use the ffmpeg assembler",
                self.audio.output_format
            )));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(TtsError::config("output_dir cannot be empty"));
        }

        match self.channel.channel_type {
            ChannelType::Gemini | ChannelType::Google | ChannelType::Openai => {
                let key = self.channel.api_key.trim();
                if key.is_empty() || key.starts_with("YOUR_") {
                    return Err(TtsError::config(format!(
                        "channel.api_key is required for the {} channel",
                        self.channel.channel_type.as_str()
                    )));
                }
            }
            ChannelType::Piper => {
                if self.channel.model_path.is_none() {
                    return Err(TtsError::config(
                        "channel.model_path is required for the piper channel",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Coverage tolerance in seconds
    pub fn coverage_tolerance(&self) -> f64 {
        self.timing.coverage_tolerance_secs
    }
}

fn parse_timing_mode(value: &str, current: &TimingMode) -> Result<TimingMode> {
    match value.trim().to_lowercase().as_str() {
        "batched" => Ok(TimingMode::Batched),
        "measured" => Ok(TimingMode::Measured),
        "hybrid" => Ok(match current {
            TimingMode::Hybrid { .. } => *current,
            _ => TimingMode::Hybrid {
                measured_max_segments: 20,
            },
        }),
        other => Err(TtsError::config(format!(
            "READALONG_TIMING_MODE must be batched, measured or hybrid, got: {}",
            other
        ))),
    }
}

/// Typed, range-checked access to override variables
struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.string(key)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
    }

    fn int(&self, key: &str, min: u64, max: u64) -> Result<Option<u64>> {
        let Some(raw) = self.string(key) else {
            return Ok(None);
        };
        let value: u64 = raw.parse().map_err(|_| {
            TtsError::config(format!("{} must be a valid integer, got: {}", key, raw))
        })?;
        if value < min || value > max {
            return Err(TtsError::config(format!(
                "{} must be between {} and {}, got: {}",
                key, min, max, value
            )));
        }
        Ok(Some(value))
    }

    fn float(&self, key: &str, min: f64, max: f64) -> Result<Option<f64>> {
        let Some(raw) = self.string(key) else {
            return Ok(None);
        };
        let value: f64 = raw.parse().map_err(|_| {
            TtsError::config(format!("{} must be a valid number, got: {}", key, raw))
        })?;
        if !(min..=max).contains(&value) {
            return Err(TtsError::config(format!(
                "{} must be between {} and {}, got: {}",
                key, min, max, value
            )));
        }
        Ok(Some(value))
    }
}
