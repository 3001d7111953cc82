//! ffmpeg/ffprobe audio assembler
//!
//! Shells out to the ffmpeg toolchain for formats hound cannot write:
//! - `ffprobe` for duration measurement
//! - the concat demuxer for gapless joining
//! - `libmp3lame` (or another codec) for delivery transcoding

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::audio::{AudioAssembler, AudioFormat};
use crate::core::error::{AudioOperation, Result, TtsError};

/// ffmpeg invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfmpegSettings {
    /// ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// ffprobe binary
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// MP3 encoder
    #[serde(default = "default_mp3_codec")]
    pub mp3_codec: String,

    /// Target bitrate for lossy formats
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Output sample rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Per-command timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Container of chunk audio handed to the assembler (the pipeline sets it from the backend)
    #[serde(default)]
    pub input_format: AudioFormat,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            mp3_codec: default_mp3_codec(),
            bitrate: default_bitrate(),
            sample_rate: default_sample_rate(),
            timeout_secs: default_timeout_secs(),
            input_format: AudioFormat::Wav,
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_mp3_codec() -> String {
    "libmp3lame".to_string()
}

fn default_bitrate() -> String {
    "128k".to_string()
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_timeout_secs() -> u64 {
    300
}

/// Assembler backed by external ffmpeg processes
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    settings: FfmpegSettings,
}

impl FfmpegAssembler {
    /// Create an assembler with the given settings
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    /// Active settings
    pub fn settings(&self) -> &FfmpegSettings {
        &self.settings
    }

    /// Arguments for the ffprobe duration query
    fn probe_args(input: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            input.display().to_string(),
        ]
    }

    /// Arguments for a concat-demuxer join
    fn concat_args(list: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.display().to_string(),
        ]
    }

    /// Arguments for re-encoding into `target`
    fn transcode_args(&self, input: &Path, output: &Path, target: AudioFormat) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-i".to_string(), input.display().to_string()];
        let (codec, lossy) = match target {
            AudioFormat::Mp3 => (self.settings.mp3_codec.as_str(), true),
            AudioFormat::Wav => ("pcm_s16le", false),
            AudioFormat::Flac => ("flac", false),
            AudioFormat::Opus => ("libopus", true),
        };
        args.push("-codec:a".to_string());
        args.push(codec.to_string());
        if lossy {
            args.push("-b:a".to_string());
            args.push(self.settings.bitrate.clone());
        }
        args.push("-ar".to_string());
        args.push(self.settings.sample_rate.to_string());
        args.push(output.display().to_string());
        args
    }

    /// Run a tool and return its stdout, with stderr folded into errors
    async fn run(&self, program: &Path, args: &[String], operation: AudioOperation) -> Result<Vec<u8>> {
        debug!("Running {} {}", program.display(), args.join(" "));
        let timeout = Duration::from_secs(self.settings.timeout_secs);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| TtsError::Timeout {
                message: format!("{} ({})", program.display(), operation),
                duration_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| {
                TtsError::audio(operation, format!("failed to start {}: {}", program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
            return Err(TtsError::audio(
                operation,
                format!("{} exited with {}: {}", program.display(), output.status, tail),
            ));
        }
        Ok(output.stdout)
    }

    fn input_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.settings.input_format.extension())
    }
}

#[async_trait]
impl AudioAssembler for FfmpegAssembler {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn intermediate_format(&self) -> AudioFormat {
        self.settings.input_format
    }

    async fn measure_duration(&self, audio: &[u8]) -> Result<f64> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(self.input_name("probe"));
        tokio::fs::write(&input, audio).await?;

        let stdout = self
            .run(&self.settings.ffprobe_path, &Self::probe_args(&input), AudioOperation::Measuring)
            .await?;
        let text = String::from_utf8_lossy(&stdout);
        text.trim().parse::<f64>().map_err(|_| {
            TtsError::audio(
                AudioOperation::Measuring,
                format!("ffprobe returned no duration: {:?}", text.trim()),
            )
        })
    }

    async fn concatenate(&self, parts: &[Vec<u8>]) -> Result<Vec<u8>> {
        if parts.is_empty() {
            return Err(TtsError::audio(
                AudioOperation::Concatenating,
                "no audio parts to concatenate",
            ));
        }
        if parts.len() == 1 {
            return Ok(parts[0].clone());
        }

        let dir = tempfile::tempdir()?;
        let mut list = String::new();
        for (index, part) in parts.iter().enumerate() {
            let path = dir.path().join(self.input_name(&format!("part_{:05}", index)));
            tokio::fs::write(&path, part).await?;
            list.push_str(&format!("file '{}'\n", path.display()));
        }
        let list_path = dir.path().join("concat.txt");
        tokio::fs::write(&list_path, list).await?;

        let output = dir.path().join(self.input_name("combined"));
        self.run(
            &self.settings.ffmpeg_path,
            &Self::concat_args(&list_path, &output),
            AudioOperation::Concatenating,
        )
        .await?;
        Ok(tokio::fs::read(&output).await?)
    }

    async fn transcode(&self, audio: &[u8], target: AudioFormat) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(self.input_name("source"));
        let output = dir.path().join(format!("output.{}", target.extension()));
        tokio::fs::write(&input, audio).await?;

        self.run(
            &self.settings.ffmpeg_path,
            &self.transcode_args(&input, &output, target),
            AudioOperation::Transcoding,
        )
        .await?;
        Ok(tokio::fs::read(&output).await?)
    }
}
