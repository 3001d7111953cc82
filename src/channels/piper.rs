//! Piper Local TTS Channel
//!
//! Runs the `piper` binary once per request, feeding text on stdin and
//! reading the WAV it writes. Local synthesis has no quota, so the
//! recommended pacing interval is short.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::channels::error::{ChannelError, ChannelResult};
use crate::channels::traits::{
    BackendOutput, BackendRequest, ChannelConfig, ChannelType, SynthesisBackend,
};
use crate::text::strip_markup;

/// Piper local channel
pub struct PiperChannel {
    config: ChannelConfig,
    name: String,
    binary: PathBuf,
    model: PathBuf,
    timeout: Duration,
}

impl PiperChannel {
    /// Create new Piper channel
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        let name = config.display_name();
        let model = config
            .model_path
            .clone()
            .ok_or_else(|| ChannelError::config(&name, "Piper requires model_path (.onnx voice)"))?;
        let binary = config
            .binary_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("piper"));
        let timeout = Duration::from_secs(config.timeout.max(1));

        info!("Piper channel '{}' using model {}", name, model.display());
        Ok(Self {
            config,
            name,
            binary,
            model,
            timeout,
        })
    }

    /// Command-line arguments for one run
    fn args(&self, output: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            "--model".to_string(),
            self.model.display().to_string(),
            "--output_file".to_string(),
            output.display().to_string(),
        ];
        if let Some(speaker) = self.config.voice.as_deref() {
            if speaker.parse::<u32>().is_ok() {
                args.push("--speaker".to_string());
                args.push(speaker.to_string());
            }
        }
        if (self.config.speed - 1.0).abs() > f32::EPSILON && self.config.speed > 0.0 {
            // Piper's length scale is the inverse of speaking rate
            args.push("--length_scale".to_string());
            args.push(format!("{:.3}", 1.0 / self.config.speed));
        }
        args
    }
}

#[async_trait]
impl SynthesisBackend for PiperChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Piper
    }

    async fn synthesize(&self, request: &BackendRequest) -> ChannelResult<BackendOutput> {
        // Piper does not understand SSML
        let text = strip_markup(&request.text);
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(ChannelError::request(&self.name, "nothing to speak", None));
        }

        let dir = tempfile::tempdir()
            .map_err(|e| ChannelError::internal(&self.name, format!("temp dir: {}", e)))?;
        let output = dir.path().join(format!("chunk_{:05}.wav", request.chunk_index));

        let mut child = Command::new(&self.binary)
            .args(self.args(&output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ChannelError::config(&self.name, format!("cannot start {}: {}", self.binary.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| ChannelError::internal(&self.name, format!("stdin: {}", e)))?;
            // Closing stdin tells piper the input is complete
            drop(stdin);
        }

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ChannelError::timeout(&self.name, self.timeout))?
            .map_err(|e| ChannelError::internal(&self.name, e.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ChannelError::request(
                &self.name,
                format!("piper exited with {}: {}", result.status, stderr.trim()),
                None,
            ));
        }

        let audio = tokio::fs::read(&output)
            .await
            .map_err(|e| ChannelError::response(&self.name, format!("no output audio: {}", e)))?;
        debug!("[{}] chunk {} -> {} bytes", self.name, request.chunk_index, audio.len());
        Ok(BackendOutput::audio_only(audio))
    }

    fn max_request_size(&self) -> usize {
        self.config.max_request_chars.unwrap_or(10_000)
    }

    async fn health_check(&self) -> bool {
        Command::new(&self.binary)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChannelConfig {
        ChannelConfig {
            channel_type: ChannelType::Piper,
            model_path: Some(PathBuf::from("voices/en_US-lessac-medium.onnx")),
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn test_requires_model() {
        let err = PiperChannel::new(ChannelConfig {
            channel_type: ChannelType::Piper,
            ..ChannelConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ChannelError::Configuration { .. }));
    }

    #[test]
    fn test_args_with_speaker_and_speed() {
        let channel = PiperChannel::new(ChannelConfig {
            voice: Some("3".to_string()),
            speed: 2.0,
            ..config()
        })
        .unwrap();
        let args = channel.args(std::path::Path::new("out.wav"));
        assert_eq!(
            args,
            vec![
                "--model",
                "voices/en_US-lessac-medium.onnx",
                "--output_file",
                "out.wav",
                "--speaker",
                "3",
                "--length_scale",
                "0.500"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_retryable() {
        let channel = PiperChannel::new(ChannelConfig {
            binary_path: Some(PathBuf::from("/nonexistent/piper-readalong")),
            ..config()
        })
        .unwrap();
        let request = BackendRequest {
            chunk_index: 0,
            text: "Hello.".to_string(),
            sentences: vec!["Hello.".to_string()],
        };
        let err = channel.synthesize(&request).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(!channel.health_check().await);
    }
}
