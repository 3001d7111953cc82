//! Read-along pipeline
//!
//! One [`ReadAlongPipeline::process`] call narrates one document:
//!
//! 1. Split the text into sentences and group them into chunks
//! 2. Synthesize the chunks with bounded, paced, retried backend calls
//! 3. Reconcile per-chunk timing into one timeline
//! 4. Concatenate the chunk audio, measure it, transcode it and store it
//! 5. Validate the timeline against the audio and store the timing sidecar
//!
//! # Example
//!
//! ```rust,ignore
//! use sdkwork_readalong::{PipelineConfig, ReadAlongPipeline};
//!
//! let config = PipelineConfig::load("readalong.yaml")?;
//! let pipeline = ReadAlongPipeline::from_config(&config)?;
//! let outcome = pipeline
//!     .process(&text, &config.chunking, config.timing.mode)
//!     .await?;
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::{AudioAssembler, AudioFormat, FfmpegAssembler, WavAssembler};
use crate::channels::{create_backend, SynthesisBackend};
use crate::config::{AssemblerKind, PipelineConfig};
use crate::core::error::{AudioOperation, Result, TtsError};
use crate::orchestrator::{OrchestratorConfig, SynthesisOrchestrator};
use crate::readalong::{
    PartialFailure, ProcessOutcome, ResultBuilder, TimedAudioResult, DEFAULT_COVERAGE_TOLERANCE,
};
use crate::text::{chunk_individually, Chunk, ChunkingConfig, TextSegment};
use crate::timing::{TimingEngine, TimingMode, TimingStrategy};

/// Where finished artifacts go
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist delivered audio, returning its reference
    async fn store_audio(&self, request_id: &str, format: AudioFormat, audio: &[u8]) -> Result<String>;

    /// Persist the timing sidecar, returning its reference
    async fn store_timing(&self, result: &TimedAudioResult) -> Result<String>;
}

/// Writes `{request_id}.{ext}` and `{request_id}_timing.json` into a directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Store rooted at `root` (created on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the audio artifact for a request
    pub fn audio_path(&self, request_id: &str, format: AudioFormat) -> PathBuf {
        self.root.join(format!("{}.{}", request_id, format.extension()))
    }

    /// Path of the timing sidecar for a request
    pub fn timing_path(&self, request_id: &str) -> PathBuf {
        self.root.join(format!("{}_timing.json", request_id))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let io_err = |e: std::io::Error| TtsError::Io {
            message: e.to_string(),
            path: Some(path.to_path_buf()),
        };
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        tokio::fs::write(path, bytes).await.map_err(io_err)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for DirectoryStore {
    async fn store_audio(&self, request_id: &str, format: AudioFormat, audio: &[u8]) -> Result<String> {
        let path = self.audio_path(request_id, format);
        self.write(&path, audio).await?;
        Ok(path.display().to_string())
    }

    async fn store_timing(&self, result: &TimedAudioResult) -> Result<String> {
        let path = self.timing_path(result.request_id());
        self.write(&path, result.to_json()?.as_bytes()).await?;
        Ok(path.display().to_string())
    }
}

/// Per-pipeline delivery settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Backend call scheduling
    pub orchestrator: OrchestratorConfig,
    /// Delivered audio format
    pub output_format: AudioFormat,
    /// Allowed gap between timeline end and audio length (seconds)
    pub coverage_tolerance: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            output_format: AudioFormat::Wav,
            coverage_tolerance: DEFAULT_COVERAGE_TOLERANCE,
        }
    }
}

/// Text in, narrated audio plus sentence timeline out
pub struct ReadAlongPipeline {
    backend: Arc<dyn SynthesisBackend>,
    assembler: Arc<dyn AudioAssembler>,
    store: Arc<dyn ArtifactStore>,
    orchestrator: SynthesisOrchestrator,
    options: PipelineOptions,
}

impl ReadAlongPipeline {
    /// Assemble a pipeline from its collaborators
    ///
    /// Fails when the assembler cannot read the backend's audio container.
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        assembler: Arc<dyn AudioAssembler>,
        store: Arc<dyn ArtifactStore>,
        options: PipelineOptions,
    ) -> Result<Self> {
        if backend.output_format() != assembler.intermediate_format() {
            return Err(TtsError::config(format!(
                "backend '{}' returns {} audio but assembler '{}' expects {}",
                backend.name(),
                backend.output_format(),
                assembler.name(),
                assembler.intermediate_format()
            )));
        }
        let orchestrator = SynthesisOrchestrator::new(options.orchestrator)?;
        Ok(Self {
            backend,
            assembler,
            store,
            orchestrator,
            options,
        })
    }

    /// Build the configured backend, assembler and directory store
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let backend = create_backend(&config.channel).map_err(|e| TtsError::Config {
            message: e.to_string(),
            path: None,
        })?;
        let assembler: Arc<dyn AudioAssembler> = match config.audio.assembler {
            AssemblerKind::Wav => Arc::new(WavAssembler::new()),
            AssemblerKind::Ffmpeg => {
                let mut settings = config.audio.ffmpeg.clone();
                settings.input_format = backend.output_format();
                Arc::new(FfmpegAssembler::new(settings))
            }
        };
        let store = Arc::new(DirectoryStore::new(&config.output_dir));
        let options = PipelineOptions {
            orchestrator: config
                .synthesis
                .orchestrator(backend.recommended_min_interval()),
            output_format: config.audio.output_format,
            coverage_tolerance: config.coverage_tolerance(),
        };

        Self::new(backend, assembler, store, options)
    }

    /// Active backend
    pub fn backend(&self) -> &dyn SynthesisBackend {
        self.backend.as_ref()
    }

    /// Delivery settings
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Split and group text exactly as `process` would, without synthesizing
    pub fn plan(
        &self,
        cleaned_text: &str,
        chunking: &ChunkingConfig,
        mode: TimingMode,
    ) -> Result<(TimingStrategy, Vec<TextSegment>, Vec<Chunk>)> {
        chunking.validate()?;
        if cleaned_text.trim().is_empty() {
            return Err(TtsError::validation("text", "text is empty"));
        }

        let segments = chunking.segmenter().segment(cleaned_text);
        if segments.is_empty() {
            return Err(TtsError::validation("text", "text contains no sentences"));
        }

        let strategy = mode.resolve(segments.len());
        let limit = self.backend.max_request_size();
        let chunks = match strategy {
            TimingStrategy::Measured => chunk_individually(&segments),
            TimingStrategy::Batched => {
                let clamped = chunking.clamped_to(limit);
                if clamped.max_size != chunking.max_size {
                    warn!(
                        "Chunk max size lowered from {} to {} for '{}'",
                        chunking.max_size,
                        clamped.max_size,
                        self.backend.name()
                    );
                }
                chunking.chunk_for_backend(&segments, limit)?
            }
        };

        for chunk in chunks.iter().filter(|c| limit > 0 && c.request_len() > limit) {
            warn!(
                "Chunk {} is a single sentence of {} chars, above the {} char limit of '{}'",
                chunk.index(),
                chunk.request_len(),
                limit,
                self.backend.name()
            );
        }

        Ok((strategy, segments, chunks))
    }

    /// Narrate `cleaned_text`
    ///
    /// Returns [`ProcessOutcome::Partial`] when any chunk fails; its timed
    /// part covers only the chunks that succeeded.
    pub async fn process(
        &self,
        cleaned_text: &str,
        chunking: &ChunkingConfig,
        mode: TimingMode,
    ) -> Result<ProcessOutcome> {
        let (strategy, segments, chunks) = self.plan(cleaned_text, chunking, mode)?;
        let request_id = Uuid::new_v4().to_string();
        info!(
            "Request {}: {} sentences in {} chunks ({} timing via '{}')",
            request_id,
            segments.len(),
            chunks.len(),
            strategy,
            self.backend.name()
        );

        let report = self.orchestrator.synthesize(&chunks, self.backend.as_ref()).await;

        let engine = TimingEngine::new(strategy, self.assembler.as_ref())
            .with_native_timestamps(self.backend.supports_batched_timestamps());
        let reconciliation = engine.reconcile(&chunks, &report.outcomes).await?;

        if reconciliation.chunk_durations.is_empty() {
            warn!("Request {}: no chunk produced usable audio", request_id);
            return Ok(ProcessOutcome::Partial(PartialFailure {
                partial: None,
                failed_chunks: reconciliation.failures,
            }));
        }

        let included = reconciliation.included_chunks();
        let parts: Vec<Vec<u8>> = report
            .outcomes
            .into_iter()
            .filter_map(|outcome| outcome.ok())
            .filter(|result| included.binary_search(&result.chunk_index).is_ok())
            .map(|result| result.audio)
            .collect();

        let combined = self.assembler.concatenate(&parts).await?;
        let total_duration = self.assembler.measure_duration(&combined).await?;
        debug!(
            "Request {}: combined audio {:.3}s, timeline ends at {:.3}s",
            request_id,
            total_duration,
            reconciliation.timeline_end()
        );

        let format = self.options.output_format;
        let delivered = if format == self.assembler.intermediate_format() {
            combined
        } else {
            self.assembler.transcode(&combined, format).await?
        };
        if delivered.is_empty() {
            return Err(TtsError::audio(AudioOperation::Transcoding, "delivered audio is empty"));
        }

        let builder = ResultBuilder::new(self.options.coverage_tolerance);
        builder.validate(&reconciliation.segments, total_duration)?;

        let audio_reference = self.store.store_audio(&request_id, format, &delivered).await?;
        let result = builder.build(
            request_id,
            audio_reference,
            format,
            reconciliation.segments,
            total_duration,
        )?;
        self.store.store_timing(&result).await?;

        if reconciliation.failures.is_empty() {
            info!(
                "Request {} complete: {:.2}s of audio, {} segments",
                result.request_id(),
                result.total_duration(),
                result.segments().len()
            );
            Ok(ProcessOutcome::Complete(result))
        } else {
            warn!(
                "Request {} partial: {} of {} chunks failed",
                result.request_id(),
                reconciliation.failures.len(),
                chunks.len()
            );
            Ok(ProcessOutcome::Partial(PartialFailure {
                partial: Some(result),
                failed_chunks: reconciliation.failures,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readalong::ResultBuilder;
    use crate::readalong::TimedSegment;

    #[test]
    fn test_from_config_reads_backend_audio_with_ffmpeg() {
        let mut config = PipelineConfig::default();
        config.channel.model_path = Some(PathBuf::from("voice.onnx"));
        config.audio.assembler = AssemblerKind::Ffmpeg;
        config.audio.output_format = AudioFormat::Mp3;
        config.audio.ffmpeg.input_format = AudioFormat::Mp3;

        let pipeline = ReadAlongPipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.assembler.intermediate_format(), AudioFormat::Wav);
        assert_eq!(pipeline.options().output_format, AudioFormat::Mp3);
    }

    #[tokio::test]
    async fn test_directory_store_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("out"));
        let reference = store.store_audio("abc", AudioFormat::Mp3, b"ID3").await.unwrap();
        assert!(reference.ends_with("abc.mp3"));
        assert_eq!(std::fs::read(store.audio_path("abc", AudioFormat::Mp3)).unwrap(), b"ID3");

        let result = ResultBuilder::default()
            .build(
                "abc",
                reference,
                AudioFormat::Mp3,
                vec![TimedSegment::new("Hi.", 0.0, 1.0, 0, 0)],
                1.0,
            )
            .unwrap();
        store.store_timing(&result).await.unwrap();
        let json = std::fs::read_to_string(dir.path().join("out/abc_timing.json")).unwrap();
        assert!(json.contains("\"segments\""));
    }
}
