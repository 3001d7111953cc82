//! Integration tests for the read-along pipeline
//!
//! Runs text through segmentation, chunking, scheduling, timing
//! reconciliation, assembly and validation with a deterministic backend.

mod common;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use common::{Fault, MemoryStore, ScriptedBackend};
use sdkwork_readalong::audio::{wav_duration, AudioAssembler, AudioFormat, WavAssembler};
use sdkwork_readalong::channels::ChannelError;
use sdkwork_readalong::orchestrator::FailureReason;
use sdkwork_readalong::pipeline::{DirectoryStore, PipelineOptions};
use sdkwork_readalong::{
    ChunkingConfig, ChunkingStrategy, OrchestratorConfig, ProcessOutcome, ReadAlongPipeline,
    Result, RetryPolicy, SentenceSegmenter, TimingMode, TtsError,
};

fn options(max_concurrency: usize) -> PipelineOptions {
    PipelineOptions {
        orchestrator: OrchestratorConfig {
            max_concurrency,
            min_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
            },
        },
        output_format: AudioFormat::Wav,
        coverage_tolerance: 0.05,
    }
}

fn pipeline(backend: Arc<ScriptedBackend>, store: Arc<MemoryStore>, max_concurrency: usize) -> ReadAlongPipeline {
    ReadAlongPipeline::new(backend, Arc::new(WavAssembler::new()), store, options(max_concurrency)).unwrap()
}

fn chunking(target: usize, max: usize) -> ChunkingConfig {
    ChunkingConfig {
        target_size: target,
        max_size: max,
        ..ChunkingConfig::default()
    }
}

fn times(outcome: &ProcessOutcome) -> Vec<(f64, f64)> {
    outcome
        .result()
        .unwrap()
        .segments()
        .iter()
        .map(|s| (s.start_time(), s.duration()))
        .collect()
}

/// Abbreviations never end a sentence
#[test]
fn test_abbreviation_aware_segmentation() {
    let segmenter = SentenceSegmenter::new(["Dr."]);
    let segments = segmenter.segment("Dr. Smith won. It was close.");
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].text(), "Dr. Smith won.");
}

/// Greedy boundary: a segment joins iff the chunk stays at or below max
#[test]
fn test_greedy_boundary_at_max() {
    let segmenter = SentenceSegmenter::default();
    // Three 20-character sentences
    let segments = segmenter.segment("Aaaa bbbb cccc dddd. Eeee ffff gggg hhhh. Iiii jjjj kkkk llll.");
    assert!(segments.iter().all(|s| s.char_len() == 20));

    let at_max = chunking(50, 60).chunk(&segments).unwrap();
    assert_eq!(at_max.len(), 1);
    assert_eq!(at_max[0].len(), 3);

    let below = chunking(50, 59).chunk(&segments).unwrap();
    assert_eq!(below.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![2, 1]);
}

#[tokio::test]
async fn test_batched_proportional_timeline() {
    let backend = Arc::new(ScriptedBackend::new(500));
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(backend.clone(), store.clone(), 4);

    let outcome = pipeline
        .process(
            "One two. Three four five six. Seven eight.",
            &chunking(100, 1000),
            TimingMode::Batched,
        )
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(times(&outcome), vec![(0.0, 1.0), (1.0, 2.0), (3.0, 1.0)]);
    assert_eq!(backend.calls().len(), 1);

    let result = outcome.result().unwrap();
    assert_eq!(result.total_duration(), 4.0);
    let audio = store.audio.lock().unwrap()[result.request_id()].clone();
    assert_eq!(wav_duration(&audio).unwrap(), 4.0);
    assert!(store.timing.lock().unwrap().contains_key(result.request_id()));
}

#[tokio::test]
async fn test_native_timestamps_drive_batched_timeline() {
    let mut backend = ScriptedBackend::new(500);
    backend.native_timestamps = true;
    backend.pause_ms = 200;
    let backend = Arc::new(backend);
    let pipeline = pipeline(backend, Arc::new(MemoryStore::default()), 4);

    let outcome = pipeline
        .process(
            "One two. Three four five six. Seven eight.",
            &chunking(100, 1000),
            TimingMode::Batched,
        )
        .await
        .unwrap();

    // Pauses belong to the preceding sentence
    assert_eq!(times(&outcome), vec![(0.0, 1.2), (1.2, 2.2), (3.4, 1.0)]);
    assert_eq!(outcome.result().unwrap().total_duration(), 4.4);
}

#[tokio::test]
async fn test_measured_mode_sends_one_sentence_per_call() {
    let backend = Arc::new(ScriptedBackend::new(250));
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 2);

    let outcome = pipeline
        .process(
            "First sentence here. Second one. And the third sentence is longest.",
            &chunking(100, 1000),
            TimingMode::Measured,
        )
        .await
        .unwrap();

    assert_eq!(backend.calls().len(), 3);
    assert_eq!(times(&outcome), vec![(0.0, 0.75), (0.75, 0.5), (1.25, 1.5)]);
    let indices: Vec<usize> = outcome
        .result()
        .unwrap()
        .segments()
        .iter()
        .map(|s| s.chunk_index())
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_hybrid_mode_follows_segment_count() {
    let text = "One. Two. Three.";
    let hybrid = |measured_max_segments| TimingMode::Hybrid {
        measured_max_segments,
    };

    let backend = Arc::new(ScriptedBackend::new(100));
    let short = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 4);
    short.process(text, &chunking(10, 1000), hybrid(3)).await.unwrap();
    assert_eq!(backend.calls().len(), 3);

    let backend = Arc::new(ScriptedBackend::new(100));
    let long = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 4);
    long.process(text, &chunking(10, 1000), hybrid(2)).await.unwrap();
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_exhausted_chunk_yields_partial_failure() {
    let backend = Arc::new(ScriptedBackend::new(100).with_fault(Fault::Always {
        marker: "Charlie",
        error: ChannelError::unavailable("scripted", "overloaded"),
    }));
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 5);

    // Each sentence is its own chunk under a 12-character max
    let outcome = pipeline
        .process(
            "Alpha one. Bravo two. Charlie three. Delta four. Echo five.",
            &chunking(5, 12),
            TimingMode::Batched,
        )
        .await
        .unwrap();

    let ProcessOutcome::Partial(partial) = &outcome else {
        panic!("expected a partial failure");
    };
    assert_eq!(partial.failed_indices(), vec![2]);
    assert!(matches!(
        partial.failed_chunks[0].reason,
        FailureReason::Exhausted { .. }
    ));
    assert_eq!(partial.failed_chunks[0].attempts, 4);

    let result = partial.partial.as_ref().unwrap();
    assert_eq!(result.segments().len(), 4);
    let texts: Vec<&str> = result.segments().iter().map(|s| s.text()).collect();
    assert_eq!(texts, vec!["Alpha one.", "Bravo two.", "Delta four.", "Echo five."]);
    // Timeline covers only the audio that exists
    assert_eq!(result.total_duration(), 0.8);
    assert_eq!(result.segments()[2].start_time(), 0.4);
}

#[tokio::test]
async fn test_transient_errors_recover_into_complete_result() {
    let backend = Arc::new(ScriptedBackend::new(100).with_fault(Fault::Times {
        marker: "Bravo",
        times: 2,
        error: ChannelError::rate_limit("scripted", None),
    }));
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 2);

    let outcome = pipeline
        .process("Alpha one. Bravo two. Charlie three.", &chunking(5, 12), TimingMode::Batched)
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.result().unwrap().segments().len(), 3);
    assert_eq!(backend.calls().len(), 5);
}

#[tokio::test]
async fn test_rejection_cancels_remaining_chunks() {
    let backend = Arc::new(ScriptedBackend::new(100).with_fault(Fault::Always {
        marker: "Alpha",
        error: ChannelError::auth("scripted", "invalid key"),
    }));
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 1);

    let outcome = pipeline
        .process("Alpha one. Bravo two. Charlie three.", &chunking(5, 12), TimingMode::Batched)
        .await
        .unwrap();

    let ProcessOutcome::Partial(partial) = outcome else {
        panic!("expected a partial failure");
    };
    assert!(partial.partial.is_none());
    assert!(matches!(partial.failed_chunks[0].reason, FailureReason::Rejected { .. }));
    assert_eq!(partial.failed_chunks[1].reason, FailureReason::Cancelled);
    assert_eq!(partial.failed_chunks[2].reason, FailureReason::Cancelled);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_chunks_respect_backend_request_limit() {
    let mut backend = ScriptedBackend::new(100);
    backend.max_request = 30;
    let backend = Arc::new(backend);
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 4);

    pipeline
        .process(
            "Aaaa bbbb cccc dddd. Eeee ffff gggg hhhh. Iiii jjjj kkkk llll.",
            &chunking(50, 60),
            TimingMode::Batched,
        )
        .await
        .unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.text.chars().count() <= 30));
}

#[tokio::test]
async fn test_joining_spaces_count_toward_request_limit() {
    let mut backend = ScriptedBackend::new(100);
    backend.max_request = 4096;
    let backend = Arc::new(backend);
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 2);

    // Two 2048-character sentences: 4096 of text, 4097 once joined
    let sentence = format!("{}.", "a".repeat(2047));
    let text = format!("{} {}", sentence, sentence);
    let outcome = pipeline
        .process(&text, &ChunkingConfig::default(), TimingMode::Batched)
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.text.chars().count() <= 4096));
}

#[tokio::test]
async fn test_word_count_chunking_respects_request_limit() {
    let mut backend = ScriptedBackend::new(100);
    backend.max_request = 30;
    let backend = Arc::new(backend);
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 4);

    let words = ChunkingConfig {
        strategy: ChunkingStrategy::WordCountBased,
        ..ChunkingConfig::default()
    };
    let outcome = pipeline
        .process(
            "Aaaa bbbb cccc dddd. Eeee ffff gggg hhhh. Iiii jjjj kkkk llll.",
            &words,
            TimingMode::Batched,
        )
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert!(backend.calls().iter().all(|c| c.text.chars().count() <= 30));
}

#[test]
fn test_backend_format_must_match_assembler() {
    let mut backend = ScriptedBackend::new(100);
    backend.format = AudioFormat::Mp3;
    let err = ReadAlongPipeline::new(
        Arc::new(backend),
        Arc::new(WavAssembler::new()),
        Arc::new(MemoryStore::default()),
        options(1),
    )
    .err()
    .unwrap();
    assert!(err.is_config());
    assert!(err.to_string().contains("mp3"));
}

/// Concatenates like the WAV assembler but appends a second of silence
struct PaddingAssembler {
    inner: WavAssembler,
}

#[async_trait]
impl AudioAssembler for PaddingAssembler {
    fn name(&self) -> &str {
        "padding"
    }

    async fn measure_duration(&self, audio: &[u8]) -> Result<f64> {
        self.inner.measure_duration(audio).await
    }

    async fn concatenate(&self, parts: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut padded = parts.to_vec();
        padded.push(common::silence_ms(1000));
        self.inner.concatenate(&padded).await
    }

    async fn transcode(&self, audio: &[u8], target: AudioFormat) -> Result<Vec<u8>> {
        self.inner.transcode(audio, target).await
    }
}

#[tokio::test]
async fn test_invalid_timeline_stores_nothing() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = ReadAlongPipeline::new(
        Arc::new(ScriptedBackend::new(100)),
        Arc::new(PaddingAssembler {
            inner: WavAssembler::new(),
        }),
        store.clone(),
        options(1),
    )
    .unwrap();

    let err = pipeline
        .process("One two. Three four.", &chunking(100, 1000), TimingMode::Batched)
        .await
        .unwrap_err();
    assert!(matches!(err, TtsError::InvariantViolation { .. }));
    assert!(store.audio.lock().unwrap().is_empty());
    assert!(store.timing.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_fails_fast() {
    let backend = Arc::new(ScriptedBackend::new(100));
    let pipeline = pipeline(backend.clone(), Arc::new(MemoryStore::default()), 4);

    let err = pipeline
        .process("   ", &ChunkingConfig::default(), TimingMode::Batched)
        .await
        .unwrap_err();
    assert!(matches!(err, TtsError::Validation { .. }));

    let err = pipeline
        .process("Hello there.", &chunking(100, 50), TimingMode::Batched)
        .await
        .unwrap_err();
    assert!(err.is_config());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_directory_store_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(ScriptedBackend::new(200));
    let pipeline = ReadAlongPipeline::new(
        backend,
        Arc::new(WavAssembler::new()),
        Arc::new(DirectoryStore::new(dir.path())),
        options(2),
    )
    .unwrap();

    let outcome = pipeline
        .process("Hello world. Goodbye now.", &chunking(100, 1000), TimingMode::Measured)
        .await
        .unwrap();
    let result = outcome.result().unwrap();

    let audio_path = dir.path().join(format!("{}.wav", result.request_id()));
    let timing_path = dir.path().join(format!("{}_timing.json", result.request_id()));
    let audio = std::fs::read(&audio_path).unwrap();
    assert_eq!(wav_duration(&audio).unwrap(), 0.8);
    assert_eq!(result.audio_reference(), audio_path.display().to_string());

    let timing: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(timing_path).unwrap()).unwrap();
    assert_eq!(timing["segments"].as_array().unwrap().len(), 2);
    assert_eq!(timing["segments"][1]["start_time"], 0.4);
    assert_eq!(timing["total_duration"], 0.8);
    assert_eq!(result.segment_at(0.5).unwrap().text(), "Goodbye now.");
}
