//! Shared test doubles for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use sdkwork_readalong::audio::{encode_int16, AudioFormat};
use sdkwork_readalong::channels::{
    BackendOutput, BackendRequest, ChannelError, ChannelResult, ChannelType, NativeTimestamp,
    SynthesisBackend,
};
use sdkwork_readalong::pipeline::ArtifactStore;
use sdkwork_readalong::text::count_words;
use sdkwork_readalong::{Result, TimedAudioResult};

/// Sample rate of generated audio; one frame per millisecond
pub const TEST_RATE: u32 = 1000;

/// Silent mono WAV lasting `ms` milliseconds
pub fn silence_ms(ms: u64) -> Vec<u8> {
    encode_int16(&vec![0i16; ms as usize], TEST_RATE, 1).unwrap()
}

/// How a scripted backend misbehaves
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fails every call for requests containing the marker
    Always { marker: &'static str, error: ChannelError },
    /// Fails the first `times` calls for requests containing the marker
    Times {
        marker: &'static str,
        times: usize,
        error: ChannelError,
    },
}

/// One recorded backend call
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub chunk_index: usize,
    pub text: String,
    pub started: Instant,
    pub in_flight: usize,
}

/// Deterministic backend: audio length is proportional to word count
pub struct ScriptedBackend {
    pub ms_per_word: u64,
    /// Silence inserted between sentences (reported via native timestamps)
    pub pause_ms: u64,
    pub native_timestamps: bool,
    pub latency: Duration,
    /// Requests longer than this are rejected like a cloud API would
    pub max_request: usize,
    pub format: AudioFormat,
    pub faults: Vec<Fault>,
    calls: Mutex<Vec<CallRecord>>,
    fault_hits: Mutex<HashMap<&'static str, usize>>,
    in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(ms_per_word: u64) -> Self {
        Self {
            ms_per_word,
            pause_ms: 0,
            native_timestamps: false,
            latency: Duration::ZERO,
            max_request: 10_000,
            format: AudioFormat::Wav,
            faults: Vec::new(),
            calls: Mutex::new(Vec::new()),
            fault_hits: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.calls().iter().map(|c| c.in_flight).max().unwrap_or(0)
    }

    fn fault_for(&self, text: &str) -> Option<ChannelError> {
        let mut hits = self.fault_hits.lock().unwrap();
        for fault in &self.faults {
            match fault {
                Fault::Always { marker, error } if text.contains(marker) => {
                    return Some(error.clone());
                }
                Fault::Times {
                    marker,
                    times,
                    error,
                } if text.contains(marker) => {
                    let count = hits.entry(*marker).or_insert(0);
                    if *count < *times {
                        *count += 1;
                        return Some(error.clone());
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[async_trait]
impl SynthesisBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Piper
    }

    async fn synthesize(&self, request: &BackendRequest) -> ChannelResult<BackendOutput> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(CallRecord {
            chunk_index: request.chunk_index,
            text: request.text.clone(),
            started: Instant::now(),
            in_flight,
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if request.text.chars().count() > self.max_request {
            return Err(ChannelError::request(
                "scripted",
                format!("input exceeds {} characters", self.max_request),
                None,
            ));
        }
        if let Some(error) = self.fault_for(&request.text) {
            return Err(error);
        }

        let mut offsets = Vec::new();
        let mut total_ms = 0u64;
        for (i, sentence) in request.sentences.iter().enumerate() {
            if i > 0 {
                total_ms += self.pause_ms;
            }
            offsets.push(NativeTimestamp {
                offset: total_ms as f64 / 1000.0,
                duration: 0.0,
            });
            total_ms += count_words(sentence) as u64 * self.ms_per_word;
        }

        Ok(BackendOutput {
            audio: silence_ms(total_ms),
            native_timestamps: self.native_timestamps.then_some(offsets),
        })
    }

    fn supports_batched_timestamps(&self) -> bool {
        self.native_timestamps
    }

    fn max_request_size(&self) -> usize {
        self.max_request
    }

    fn output_format(&self) -> AudioFormat {
        self.format
    }
}

/// Artifact store that keeps everything in memory
#[derive(Default)]
pub struct MemoryStore {
    pub audio: Mutex<HashMap<String, Vec<u8>>>,
    pub timing: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn store_audio(&self, request_id: &str, format: AudioFormat, audio: &[u8]) -> Result<String> {
        let reference = format!("memory://{}.{}", request_id, format.extension());
        self.audio
            .lock()
            .unwrap()
            .insert(request_id.to_string(), audio.to_vec());
        Ok(reference)
    }

    async fn store_timing(&self, result: &TimedAudioResult) -> Result<String> {
        self.timing
            .lock()
            .unwrap()
            .insert(result.request_id().to_string(), result.to_json()?);
        Ok(format!("memory://{}_timing.json", result.request_id()))
    }
}
