//! Audio assembler port

use async_trait::async_trait;

use crate::audio::AudioFormat;
use crate::core::error::Result;

/// Audio collaborator used by the timing engine and the pipeline
///
/// Implementations own codec details; the pipeline only moves bytes.
#[async_trait]
pub trait AudioAssembler: Send + Sync {
    /// Assembler name for logs
    fn name(&self) -> &str;

    /// Format produced by [`AudioAssembler::concatenate`]
    fn intermediate_format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    /// Duration of an audio blob in seconds
    async fn measure_duration(&self, audio: &[u8]) -> Result<f64>;

    /// Join audio blobs end to end without inserting gaps
    async fn concatenate(&self, parts: &[Vec<u8>]) -> Result<Vec<u8>>;

    /// Re-encode audio into a delivery format
    async fn transcode(&self, audio: &[u8], target: AudioFormat) -> Result<Vec<u8>>;
}
