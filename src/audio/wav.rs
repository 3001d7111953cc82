//! In-memory WAV handling
//!
//! Provides:
//! - 16-bit PCM encoding into WAV containers
//! - Duration measurement from WAV headers
//! - A hound-backed [`AudioAssembler`] that concatenates WAV chunks

use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

use crate::audio::{AudioAssembler, AudioFormat};
use crate::core::error::{AudioOperation, Result, TtsError};

/// Encode int16 samples as a WAV file in memory
pub fn encode_int16(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Wrap raw little-endian 16-bit PCM in a WAV container
///
/// A trailing odd byte is dropped.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    if sample_rate == 0 || channels == 0 {
        return Err(TtsError::audio(
            AudioOperation::Decoding,
            format!("invalid PCM layout: {} Hz, {} channels", sample_rate, channels),
        ));
    }
    let samples: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    encode_int16(&samples, sample_rate, channels)
}

/// Duration of a WAV blob in seconds
pub fn wav_duration(audio: &[u8]) -> Result<f64> {
    let reader = WavReader::new(Cursor::new(audio)).map_err(|e| {
        TtsError::audio(AudioOperation::Measuring, format!("not a WAV stream: {}", e))
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(TtsError::audio(AudioOperation::Measuring, "WAV header has zero sample rate"));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Assembler that works on WAV bytes entirely in memory
#[derive(Debug, Clone, Default)]
pub struct WavAssembler;

impl WavAssembler {
    /// Create a WAV assembler
    pub fn new() -> Self {
        Self
    }

    fn concatenate_sync(parts: &[Vec<u8>]) -> Result<Vec<u8>> {
        let first = parts.first().ok_or_else(|| {
            TtsError::audio(AudioOperation::Concatenating, "no audio parts to concatenate")
        })?;
        let spec = WavReader::new(Cursor::new(first.as_slice()))?.spec();

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for (index, part) in parts.iter().enumerate() {
                let mut reader = WavReader::new(Cursor::new(part.as_slice()))?;
                if reader.spec() != spec {
                    return Err(TtsError::audio(
                        AudioOperation::Concatenating,
                        format!(
                            "part {} has format {:?}, expected {:?}",
                            index,
                            reader.spec(),
                            spec
                        ),
                    ));
                }
                match spec.sample_format {
                    SampleFormat::Int => {
                        for sample in reader.samples::<i32>() {
                            writer.write_sample(sample?)?;
                        }
                    }
                    SampleFormat::Float => {
                        for sample in reader.samples::<f32>() {
                            writer.write_sample(sample?)?;
                        }
                    }
                }
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl AudioAssembler for WavAssembler {
    fn name(&self) -> &str {
        "wav"
    }

    async fn measure_duration(&self, audio: &[u8]) -> Result<f64> {
        wav_duration(audio)
    }

    async fn concatenate(&self, parts: &[Vec<u8>]) -> Result<Vec<u8>> {
        if parts.len() == 1 {
            wav_duration(&parts[0])?;
            return Ok(parts[0].clone());
        }
        Self::concatenate_sync(parts)
    }

    async fn transcode(&self, audio: &[u8], target: AudioFormat) -> Result<Vec<u8>> {
        match target {
            AudioFormat::Wav => {
                wav_duration(audio)?;
                Ok(audio.to_vec())
            }
            other => Err(TtsError::audio(
                AudioOperation::Transcoding,
                format!("the WAV assembler cannot produce {}; configure the ffmpeg assembler", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frames: usize, sample_rate: u32) -> Vec<u8> {
        let samples: Vec<i16> = (0..frames).map(|i| ((i % 100) as i16) * 100).collect();
        encode_int16(&samples, sample_rate, 1).unwrap()
    }

    #[test]
    fn test_wav_duration() {
        let audio = tone(24000, 16000);
        let duration = wav_duration(&audio).unwrap();
        assert!((duration - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_pcm16_to_wav_stereo() {
        // 4 frames of stereo = 16 bytes, plus one stray byte
        let pcm = vec![0u8; 17];
        let wav = pcm16_to_wav(&pcm, 8000, 2).unwrap();
        let reader = WavReader::new(Cursor::new(wav.as_slice())).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 4);
        assert!(pcm16_to_wav(&pcm, 0, 1).is_err());
    }

    #[test]
    fn test_not_wav_is_measurement_error() {
        let err = wav_duration(b"ID3 definitely not a wav").unwrap_err();
        assert!(matches!(
            err,
            TtsError::Audio { operation: AudioOperation::Measuring, .. }
        ));
    }

    #[tokio::test]
    async fn test_concatenate_sums_durations() {
        let assembler = WavAssembler::new();
        let parts = vec![tone(8000, 8000), tone(4000, 8000), tone(2000, 8000)];
        let joined = assembler.concatenate(&parts).await.unwrap();
        let duration = assembler.measure_duration(&joined).await.unwrap();
        assert!((duration - 1.75).abs() < 1e-9);

        let reader = WavReader::new(Cursor::new(joined.as_slice())).unwrap();
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 14000);
        assert_eq!(samples[8001], 100);
    }

    #[tokio::test]
    async fn test_concatenate_rejects_mismatched_specs() {
        let assembler = WavAssembler::new();
        let parts = vec![tone(100, 8000), tone(100, 16000)];
        let err = assembler.concatenate(&parts).await.unwrap_err();
        assert!(matches!(
            err,
            TtsError::Audio { operation: AudioOperation::Concatenating, .. }
        ));
        assert!(assembler.concatenate(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_transcode_only_wav() {
        let assembler = WavAssembler::new();
        let audio = tone(100, 8000);
        assert_eq!(assembler.transcode(&audio, AudioFormat::Wav).await.unwrap(), audio);
        assert!(assembler.transcode(&audio, AudioFormat::Mp3).await.is_err());
    }
}
