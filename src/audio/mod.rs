//! Audio assembly modules
//!
//! - Audio format descriptors for delivery artifacts
//! - The [`AudioAssembler`] port: duration measurement, concatenation, transcoding
//! - In-memory WAV assembler backed by hound
//! - ffmpeg/ffprobe process assembler for compressed delivery formats

mod assembler;
mod ffmpeg;
mod format;
mod wav;

pub use assembler::AudioAssembler;
pub use ffmpeg::{FfmpegAssembler, FfmpegSettings};
pub use format::AudioFormat;
pub use wav::{encode_int16, pcm16_to_wav, wav_duration, WavAssembler};
