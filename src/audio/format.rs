//! Audio format descriptors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Flac,
    Opus,
}

impl AudioFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Opus => "ogg",
        }
    }

    /// MIME type for delivery
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
            Self::Opus => "audio/ogg",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wav => write!(f, "wav"),
            Self::Mp3 => write!(f, "mp3"),
            Self::Flac => write!(f, "flac"),
            Self::Opus => write!(f, "opus"),
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "mp3" | "mpeg" => Ok(Self::Mp3),
            "flac" => Ok(Self::Flac),
            "opus" | "ogg" => Ok(Self::Opus),
            other => Err(format!("unsupported audio format: {}", other)),
        }
    }
}
