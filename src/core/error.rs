//! Structured error handling for the read-along pipeline
//!
//! Errors are grouped by how the pipeline reacts to them:
//! - Configuration and validation errors fail fast and are never retried
//! - Invariant violations are fatal; the timeline is never silently patched

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias with TtsError
pub type Result<T> = std::result::Result<T, TtsError>;

/// Main error type for the read-along pipeline
#[derive(Error, Debug, Clone)]
pub enum TtsError {
    /// Configuration errors (caller bugs, e.g. target size above max size)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Validation errors on caller input
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Audio processing errors
    #[error("Audio processing error ({operation}): {message}")]
    Audio {
        message: String,
        operation: AudioOperation,
    },

    /// Timing reconciliation errors
    #[error("Timing error: {message}")]
    Timing { message: String },

    /// A timeline invariant does not hold; always fatal
    #[error("Invariant violation ({invariant}): {message}")]
    InvariantViolation {
        invariant: Invariant,
        message: String,
    },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Timeout errors
    #[error("Operation timeout: {message} ({duration_ms}ms)")]
    Timeout { message: String, duration_ms: u64 },

    /// Internal/bug errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        location: Option<String>,
    },
}

impl TtsError {
    /// Create a configuration error without a file path
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a validation error for a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an audio error
    pub fn audio(operation: AudioOperation, message: impl Into<String>) -> Self {
        Self::Audio {
            message: message.into(),
            operation,
        }
    }

    /// Create an invariant violation
    pub fn invariant(invariant: Invariant, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            invariant,
            message: message.into(),
        }
    }

    /// Whether the error is a caller configuration problem
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Validation { .. })
    }

    /// Whether the pipeline must abort the whole document
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. } | Self::Internal { .. } | Self::Config { .. }
        )
    }
}

/// Audio operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOperation {
    Decoding,
    Measuring,
    Concatenating,
    Transcoding,
}

impl fmt::Display for AudioOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOperation::Decoding => write!(f, "decoding"),
            AudioOperation::Measuring => write!(f, "duration measurement"),
            AudioOperation::Concatenating => write!(f, "concatenation"),
            AudioOperation::Transcoding => write!(f, "transcoding"),
        }
    }
}

/// Timeline invariants checked before a result is published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// Consecutive segments never overlap
    Ordering,
    /// The timeline ends where the audio ends
    Coverage,
    /// Times are finite and non-negative
    ValidTime,
    /// Every synthesized chunk has exactly one result
    ChunkAccounting,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invariant::Ordering => write!(f, "ordering"),
            Invariant::Coverage => write!(f, "coverage"),
            Invariant::ValidTime => write!(f, "valid time"),
            Invariant::ChunkAccounting => write!(f, "chunk accounting"),
        }
    }
}

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add a simple message context
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TtsError::Internal {
            message: format!("{}: {}", f(), e),
            location: None,
        })
    }

    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| TtsError::Internal {
            message: format!("{}: {}", msg.into(), e),
            location: None,
        })
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for TtsError {
    fn from(err: std::io::Error) -> Self {
        TtsError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

/// Convert from hound::Error
impl From<hound::Error> for TtsError {
    fn from(err: hound::Error) -> Self {
        TtsError::Audio {
            message: format!("WAV processing failed: {}", err),
            operation: AudioOperation::Decoding,
        }
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for TtsError {
    fn from(err: serde_json::Error) -> Self {
        TtsError::Internal {
            message: format!("JSON serialization failed: {}", err),
            location: None,
        }
    }
}
