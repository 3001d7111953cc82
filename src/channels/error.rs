//! Channel Error Handling
//!
//! Unified error types for all synthesis backends, with the retry
//! classification the orchestrator relies on.

use std::fmt;
use std::time::Duration;

/// Substrings that identify quota or throttling failures in error bodies
const RATE_LIMIT_INDICATORS: &[&str] = &[
    "resource_exhausted",
    "quota",
    "rate limit",
    "too many requests",
];

/// Channel error types
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Authentication failed
    Authentication {
        channel: String,
        message: String,
    },
    /// Request failed
    Request {
        channel: String,
        message: String,
        status_code: Option<u16>,
    },
    /// Response parsing failed
    Response {
        channel: String,
        message: String,
    },
    /// Configuration error
    Configuration {
        channel: String,
        message: String,
    },
    /// Rate limit exceeded
    RateLimit {
        channel: String,
        retry_after: Option<u64>,
    },
    /// Call did not complete in time
    Timeout {
        channel: String,
        duration_ms: u64,
    },
    /// Connection-level failure
    Network {
        channel: String,
        message: String,
    },
    /// Service unavailable
    Unavailable {
        channel: String,
        message: String,
    },
    /// Internal error
    Internal {
        channel: String,
        message: String,
    },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication { channel, message } => {
                write!(f, "[{}] Authentication failed: {}", channel, message)
            }
            Self::Request { channel, message, status_code } => {
                match status_code {
                    Some(code) => write!(f, "[{}] Request failed ({}): {}", channel, code, message),
                    None => write!(f, "[{}] Request failed: {}", channel, message),
                }
            }
            Self::Response { channel, message } => {
                write!(f, "[{}] Response parsing failed: {}", channel, message)
            }
            Self::Configuration { channel, message } => {
                write!(f, "[{}] Configuration error: {}", channel, message)
            }
            Self::RateLimit { channel, retry_after } => {
                match retry_after {
                    Some(secs) => write!(f, "[{}] Rate limit exceeded, retry after {} seconds", channel, secs),
                    None => write!(f, "[{}] Rate limit exceeded", channel),
                }
            }
            Self::Timeout { channel, duration_ms } => {
                write!(f, "[{}] Request timed out after {}ms", channel, duration_ms)
            }
            Self::Network { channel, message } => {
                write!(f, "[{}] Network error: {}", channel, message)
            }
            Self::Unavailable { channel, message } => {
                write!(f, "[{}] Service unavailable: {}", channel, message)
            }
            Self::Internal { channel, message } => {
                write!(f, "[{}] Internal error: {}", channel, message)
            }
        }
    }
}

impl std::error::Error for ChannelError {}

impl ChannelError {
    /// Create authentication error
    pub fn auth(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authentication {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create request error
    pub fn request(
        channel: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Request {
            channel: channel.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Create response error
    pub fn response(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Response {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create configuration error
    pub fn config(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create rate limit error
    pub fn rate_limit(channel: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            channel: channel.into(),
            retry_after,
        }
    }

    /// Create timeout error
    pub fn timeout(channel: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            channel: channel.into(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create network error
    pub fn network(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create unavailable error
    pub fn unavailable(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response
    ///
    /// Bodies that mention quota exhaustion are rate limits whatever the
    /// status; a `retryDelay` hint in the body wins over the header.
    pub fn from_status(
        channel: impl Into<String>,
        status: u16,
        body: &str,
        retry_after_header: Option<u64>,
    ) -> Self {
        let channel = channel.into();
        if status == 429 || is_rate_limit_message(body) {
            let retry_after = parse_retry_delay(body).or(retry_after_header);
            return Self::rate_limit(channel, retry_after);
        }
        match status {
            401 | 403 => Self::auth(channel, truncate(body)),
            503 => Self::unavailable(channel, truncate(body)),
            _ => Self::request(channel, truncate(body), Some(status)),
        }
    }

    /// Classify a transport failure from reqwest
    pub fn from_reqwest(channel: impl Into<String>, err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(channel, timeout)
        } else {
            Self::network(channel, err.to_string())
        }
    }

    /// Get channel name
    pub fn channel(&self) -> &str {
        match self {
            Self::Authentication { channel, .. } => channel,
            Self::Request { channel, .. } => channel,
            Self::Response { channel, .. } => channel,
            Self::Configuration { channel, .. } => channel,
            Self::RateLimit { channel, .. } => channel,
            Self::Timeout { channel, .. } => channel,
            Self::Network { channel, .. } => channel,
            Self::Unavailable { channel, .. } => channel,
            Self::Internal { channel, .. } => channel,
        }
    }

    /// Get error message
    pub fn message(&self) -> &str {
        match self {
            Self::Authentication { message, .. } => message,
            Self::Request { message, .. } => message,
            Self::Response { message, .. } => message,
            Self::Configuration { message, .. } => message,
            Self::RateLimit { .. } => "Rate limit exceeded",
            Self::Timeout { .. } => "Request timed out",
            Self::Network { message, .. } => message,
            Self::Unavailable { message, .. } => message,
            Self::Internal { message, .. } => message,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { status_code, .. } => {
                // 5xx errors and request timeouts are retryable
                status_code.is_some_and(|code| code >= 500 || code == 408)
            }
            Self::Unavailable { .. } => true,
            Self::RateLimit { .. } => true,
            Self::Timeout { .. } => true,
            Self::Network { .. } => true,
            _ => false,
        }
    }

    /// Server-requested wait before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after: Some(secs), .. } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Whether an error text reads like a quota or throttling failure
pub fn is_rate_limit_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    (lower.contains("429") && lower.contains("error"))
        || RATE_LIMIT_INDICATORS.iter().any(|needle| lower.contains(needle))
}

/// Extract a `retryDelay` hint such as `"retryDelay": "16s"` (rounded up)
pub fn parse_retry_delay(text: &str) -> Option<u64> {
    let start = text.find("retryDelay")? + "retryDelay".len();
    let rest = &text[start..];
    let digits_start = rest.find(|c: char| c.is_ascii_digit())?;
    // Only skip quoting and separators between the key and the number
    if rest[..digits_start]
        .chars()
        .any(|c| !matches!(c, '"' | '\'' | ':' | ' ' | '='))
    {
        return None;
    }
    let number: String = rest[digits_start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let suffix = rest[digits_start + number.len()..].chars().next();
    if suffix != Some('s') {
        return None;
    }
    number.parse::<f64>().ok().map(|secs| secs.ceil() as u64)
}

fn truncate(body: &str) -> String {
    const MAX: usize = 300;
    let body = body.trim();
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    }
}

/// Channel result type
pub type ChannelResult<T> = Result<T, ChannelError>;
