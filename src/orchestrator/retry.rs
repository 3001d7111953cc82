//! Retry policy with exponential backoff

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::channels::ChannelError;

/// Exponential backoff settings for transient backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for the exponential delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total calls allowed for one chunk
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `min(base × 2^retry, max_delay)` for the zero-based retry number
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.min(31)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before retrying after `err`
    ///
    /// A server-provided retry hint wins when it asks for a longer wait.
    pub fn delay_for(&self, retry: u32, err: &ChannelError) -> Duration {
        let backoff = self.backoff(retry);
        match err.retry_after() {
            Some(hint) if hint > backoff => hint,
            _ => backoff,
        }
    }

    /// Whether another attempt is allowed after `attempts` calls failed with `err`
    pub fn should_retry(&self, attempts: u32, err: &ChannelError) -> bool {
        err.is_retryable() && attempts < self.max_attempts()
    }
}
