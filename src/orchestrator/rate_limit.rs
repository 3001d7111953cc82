//! Call pacing
//!
//! One [`RateLimiter`] exists per document run. Every backend call,
//! retries included, passes through [`RateLimiter::acquire`], which keeps
//! consecutive call starts at least the effective interval apart.
//!
//! Slots are claimed in order under the state lock; the wait for a slot
//! happens after the lock is released, so streak updates never queue
//! behind a pacing sleep.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Pacing state shared by the tasks of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitState {
    /// Start time of the most recently claimed call slot
    #[serde(skip)]
    pub last_call_time: Option<Instant>,
    /// Backend failures since the last success
    pub consecutive_failures: u32,
    /// Calls released so far
    pub calls: u64,
    /// Total time spent waiting at the gate
    #[serde(skip)]
    pub total_wait: Duration,
}

/// Serializing gate that spaces backend calls
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_interval: Duration,
    state: Mutex<RateLimitState>,
}

impl RateLimiter {
    /// Create a limiter
    ///
    /// While the backend keeps failing, the interval widens linearly with
    /// the failure streak up to `max_interval` (never below `min_interval`).
    pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            min_interval,
            max_interval: max_interval.max(min_interval),
            state: Mutex::new(RateLimitState::default()),
        }
    }

    /// Base spacing between calls
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Spacing that applies for a given failure streak
    pub fn effective_interval(&self, consecutive_failures: u32) -> Duration {
        self.min_interval
            .saturating_mul(consecutive_failures.saturating_add(1))
            .min(self.max_interval)
    }

    /// Claim the next call slot and wait for it
    ///
    /// Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let arrived = Instant::now();
        let slot = {
            let mut state = self.state.lock().await;
            let interval = self.effective_interval(state.consecutive_failures);
            let slot = match state.last_call_time {
                Some(last) => (last + interval).max(arrived),
                None => arrived,
            };
            state.last_call_time = Some(slot);
            state.calls += 1;
            state.total_wait += slot - arrived;
            slot
        };

        if slot > arrived {
            debug!("Pacing: waiting {}ms for next call slot", (slot - arrived).as_millis());
            tokio::time::sleep_until(slot).await;
        }
        slot - arrived
    }

    /// Reset the failure streak
    pub async fn record_success(&self) {
        self.state.lock().await.consecutive_failures = 0;
    }

    /// Extend the failure streak, returning its new length
    pub async fn record_failure(&self) -> u32 {
        let mut state = self.state.lock().await;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.consecutive_failures
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> RateLimitState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_interval_widens_and_caps() {
        let limiter = RateLimiter::new(Duration::from_secs(2), Duration::from_secs(5));
        assert_eq!(limiter.effective_interval(0), Duration::from_secs(2));
        assert_eq!(limiter.effective_interval(1), Duration::from_secs(4));
        assert_eq!(limiter.effective_interval(7), Duration::from_secs(5));
    }

    #[test]
    fn test_max_never_below_min() {
        let limiter = RateLimiter::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(limiter.effective_interval(4), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_spaces_calls() {
        let limiter = RateLimiter::new(Duration::from_millis(500), Duration::from_secs(10));
        let first = Instant::now();
        assert_eq!(limiter.acquire().await, Duration::ZERO);
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(first.elapsed() >= Duration::from_millis(1000));

        let state = limiter.snapshot().await;
        assert_eq!(state.calls, 3);
        assert_eq!(state.total_wait, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_streak_updates_do_not_wait_for_pacing() {
        let limiter = std::sync::Arc::new(RateLimiter::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
        ));
        limiter.acquire().await;

        let waiting = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.acquire().await }
        });
        tokio::task::yield_now().await;

        let quick = Duration::from_millis(1);
        assert!(tokio::time::timeout(quick, limiter.record_failure()).await.is_ok());
        assert!(tokio::time::timeout(quick, limiter.record_success()).await.is_ok());
        assert!(tokio::time::timeout(quick, limiter.snapshot()).await.is_ok());

        assert_eq!(waiting.await.unwrap(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_widen_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(100), Duration::from_secs(1));
        limiter.acquire().await;
        assert_eq!(limiter.record_failure().await, 1);
        assert_eq!(limiter.record_failure().await, 2);
        assert_eq!(limiter.acquire().await, Duration::from_millis(300));

        limiter.record_success().await;
        assert_eq!(limiter.snapshot().await.consecutive_failures, 0);
        assert_eq!(limiter.acquire().await, Duration::from_millis(100));
    }
}
