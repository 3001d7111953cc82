//! Concurrent synthesis scheduling
//!
//! Runs every chunk through the backend with:
//! - bounded concurrency (a semaphore)
//! - pacing between call starts (the run's [`RateLimiter`])
//! - exponential backoff on transient errors
//! - an abort flag that stops new calls once any chunk fails
//!
//! Outcomes are gathered with `join_all`, so they come back in chunk order
//! regardless of completion order.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::channels::{BackendRequest, ChannelError, SynthesisBackend};
use crate::core::error::{Result, TtsError};
use crate::orchestrator::outcome::{
    ChunkFailure, ChunkOutcome, FailureReason, SynthesisReport, SynthesisResult,
};
use crate::orchestrator::rate_limit::RateLimiter;
use crate::orchestrator::retry::RetryPolicy;
use crate::text::Chunk;

/// Orchestrator knobs; concurrency and pacing are independent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Calls allowed in flight at once
    pub max_concurrency: usize,
    /// Minimum spacing between call starts
    pub min_interval: Duration,
    /// Deadline for a single backend call
    pub request_timeout: Duration,
    /// Backoff for transient failures
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            min_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Sequential, paced calls (local engines)
    pub fn sequential(min_interval: Duration) -> Self {
        Self {
            max_concurrency: 1,
            min_interval,
            ..Self::default()
        }
    }

    /// Fail fast on unusable settings
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(TtsError::config("max_concurrency must be at least 1"));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(TtsError::config("max_concurrency is too large"));
        }
        if self.request_timeout.is_zero() {
            return Err(TtsError::config("request timeout must be positive"));
        }
        Ok(())
    }
}

/// Drives one document's chunks through a backend
#[derive(Debug, Clone)]
pub struct SynthesisOrchestrator {
    config: OrchestratorConfig,
}

/// Shared per-run state borrowed by every chunk task
struct RunContext<'a> {
    backend: &'a dyn SynthesisBackend,
    semaphore: Semaphore,
    limiter: RateLimiter,
    aborted: AtomicBool,
}

impl SynthesisOrchestrator {
    /// Create an orchestrator
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Synthesize all chunks
    ///
    /// Each call to this method owns fresh pacing state.
    pub async fn synthesize(
        &self,
        chunks: &[Chunk],
        backend: &dyn SynthesisBackend,
    ) -> SynthesisReport {
        let started = Instant::now();
        let ctx = RunContext {
            backend,
            semaphore: Semaphore::new(self.config.max_concurrency),
            limiter: RateLimiter::new(self.config.min_interval, self.config.retry.max_delay),
            aborted: AtomicBool::new(false),
        };

        info!(
            "Synthesizing {} chunks via '{}' (concurrency {}, interval {}ms)",
            chunks.len(),
            backend.name(),
            self.config.max_concurrency,
            self.config.min_interval.as_millis()
        );

        let outcomes: Vec<ChunkOutcome> =
            join_all(chunks.iter().map(|chunk| self.run_chunk(chunk, &ctx))).await;

        let report = SynthesisReport {
            outcomes,
            elapsed: started.elapsed(),
            rate_limit: ctx.limiter.snapshot().await,
        };
        info!(
            "Synthesis finished in {:.2}s: {} ok, {} failed, {} calls",
            report.elapsed.as_secs_f64(),
            report.successes().count(),
            report.failures().count(),
            report.rate_limit.calls
        );
        report
    }

    async fn run_chunk(&self, chunk: &Chunk, ctx: &RunContext<'_>) -> ChunkOutcome {
        let index = chunk.index();
        let Ok(_permit) = ctx.semaphore.acquire().await else {
            return Err(ChunkFailure::cancelled(index, 0));
        };

        let request = BackendRequest::from_chunk(chunk);
        let mut attempts: u32 = 0;

        loop {
            if ctx.aborted.load(Ordering::SeqCst) {
                debug!("Chunk {} cancelled after {} attempts", index, attempts);
                return Err(ChunkFailure::cancelled(index, attempts));
            }
            ctx.limiter.acquire().await;
            if ctx.aborted.load(Ordering::SeqCst) {
                return Err(ChunkFailure::cancelled(index, attempts));
            }

            attempts += 1;
            let call_started = Instant::now();
            let result = match tokio::time::timeout(
                self.config.request_timeout,
                ctx.backend.synthesize(&request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ChannelError::timeout(ctx.backend.name(), self.config.request_timeout)),
            };

            let err = match result {
                Ok(output) => {
                    ctx.limiter.record_success().await;
                    let backend_latency = call_started.elapsed();
                    debug!(
                        "Chunk {} done in {}ms after {} attempt(s)",
                        index,
                        backend_latency.as_millis(),
                        attempts
                    );
                    return Ok(SynthesisResult {
                        chunk_index: index,
                        audio: output.audio,
                        native_timestamps: output.native_timestamps,
                        backend_latency,
                        attempts,
                    });
                }
                Err(err) => err,
            };

            let streak = ctx.limiter.record_failure().await;
            if !self.config.retry.should_retry(attempts, &err) {
                ctx.aborted.store(true, Ordering::SeqCst);
                let reason = if err.is_retryable() {
                    FailureReason::Exhausted {
                        last_error: err.to_string(),
                    }
                } else {
                    FailureReason::Rejected {
                        error: err.to_string(),
                    }
                };
                error!("Chunk {} failed after {} attempts: {}", index, attempts, err);
                return Err(ChunkFailure {
                    chunk_index: index,
                    attempts,
                    reason,
                });
            }

            let delay = self.config.retry.delay_for(attempts - 1, &err);
            warn!(
                "Chunk {} attempt {} failed: {}. Retrying in {}ms (failure streak {})...",
                index,
                attempts,
                err,
                delay.as_millis(),
                streak
            );
            tokio::time::sleep(delay).await;
        }
    }
}
