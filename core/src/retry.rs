//! Retry ladder around a single extraction attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ErrorKind;
use crate::extract::{ExtractionFailure, ExtractionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the 1-based `attempt` failed, or `None` when the budget is spent.
    /// Linear: `attempt * base_delay`, capped at `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts() {
            return None;
        }
        let delay = self
            .base_delay_ms
            .saturating_mul(attempt as u64)
            .min(self.max_delay_ms);
        Some(Duration::from_millis(delay))
    }
}

/// Hooks the orchestrator uses to mirror ladder progress into the task.
#[async_trait]
pub trait LadderObserver: Send + Sync {
    async fn on_attempt(&self, _attempt: u32) {}
    async fn on_retry(&self, _attempt: u32, _delay: Duration, _failure: &ExtractionFailure) {}
}

pub struct NoopObserver;

#[async_trait]
impl LadderObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq)]
pub struct LadderOutcome<T> {
    pub outcome: ExtractionOutcome<T>,
    pub attempts: u32,
}

fn cancelled<T>(attempts: u32) -> LadderOutcome<T> {
    LadderOutcome {
        outcome: ExtractionOutcome::failure(ErrorKind::Cancelled, "Extraction cancelled"),
        attempts,
    }
}

/// Runs `extract` until it succeeds, hits a terminal failure, or the attempt
/// budget is spent. `extract` receives the 1-based attempt number.
///
/// Cancellation is checked before each attempt and during the backoff sleep.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    observer: &dyn LadderObserver,
    cancel: &CancellationToken,
    mut extract: F,
) -> LadderOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ExtractionOutcome<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        if cancel.is_cancelled() {
            return cancelled(attempt.saturating_sub(1).max(1));
        }

        observer.on_attempt(attempt).await;
        let failure = match extract(attempt).await {
            ExtractionOutcome::Success(v) => {
                return LadderOutcome {
                    outcome: ExtractionOutcome::Success(v),
                    attempts: attempt,
                }
            }
            ExtractionOutcome::Failure(f) => f,
        };

        if failure.kind.short_circuits_retry() {
            tracing::info!(attempt, kind = %failure.kind, "terminal failure, not retrying");
            return LadderOutcome {
                outcome: ExtractionOutcome::Failure(failure.with_attempts(attempt)),
                attempts: attempt,
            };
        }

        let Some(delay) = policy.next_delay(attempt) else {
            tracing::warn!(attempt, kind = %failure.kind, "retry budget exhausted");
            return LadderOutcome {
                outcome: ExtractionOutcome::Failure(failure.with_attempts(attempt)),
                attempts: attempt,
            };
        };

        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %failure.message,
            "extraction attempt failed, retrying"
        );
        observer.on_retry(attempt, delay, &failure).await;

        tokio::select! {
            _ = cancel.cancelled() => return cancelled(attempt),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
