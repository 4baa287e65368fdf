//! Exponential-backoff retry wrapper shared by both venue adapters.
//!
//! Grounded on `scrapers/polymarket_api.rs::execute_with_retry` and
//! `scrapers/dome.rs::execute_with_retry`, generalized into one
//! venue-agnostic helper instead of being duplicated per adapter.
//! Backoff parameters per §4.A: base 500ms, factor 2, cap 8s, max 5
//! attempts.

use crate::error::AdapterError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub const BASE_BACKOFF: Duration = Duration::from_millis(500);
pub const BACKOFF_FACTOR: u32 = 2;
pub const BACKOFF_CAP: Duration = Duration::from_secs(8);
pub const MAX_ATTEMPTS: u32 = 5;

/// Marks a venue "degraded" once `failure_threshold` consecutive
/// retry-budget exhaustions have been observed, so the Supervisor can
/// pause strategies against it (§4.A).
pub struct DegradedTracker {
    threshold: u32,
    consecutive_failures: std::sync::atomic::AtomicU32,
}

impl DegradedTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures
            .store(0, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.consecutive_failures
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures.load(std::sync::atomic::Ordering::Relaxed) >= self.threshold
    }
}

/// Retry `op` with exponential backoff. `op` returns `Err(true)` for a
/// retryable failure (transient/rate-limited) and `Err(false)` for a
/// failure that should abort immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    venue: &'static str,
    degraded: &DegradedTracker,
    mut op: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut backoff = BASE_BACKOFF;
    let mut last_err = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => {
                degraded.record_success();
                return Ok(value);
            }
            Err(err) if err.is_retryable() => {
                warn!(venue, attempt, "retryable venue error: {err}");
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    sleep(backoff).await;
                    backoff = (backoff * BACKOFF_FACTOR).min(BACKOFF_CAP);
                }
            }
            Err(err) => {
                // Non-retryable: schema drift, validation, insufficient
                // balance, not-found. Surface immediately.
                return Err(err);
            }
        }
    }

    degraded.record_failure();
    Err(last_err.unwrap_or(AdapterError::Unknown {
        venue,
        message: "retry budget exhausted with no recorded error".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let degraded = DegradedTracker::new(3);
        let calls = AtomicU32::new(0);
        let result: Result<u32, AdapterError> = retry_with_backoff("v", &degraded, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42u32) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let degraded = DegradedTracker::new(3);
        let calls = AtomicU32::new(0);
        let result: Result<u32, AdapterError> = retry_with_backoff("v", &degraded, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AdapterError::Transient {
                        venue: "v",
                        message: "boom".into(),
                    })
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert!(degraded.consecutive_failures.load(Ordering::SeqCst) == 0);
    }

    #[tokio::test]
    async fn validation_error_aborts_without_retry() {
        let degraded = DegradedTracker::new(3);
        let calls = AtomicU32::new(0);
        let result: Result<u32, AdapterError> = retry_with_backoff("v", &degraded, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AdapterError::Validation(
                    crate::error::ValidationError::PriceOutOfRange(2.0),
                ))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_budget_marks_degraded() {
        let degraded = DegradedTracker::new(1);
        let result: Result<u32, AdapterError> = retry_with_backoff("v", &degraded, || async {
            Err(AdapterError::Transient {
                venue: "v",
                message: "down".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert!(degraded.is_degraded());
    }
}
