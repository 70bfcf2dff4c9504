//! Classified retry loop shared by apply and destroy.

use std::future::Future;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::domain::{
    AttemptOutcome, AttemptRecord, Classification, FailureKind, RetryClassifier, RetryPolicy,
    ToolFailure,
};

/// Terminal failure of a retried provisioning operation.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed after {} attempt(s): {failure}", .attempts.len())]
pub struct ProvisionFailure {
    pub operation: &'static str,
    /// The last failure observed.
    pub failure: ToolFailure,
    pub classification: Classification,
    /// One record per attempt, in order.
    pub attempts: Vec<AttemptRecord>,
}

impl ProvisionFailure {
    /// Retryable failures that hit the attempt cap are reported as exhausted.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        if self.classification.is_retryable() {
            FailureKind::TransientExhausted
        } else {
            FailureKind::Permanent
        }
    }

    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempts.last().map_or(0, |a| a.attempt)
    }
}

/// Run `operation` until it succeeds, fails permanently, or exhausts
/// `policy.max_attempts`. Waits `policy.delay_after(n)` between attempts.
/// Once `stop` fires no further attempt starts.
///
/// # Errors
///
/// Returns the last failure together with every attempt record.
pub async fn retry_classified<T, F, Fut>(
    policy: &RetryPolicy,
    classifier: &RetryClassifier,
    operation: &'static str,
    stop: &CancellationToken,
    mut attempt_once: F,
) -> Result<(T, Vec<AttemptRecord>), ProvisionFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ToolFailure>>,
{
    let started = Instant::now();
    let mut attempts = Vec::new();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let result = attempt_once().await;

        let failure = match result {
            Ok(value) => {
                attempts.push(AttemptRecord {
                    attempt,
                    elapsed: started.elapsed(),
                    outcome: AttemptOutcome::Success,
                });
                return Ok((value, attempts));
            }
            Err(failure) => failure,
        };

        let classification = classifier.classify(&failure);
        attempts.push(AttemptRecord {
            attempt,
            elapsed: started.elapsed(),
            outcome: if classification.is_retryable() {
                AttemptOutcome::RetryableFailure
            } else {
                AttemptOutcome::PermanentFailure
            },
        });

        let reason = match &classification {
            Classification::Retryable { reason }
                if attempt < policy.max_attempts && !stop.is_cancelled() =>
            {
                reason
            }
            _ => {
                error!(
                    operation,
                    attempt,
                    retryable = classification.is_retryable(),
                    error = %failure,
                    "Provisioning operation failed"
                );
                return Err(ProvisionFailure {
                    operation,
                    failure,
                    classification,
                    attempts,
                });
            }
        };

        let delay = policy.delay_after(attempt);
        warn!(
            operation,
            attempt,
            reason = %reason,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Transient provisioning failure, retrying"
        );
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = stop.cancelled() => {
                warn!(operation, attempt, "Stopped while waiting to retry");
                return Err(ProvisionFailure {
                    operation,
                    failure,
                    classification,
                    attempts,
                });
            }
        }
    }
}
