//! Readiness poller: probe a resource until it is ready or attempts run out.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::ports::{ReadinessProbe, ResourceRef};
use crate::domain::{PollConfig, PollError};

/// Successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    /// Probes made, including the one that reported ready.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Probe `resource` up to `config.max_attempts` times.
///
/// Sleeps `config.delay_after(n)` between probes and never after the last
/// one. A probe error counts as "not ready" for that attempt.
///
/// # Errors
///
/// Returns [`PollError::Timeout`] once every attempt reported not ready.
pub async fn wait_until_ready(
    probe: &impl ReadinessProbe,
    resource: &ResourceRef,
    config: &PollConfig,
) -> Result<PollSummary, PollError> {
    let started = Instant::now();
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match probe.is_ready(resource).await {
            Ok(true) => {
                let elapsed = started.elapsed();
                info!(resource = %resource.id, attempt, elapsed_ms = elapsed.as_millis(), "Resource is ready");
                return Ok(PollSummary {
                    attempts: attempt,
                    elapsed,
                });
            }
            Ok(false) => debug!(resource = %resource.id, attempt, "Resource not ready yet"),
            Err(e) => {
                debug!(resource = %resource.id, attempt, error = %e, "Readiness probe failed");
                last_error = Some(format!("{e:#}"));
            }
        }
        if attempt < config.max_attempts {
            tokio::time::sleep(config.delay_after(attempt)).await;
        }
    }

    warn!(resource = %resource.id, attempts = config.max_attempts, "Resource never became ready");
    Err(PollError::Timeout {
        resource: resource.id.clone(),
        attempts: config.max_attempts,
        last_error,
    })
}
