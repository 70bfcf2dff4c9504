//! Provisioning driver: apply and destroy with classified retry.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::process::Output;

use infracheck_common::OutputSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::ports::ProvisioningTool;
use crate::application::services::retry::{ProvisionFailure, retry_classified};
use crate::domain::{
    AttemptRecord, Classification, ProvisioningOptions, RetryClassifier, RetryPolicy, ToolFailure,
};

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct Applied {
    pub outputs: OutputSet,
    pub attempts: Vec<AttemptRecord>,
}

/// Result of a successful destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destroyed {
    Destroyed { attempts: Vec<AttemptRecord> },
    /// The workspace was never initialised, so nothing can exist.
    NothingToDestroy,
}

impl Destroyed {
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        match self {
            Self::Destroyed { attempts } => attempts.last().map_or(0, |a| a.attempt),
            Self::NothingToDestroy => 0,
        }
    }
}

/// Drives a [`ProvisioningTool`] under a retry policy.
pub struct ProvisioningDriver<'a, T: ProvisioningTool> {
    tool: &'a T,
    classifier: &'a RetryClassifier,
    policy: &'a RetryPolicy,
    stop: CancellationToken,
}

impl<'a, T: ProvisioningTool> ProvisioningDriver<'a, T> {
    pub fn new(tool: &'a T, classifier: &'a RetryClassifier, policy: &'a RetryPolicy) -> Self {
        Self {
            tool,
            classifier,
            policy,
            stop: CancellationToken::new(),
        }
    }

    /// Interrupt an in-flight apply when `stop` fires. The tool is asked to
    /// shut down gracefully and no further attempt starts. Destroy ignores it.
    #[must_use]
    pub fn with_stop(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    /// Init and apply, retrying transient failures, then read outputs.
    ///
    /// # Errors
    ///
    /// Returns the terminal failure with every attempt record. Outputs that
    /// cannot be read or parsed are a permanent failure.
    pub async fn apply(&self, options: &ProvisioningOptions) -> Result<Applied, ProvisionFailure> {
        let tool = self.tool;
        let stop = &self.stop;
        let ((), attempts) =
            retry_classified(self.policy, self.classifier, "apply", stop, || async move {
                tokio::select! {
                    biased;
                    () = stop.cancelled() => {
                        return Err(ToolFailure::new("apply interrupted", None));
                    }
                    init = tool.init(options) => invoke(init)?,
                };
                invoke(tool.apply(options, stop).await).map(drop)
            })
            .await?;

        let outputs = invoke(tool.output(options).await).and_then(|out| {
            OutputSet::from_tool_json(&out.stdout)
                .map_err(|e| ToolFailure::new(e.to_string(), out.status.code()))
        });
        match outputs {
            Ok(outputs) => {
                info!(outputs = outputs.len(), attempts = attempts.len(), "Apply succeeded");
                Ok(Applied { outputs, attempts })
            }
            Err(failure) => Err(ProvisionFailure {
                operation: "output",
                failure,
                classification: Classification::Permanent,
                attempts,
            }),
        }
    }

    /// Destroy everything recorded in the workspace state.
    ///
    /// A never-initialised workspace is a no-op. Each attempt re-runs init
    /// first, so a workspace whose init was interrupted can still be torn down.
    ///
    /// # Errors
    ///
    /// Returns the terminal failure with every attempt record.
    pub async fn destroy(
        &self,
        options: &ProvisioningOptions,
    ) -> Result<Destroyed, ProvisionFailure> {
        if !self.tool.is_initialized(options) {
            info!(dir = %options.dir.display(), "Workspace never initialised, nothing to destroy");
            return Ok(Destroyed::NothingToDestroy);
        }
        let tool = self.tool;
        let ((), attempts) = retry_classified(
            self.policy,
            self.classifier,
            "destroy",
            &CancellationToken::new(),
            || async move {
                invoke(tool.init(options).await)?;
                invoke(tool.destroy(options).await).map(drop)
            },
        )
        .await?;
        info!(attempts = attempts.len(), "Destroy succeeded");
        Ok(Destroyed::Destroyed { attempts })
    }
}

/// Turn one tool invocation into success or a classifiable failure.
fn invoke(result: anyhow::Result<Output>) -> Result<Output, ToolFailure> {
    let output = result.map_err(|e| ToolFailure::new(format!("{e:#}"), None))?;
    if output.status.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(ToolFailure::new(message, output.status.code()))
}
