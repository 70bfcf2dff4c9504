//! Scenario and suite results.
//!
//! This module is intentionally free of I/O, async, and external layer imports.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Exit code when every scenario passed.
pub const EXIT_PASSED: u8 = 0;
/// Exit code when at least one scenario failed but everything was destroyed.
pub const EXIT_FAILED: u8 = 1;
/// Exit code when the suite could not run at all (bad config, bad suite file).
pub const EXIT_ERROR: u8 = 2;
/// Exit code when at least one destroy failed and resources may be leaked.
pub const EXIT_LEAKED: u8 = 3;

/// Lifecycle stage of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Apply,
    Poll,
    Assert,
    Destroy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Apply => "apply",
            Self::Poll => "poll",
            Self::Assert => "assert",
            Self::Destroy => "destroy",
        })
    }
}

/// Why a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retryable failures until the attempt cap was reached.
    TransientExhausted,
    /// A failure no retry would fix.
    Permanent,
    /// The workspace could not be prepared.
    Workspace,
    /// The output naming the resource to poll was missing.
    MissingOutput,
    /// The resource never reported ready.
    ReadinessTimeout,
    /// The scenario deadline elapsed.
    Deadline,
    /// The suite was cancelled.
    Cancelled,
    /// A collaborator panicked.
    Panicked,
    /// Destroy failed; resources may be leaked.
    Cleanup,
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Passed {
        attempts: u32,
    },
    Failed {
        kind: FailureKind,
        message: String,
        attempts: u32,
    },
    Skipped,
    NotConfigured,
}

impl StageOutcome {
    #[must_use]
    pub fn failed(kind: FailureKind, message: impl Into<String>, attempts: u32) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
            attempts,
        }
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome of one assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionOutcome {
    pub description: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AssertionOutcome {
    #[must_use]
    pub fn pass(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            passed: true,
            message: None,
        }
    }

    #[must_use]
    pub fn fail(description: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Result of one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub apply: StageOutcome,
    pub poll: StageOutcome,
    pub assertions: Vec<AssertionOutcome>,
    pub destroy: StageOutcome,
    /// Workspace kept on disk because destroy failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retained_workspace: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl TestResult {
    /// Apply, poll (when configured), every assertion and destroy all passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.apply.is_passed()
            && (self.poll.is_passed() || self.poll == StageOutcome::NotConfigured)
            && self.assertions.iter().all(|a| a.passed)
            && self.destroy.is_passed()
    }

    /// Stages that failed, in lifecycle order.
    #[must_use]
    pub fn failed_stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        if self.apply.is_failed() {
            stages.push(Stage::Apply);
        }
        if self.poll.is_failed() {
            stages.push(Stage::Poll);
        }
        if self.assertions.iter().any(|a| !a.passed) {
            stages.push(Stage::Assert);
        }
        if self.destroy.is_failed() {
            stages.push(Stage::Destroy);
        }
        stages
    }

    /// Destroy failed, so provisioned resources may still exist.
    #[must_use]
    pub fn leaked(&self) -> bool {
        self.destroy.is_failed()
    }
}

/// Results of a whole suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub results: Vec<TestResult>,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed()).count()
    }

    /// Scenarios whose destroy failed.
    pub fn cleanup_failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.leaked())
    }

    /// Process exit code: leaks outrank ordinary failures.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.cleanup_failures().next().is_some() {
            EXIT_LEAKED
        } else if self.passed() {
            EXIT_PASSED
        } else {
            EXIT_FAILED
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's serialize_with signature
fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
