//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while resolving engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid retryable error pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ── Suite errors ──────────────────────────────────────────────────────────────

/// Errors raised while validating a scenario suite.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Suite defines no scenarios.")]
    Empty,

    #[error("Duplicate scenario name '{0}'.")]
    DuplicateName(String),

    #[error("Scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Unknown scenario '{0}'. Run 'infracheck validate <suite>' to list scenarios.")]
    UnknownScenario(String),
}

// ── Workspace errors ──────────────────────────────────────────────────────────

/// Errors raised for workspace identity and records.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Invalid workspace ID '{0}'.")]
    InvalidId(String),

    #[error("No workspace record in {0}. Is this a retained infracheck workspace?")]
    NoRecord(String),
}

// ── Poll errors ───────────────────────────────────────────────────────────────

/// Errors raised by the readiness poller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("{}", describe_timeout(.resource, .attempts, .last_error))]
    Timeout {
        resource: String,
        attempts: u32,
        last_error: Option<String>,
    },
}

impl PollError {
    /// Probes made before giving up.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. } => *attempts,
        }
    }
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn describe_timeout(resource: &str, attempts: &u32, last_error: &Option<String>) -> String {
    match last_error {
        Some(err) => format!(
            "Resource '{resource}' did not become ready after {attempts} attempts (last probe error: {err})"
        ),
        None => format!("Resource '{resource}' did not become ready after {attempts} attempts"),
    }
}
