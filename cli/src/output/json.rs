//! JSON output helpers.
//!
//! Provides the error-object formatter used by all `--json` code paths when
//! a command fails, and the suite report document.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::services::ProvisionFailure;
use crate::domain::{ConfigError, Scenario, Stage, SuiteError, SuiteReport, TestResult, WorkspaceError};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen in
/// practice: `serde_json` only fails on non-finite floats and maps with
/// non-string keys, neither of which appear here).
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Machine-readable code for the first typed error in the chain.
#[must_use]
pub fn error_code(error: &anyhow::Error) -> &'static str {
    error
        .chain()
        .find_map(|cause| {
            if cause.is::<ConfigError>() {
                Some("config_invalid")
            } else if cause.is::<SuiteError>() {
                Some("suite_invalid")
            } else if cause.is::<WorkspaceError>() {
                Some("workspace_invalid")
            } else if cause.is::<ProvisionFailure>() {
                Some("destroy_failed")
            } else {
                None
            }
        })
        .unwrap_or("error")
}

#[derive(Serialize)]
struct ReportDoc<'a> {
    passed: bool,
    exit_code: u8,
    summary: Summary,
    #[serde(flatten)]
    report: &'a SuiteReport,
    cleanup_failures: Vec<&'a str>,
}

#[derive(Serialize)]
struct Summary {
    total: usize,
    passed: usize,
    failed: usize,
    leaked: usize,
}

#[derive(Serialize)]
struct ResultDoc<'a> {
    passed: bool,
    failed_stages: Vec<Stage>,
    #[serde(flatten)]
    result: &'a TestResult,
}

/// Serialize a suite report, adding verdicts that are derived rather than stored.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_report(report: &SuiteReport) -> Result<String> {
    let mut doc = serde_json::to_value(ReportDoc {
        passed: report.passed(),
        exit_code: report.exit_code(),
        summary: Summary {
            total: report.results.len(),
            passed: report.results.len() - report.failed_count(),
            failed: report.failed_count(),
            leaked: report.cleanup_failures().count(),
        },
        report,
        cleanup_failures: report.cleanup_failures().map(|r| r.scenario.as_str()).collect(),
    })
    .context("JSON serialization failed")?;

    let results: Vec<ResultDoc<'_>> = report
        .results
        .iter()
        .map(|result| ResultDoc {
            passed: result.passed(),
            failed_stages: result.failed_stages(),
            result,
        })
        .collect();
    doc["results"] = serde_json::to_value(results).context("JSON serialization failed")?;
    serde_json::to_string_pretty(&doc).context("JSON serialization failed")
}

#[derive(Serialize)]
struct ScenarioDoc<'a> {
    name: &'a str,
    dir: String,
    poll_resource: Option<&'a str>,
    assertions: Vec<String>,
}

/// Serialize the scenario list of a validated suite.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_suite(scenarios: &[Scenario]) -> Result<String> {
    let docs: Vec<ScenarioDoc<'_>> = scenarios
        .iter()
        .map(|s| ScenarioDoc {
            name: &s.name,
            dir: s.options.dir.display().to_string(),
            poll_resource: s.poll.as_ref().map(|p| p.resource_output.as_str()),
            assertions: s.assertions.iter().map(|a| a.describe()).collect(),
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::json!({ "valid": true, "scenarios": docs }))
        .context("JSON serialization failed")
}
