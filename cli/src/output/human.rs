//! Human-readable terminal renderer.

use std::path::Path;
use std::time::Duration;

use owo_colors::OwoColorize as _;

use crate::domain::{FailureKind, Scenario, StageOutcome, SuiteReport, TestResult};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the scenarios of a validated suite.
    pub fn render_suite(&self, path: &Path, scenarios: &[Scenario]) {
        self.ctx
            .success(&format!("{} is valid ({} scenarios)", path.display(), scenarios.len()));
        for scenario in scenarios {
            self.ctx.blank();
            self.ctx.header(&scenario.name);
            self.ctx.kv("dir:       ", &scenario.options.dir.display().to_string());
            if let Some(var) = &scenario.workspace_var {
                self.ctx.kv("id var:    ", var);
            }
            match &scenario.poll {
                Some(poll) => self.ctx.kv(
                    "poll:      ",
                    &format!(
                        "{} (up to {} probes, at most {} of waiting)",
                        poll.resource_output,
                        poll.max_attempts,
                        format_duration(poll.worst_case_wait())
                    ),
                ),
                None => self.ctx.kv("poll:      ", "not configured"),
            }
            self.ctx
                .kv("assertions:", &scenario.assertions.len().to_string());
            for assertion in &scenario.assertions {
                self.ctx.kv("           ", &assertion.describe());
            }
        }
    }

    /// Render a finished suite: one line per passing scenario, stage detail
    /// for failing ones, then leaked resources and a summary.
    pub fn render_report(&self, report: &SuiteReport) {
        self.ctx.blank();
        self.ctx.header("Results");
        for result in &report.results {
            self.render_result(result);
        }

        let leaked: Vec<&TestResult> = report.cleanup_failures().collect();
        if !leaked.is_empty() {
            self.ctx.alarm("LEAKED RESOURCES");
            for result in leaked {
                let location = result.retained_workspace.as_ref().map_or_else(
                    || "workspace not retained".to_string(),
                    |p| format!("state retained at {}", p.display()),
                );
                self.ctx.error(&format!(
                    "{} ({}): {location}",
                    result.scenario,
                    result.workspace_id.as_deref().unwrap_or("no workspace"),
                ));
                self.ctx.error(&format!("    {}", stage_summary(&result.destroy)));
                if let Some(path) = &result.retained_workspace {
                    self.ctx
                        .error(&format!("    retry with: infracheck destroy {}", path.display()));
                }
            }
        }

        self.ctx.blank();
        let passed = report.results.len() - report.failed_count();
        let summary = format!(
            "{passed} passed, {} failed, {} leaked in {}",
            report.failed_count(),
            report.cleanup_failures().count(),
            format_duration(report.duration)
        );
        if report.passed() {
            self.ctx.success(&summary);
        } else {
            self.ctx.warn(&summary);
        }
    }

    fn render_result(&self, result: &TestResult) {
        let line = format!(
            "{} ({})",
            result.scenario.style(self.ctx.styles.scenario),
            format_duration(result.duration)
        );
        if result.passed() {
            self.ctx.success(&line);
            return;
        }
        self.ctx.warn(&line);
        self.ctx.kv("    apply:  ", &stage_summary(&result.apply));
        self.ctx.kv("    poll:   ", &stage_summary(&result.poll));
        if result.assertions.is_empty() {
            self.ctx.kv("    assert: ", assertions_placeholder(result));
        } else {
            let failed = result.assertions.iter().filter(|a| !a.passed).count();
            self.ctx.kv(
                "    assert: ",
                &format!("{failed} of {} failed", result.assertions.len()),
            );
            for outcome in result.assertions.iter().filter(|a| !a.passed) {
                self.ctx.kv(
                    "            ",
                    &format!(
                        "{}: {}",
                        outcome.description,
                        outcome.message.as_deref().unwrap_or("failed")
                    ),
                );
            }
        }
        self.ctx.kv("    destroy:", &stage_summary(&result.destroy));
    }
}

fn assertions_placeholder(result: &TestResult) -> &'static str {
    let verified = result.apply.is_passed()
        && matches!(
            result.poll,
            StageOutcome::Passed { .. } | StageOutcome::NotConfigured
        );
    if verified { "none configured" } else { "skipped" }
}

/// One-line description of a stage outcome. Failure messages are kept
/// verbatim.
#[must_use]
pub fn stage_summary(outcome: &StageOutcome) -> String {
    match outcome {
        StageOutcome::Passed { attempts } => match attempts {
            0 => "passed (nothing to do)".to_string(),
            1 => "passed".to_string(),
            n => format!("passed after {n} attempts"),
        },
        StageOutcome::Failed {
            kind,
            message,
            attempts,
        } => {
            let label = kind_label(*kind);
            if *attempts > 0 {
                format!("failed [{label}, {attempts} attempts]: {message}")
            } else {
                format!("failed [{label}]: {message}")
            }
        }
        StageOutcome::Skipped => "skipped".to_string(),
        StageOutcome::NotConfigured => "not configured".to_string(),
    }
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::TransientExhausted => "transient, retries exhausted",
        FailureKind::Permanent => "permanent",
        FailureKind::Workspace => "workspace",
        FailureKind::MissingOutput => "missing output",
        FailureKind::ReadinessTimeout => "readiness timeout",
        FailureKind::Deadline => "deadline",
        FailureKind::Cancelled => "cancelled",
        FailureKind::Panicked => "panicked",
        FailureKind::Cleanup => "cleanup",
    }
}

/// Compact duration: `1h 5m`, `4m 10s`, `12s` or `850ms`.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if secs > 0 {
        format!("{secs}s")
    } else {
        format!("{}ms", d.as_millis())
    }
}
