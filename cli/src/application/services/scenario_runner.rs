//! Scenario runner: one end-to-end scenario with guaranteed destroy, and
//! whole suites run concurrently.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//!
//! Lifecycle of one scenario:
//! acquire workspace → apply → poll (optional) → assertions → destroy →
//! release workspace. Apply, poll and assertions run under the scenario
//! deadline and the suite cancellation token, with panics caught. When either
//! fires, the in-flight tool is interrupted and given `interrupt_grace` to
//! record what it created before destroy runs. Destroy runs whenever apply was
//! attempted and is bounded only by its own retry budget.

use std::any::Any;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use infracheck_common::OutputSet;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::application::ports::{
    ProgressReporter, ProvisioningTool, ReadinessProbe, ResourceRef, Workspace,
    WorkspaceProvider,
};
use crate::application::services::provisioning::ProvisioningDriver;
use crate::application::services::readiness::wait_until_ready;
use crate::domain::{
    AssertionOutcome, EngineConfig, FailureKind, PollConfig, ProvisioningOptions, Scenario,
    Stage, StageOutcome, SuiteReport, TestResult, evaluate_all,
};

/// Extra time past the tool's grace period for the interrupted stage to
/// unwind before it is abandoned.
const UNWIND_MARGIN: Duration = Duration::from_secs(30);

// ── Stage ledger ─────────────────────────────────────────────────────────────

/// Stage outcomes recorded as the guarded phases progress, so an interrupted
/// run still knows which stage was in flight.
struct Progress {
    current: Option<Stage>,
    apply_attempted: bool,
    apply: StageOutcome,
    poll: StageOutcome,
    assertions: Vec<AssertionOutcome>,
}

struct Ledger(RefCell<Progress>);

impl Ledger {
    fn new(poll_configured: bool) -> Self {
        Self(RefCell::new(Progress {
            current: None,
            apply_attempted: false,
            apply: StageOutcome::Skipped,
            poll: if poll_configured {
                StageOutcome::Skipped
            } else {
                StageOutcome::NotConfigured
            },
            assertions: Vec::new(),
        }))
    }

    fn begin(&self, stage: Stage) {
        let mut p = self.0.borrow_mut();
        p.current = Some(stage);
        if stage == Stage::Apply {
            p.apply_attempted = true;
        }
    }

    fn finish_apply(&self, outcome: StageOutcome) {
        let mut p = self.0.borrow_mut();
        p.apply = outcome;
        p.current = None;
    }

    fn finish_poll(&self, outcome: StageOutcome) {
        let mut p = self.0.borrow_mut();
        p.poll = outcome;
        p.current = None;
    }

    fn finish_assertions(&self, outcomes: Vec<AssertionOutcome>) {
        let mut p = self.0.borrow_mut();
        p.assertions = outcomes;
        p.current = None;
    }

    /// Mark the in-flight stage failed. Later stages stay skipped.
    fn interrupt(&self, kind: FailureKind, message: &str) {
        let mut p = self.0.borrow_mut();
        match p.current.take().unwrap_or(Stage::Apply) {
            Stage::Apply => p.apply = StageOutcome::failed(kind, message, 0),
            Stage::Poll => p.poll = StageOutcome::failed(kind, message, 0),
            Stage::Assert | Stage::Destroy => p
                .assertions
                .push(AssertionOutcome::fail("assertions", message)),
        }
    }

    fn into_inner(self) -> Progress {
        self.0.into_inner()
    }
}

// ── Runner ───────────────────────────────────────────────────────────────────

/// Runs scenarios against shared, read-only collaborators.
pub struct ScenarioRunner<'a, T, P, W, R> {
    tool: &'a T,
    probe: &'a P,
    workspaces: &'a W,
    reporter: &'a R,
    config: &'a EngineConfig,
    cancel: CancellationToken,
}

impl<'a, T, P, W, R> ScenarioRunner<'a, T, P, W, R>
where
    T: ProvisioningTool,
    P: ReadinessProbe,
    W: WorkspaceProvider,
    R: ProgressReporter,
{
    pub fn new(
        tool: &'a T,
        probe: &'a P,
        workspaces: &'a W,
        reporter: &'a R,
        config: &'a EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tool,
            probe,
            workspaces,
            reporter,
            config,
            cancel,
        }
    }

    /// Run every scenario, at most `config.parallelism` at once.
    ///
    /// Results are returned in input order.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> SuiteReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let permits = Semaphore::new(self.config.parallelism.max(1));
        let permits = &permits;

        let runs = scenarios.iter().map(|scenario| async move {
            let _permit = permits.acquire().await.ok();
            self.run(scenario).await
        });
        let results = join_all(runs).await;

        SuiteReport {
            results,
            started_at,
            duration: clock.elapsed(),
        }
    }

    /// Run one scenario. Never fails: every problem lands in the result.
    pub async fn run(&self, scenario: &Scenario) -> TestResult {
        let span = info_span!("scenario", name = %scenario.name);
        self.run_inner(scenario).instrument(span).await
    }

    async fn run_inner(&self, scenario: &Scenario) -> TestResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut result = TestResult {
            scenario: scenario.name.clone(),
            workspace_id: None,
            apply: StageOutcome::Skipped,
            poll: if scenario.poll.is_some() {
                StageOutcome::Skipped
            } else {
                StageOutcome::NotConfigured
            },
            assertions: Vec::new(),
            destroy: StageOutcome::Skipped,
            retained_workspace: None,
            started_at,
            duration: std::time::Duration::ZERO,
        };

        if self.cancel.is_cancelled() {
            result.apply = StageOutcome::failed(FailureKind::Cancelled, "suite cancelled", 0);
            result.duration = clock.elapsed();
            return result;
        }

        self.reporter
            .step(&format!("{}: preparing workspace", scenario.name));
        let workspace = match self.workspaces.acquire(scenario).await {
            Ok(ws) => ws,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Could not prepare workspace");
                result.apply = StageOutcome::failed(FailureKind::Workspace, format!("{e:#}"), 0);
                result.duration = clock.elapsed();
                self.reporter
                    .warn(&format!("{}: could not prepare workspace", scenario.name));
                return result;
            }
        };
        result.workspace_id = Some(workspace.id.clone());
        info!(workspace = %workspace.id, root = %workspace.root.display(), "Workspace ready");

        let ledger = Ledger::new(scenario.poll.is_some());
        let interrupted = self.guarded(scenario, &workspace.options, &ledger).await;
        if let Some((kind, message)) = interrupted {
            warn!(?kind, %message, "Scenario interrupted");
            ledger.interrupt(kind, &message);
        }

        let progress = ledger.into_inner();
        result.apply = progress.apply;
        result.poll = progress.poll;
        result.assertions = progress.assertions;

        if progress.apply_attempted {
            result.destroy = self.destroy(scenario, &workspace).await;
        }

        let retain = result.destroy.is_failed();
        match self.workspaces.release(workspace, retain).await {
            Ok(path) => result.retained_workspace = path,
            Err(e) => warn!(error = %format!("{e:#}"), "Could not release workspace"),
        }

        result.duration = clock.elapsed();
        if result.passed() {
            self.reporter.success(&format!("{}: passed", scenario.name));
        } else {
            let stages: Vec<String> = result.failed_stages().iter().map(ToString::to_string).collect();
            self.reporter.warn(&format!(
                "{}: failed ({})",
                scenario.name,
                if stages.is_empty() { "incomplete".to_string() } else { stages.join(", ") }
            ));
        }
        result
    }

    /// Run the guarded stages under the deadline and the suite token.
    ///
    /// On interruption the stages are told to stop and awaited for the tool's
    /// grace period, so an apply in flight can record its state. Returns why
    /// the stages were cut short, if they were.
    async fn guarded(
        &self,
        scenario: &Scenario,
        options: &ProvisioningOptions,
        ledger: &Ledger,
    ) -> Option<(FailureKind, String)> {
        let stop = self.cancel.child_token();
        let stages = AssertUnwindSafe(self.provision_and_verify(scenario, options, ledger, &stop))
            .catch_unwind();
        tokio::pin!(stages);
        let deadline = tokio::time::sleep(self.config.scenario_timeout);
        tokio::pin!(deadline);

        let interrupted = tokio::select! {
            biased;
            () = self.cancel.cancelled() => (FailureKind::Cancelled, "suite cancelled".to_string()),
            () = &mut deadline => (
                FailureKind::Deadline,
                format!(
                    "scenario deadline of {}s elapsed",
                    self.config.scenario_timeout.as_secs()
                ),
            ),
            outcome = &mut stages => {
                return outcome
                    .err()
                    .map(|panic| (FailureKind::Panicked, panic_message(panic.as_ref())));
            }
        };

        stop.cancel();
        let unwind = self.config.interrupt_grace + UNWIND_MARGIN;
        match tokio::time::timeout(unwind, &mut stages).await {
            Ok(Ok(())) => info!("Interrupted stage stopped"),
            Ok(Err(panic)) => warn!(message = %panic_message(panic.as_ref()), "Interrupted stage panicked"),
            Err(_) => warn!(
                unwind_secs = unwind.as_secs(),
                "Interrupted stage did not stop in time, abandoning it"
            ),
        }
        Some(interrupted)
    }

    /// Apply, poll and assert. Records each stage in `ledger` as it goes and
    /// returns with the current stage still open once `stop` fires.
    async fn provision_and_verify(
        &self,
        scenario: &Scenario,
        options: &ProvisioningOptions,
        ledger: &Ledger,
        stop: &CancellationToken,
    ) {
        let driver = self.driver().with_stop(stop.clone());

        ledger.begin(Stage::Apply);
        self.reporter.step(&format!("{}: applying", scenario.name));
        let applied = driver.apply(options).await;
        if stop.is_cancelled() {
            return;
        }
        let applied = match applied {
            Ok(applied) => {
                ledger.finish_apply(StageOutcome::Passed {
                    attempts: applied.attempts.last().map_or(1, |a| a.attempt),
                });
                applied
            }
            Err(failure) => {
                ledger.finish_apply(StageOutcome::failed(
                    failure.kind(),
                    failure.to_string(),
                    failure.attempt_count(),
                ));
                return;
            }
        };

        if let Some(poll) = &scenario.poll {
            ledger.begin(Stage::Poll);
            self.reporter
                .step(&format!("{}: waiting for {}", scenario.name, poll.resource_output));
            let outcome = tokio::select! {
                biased;
                () = stop.cancelled() => return,
                outcome = self.poll(poll, &applied.outputs) => outcome,
            };
            let ready = outcome.is_passed();
            ledger.finish_poll(outcome);
            if !ready {
                return;
            }
        }

        ledger.begin(Stage::Assert);
        ledger.finish_assertions(evaluate_all(&scenario.assertions, &applied.outputs));
    }

    async fn poll(&self, poll: &PollConfig, outputs: &OutputSet) -> StageOutcome {
        let id = match outputs.get(&poll.resource_output) {
            Ok(id) if !id.is_empty() => id.to_string(),
            Ok(_) => {
                return StageOutcome::failed(
                    FailureKind::MissingOutput,
                    format!("output '{}' is empty", poll.resource_output),
                    0,
                );
            }
            Err(e) => return StageOutcome::failed(FailureKind::MissingOutput, e.to_string(), 0),
        };
        let resource = ResourceRef {
            id,
            region: self.config.region.clone(),
        };
        match wait_until_ready(self.probe, &resource, poll).await {
            Ok(summary) => StageOutcome::Passed {
                attempts: summary.attempts,
            },
            Err(e) => StageOutcome::failed(FailureKind::ReadinessTimeout, e.to_string(), e.attempts()),
        }
    }

    /// Destroy outside the deadline and the cancellation token.
    async fn destroy(&self, scenario: &Scenario, workspace: &Workspace) -> StageOutcome {
        self.reporter
            .step(&format!("{}: destroying", scenario.name));
        let driver = self.driver();
        let outcome = AssertUnwindSafe(driver.destroy(&workspace.options))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(destroyed)) => StageOutcome::Passed {
                attempts: destroyed.attempt_count(),
            },
            Ok(Err(failure)) => {
                error!(
                    workspace = %workspace.id,
                    root = %workspace.root.display(),
                    error = %failure,
                    "Destroy failed; provisioned resources may be leaked"
                );
                StageOutcome::failed(
                    FailureKind::Cleanup,
                    failure.to_string(),
                    failure.attempt_count(),
                )
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(workspace = %workspace.id, %message, "Destroy panicked; provisioned resources may be leaked");
                StageOutcome::failed(FailureKind::Cleanup, message, 0)
            }
        }
    }

    fn driver(&self) -> ProvisioningDriver<'a, T> {
        ProvisioningDriver::new(self.tool, &self.config.classifier, &self.config.retry)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
