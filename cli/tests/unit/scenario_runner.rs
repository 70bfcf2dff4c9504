//! Tests for `ScenarioRunner`: stage sequencing, failure capture and the
//! destroy guarantee.

#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::time::Duration;

use infracheck_cli::application::services::ScenarioRunner;
use infracheck_cli::domain::{
    Assertion, EngineConfig, FailureKind, PollConfig, ProvisioningOptions, Scenario, Stage,
    StageOutcome,
};
use infracheck_common::VarValue;
use tokio_util::sync::CancellationToken;

use crate::helpers::{LB_OUTPUTS, engine_config, err_output, throttled};
use crate::mocks::{
    MemoryWorkspaces, Probe, RecordingReporter, ScriptedProbe, ScriptedTool, Step,
};

fn lb_scenario() -> Scenario {
    Scenario::new(
        "lb-network",
        ProvisioningOptions::new("/suites/modules/lb")
            .with_var("name", "test-lb")
            .with_var("load_balancer_type", "network"),
    )
    .with_poll(PollConfig::new("load_balancer_id", 10, Duration::from_secs(30)))
    .with_assertion(Assertion::Equals {
        output: "load_balancer_type".to_string(),
        expected: "network".to_string(),
    })
    .with_assertion(Assertion::HasKeys {
        output: "target_group_arns".to_string(),
        keys: vec!["tcp".to_string(), "tls".to_string()],
    })
}

fn failed_kind(outcome: &StageOutcome) -> Option<FailureKind> {
    match outcome {
        StageOutcome::Failed { kind, .. } => Some(*kind),
        _ => None,
    }
}

/// Stubs plus config for one test; the runner borrows from here.
struct Harness {
    tool: ScriptedTool,
    probe: ScriptedProbe,
    workspaces: MemoryWorkspaces,
    reporter: RecordingReporter,
    config: EngineConfig,
}

impl Harness {
    fn new(tool: ScriptedTool, probe: ScriptedProbe) -> Self {
        Self {
            tool,
            probe,
            workspaces: MemoryWorkspaces::new(),
            reporter: RecordingReporter::new(),
            config: engine_config(),
        }
    }

    fn runner(
        &self,
        cancel: CancellationToken,
    ) -> ScenarioRunner<'_, ScriptedTool, ScriptedProbe, MemoryWorkspaces, RecordingReporter>
    {
        ScenarioRunner::new(
            &self.tool,
            &self.probe,
            &self.workspaces,
            &self.reporter,
            &self.config,
            cancel,
        )
    }
}

// ── Happy paths ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn passes_when_ready_on_third_probe() {
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::ready_after(2),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(result.apply, StageOutcome::Passed { attempts: 1 });
    assert_eq!(result.poll, StageOutcome::Passed { attempts: 3 });
    assert_eq!(result.assertions.len(), 2);
    assert!(result.destroy.is_passed());
    assert!(result.duration >= Duration::from_secs(60));
    assert_eq!(h.probe.call_count(), 3);
    assert_eq!(
        h.tool.calls(),
        vec!["init", "apply", "output", "init", "destroy"]
    );
    assert_eq!(h.workspaces.released(), vec![(h.workspaces.acquired()[0].clone(), false)]);
    assert!(result.retained_workspace.is_none());
}

#[tokio::test(start_paused = true)]
async fn probes_the_resource_named_by_the_poll_output() {
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::ready_after(0),
    );

    h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    let probed = h.probe.resources();
    assert_eq!(probed.len(), 1);
    assert!(probed[0].id.ends_with("loadbalancer/net/test-lb/50dc6c495c0c9188"));
    assert_eq!(probed[0].region, h.config.region);
}

#[tokio::test(start_paused = true)]
async fn transient_apply_failures_then_success_passes() {
    let h = Harness::new(
        ScriptedTool::new()
            .with_apply(vec![Step::Out(throttled()), Step::Out(throttled())])
            .with_outputs(LB_OUTPUTS),
        ScriptedProbe::ready_after(0),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(result.apply, StageOutcome::Passed { attempts: 3 });
    assert_eq!(h.tool.count("apply"), 3);
    assert!(result.assertions.iter().all(|a| a.passed));
}

#[tokio::test(start_paused = true)]
async fn scenario_without_poll_skips_straight_to_assertions() {
    let mut scenario = lb_scenario();
    scenario.poll = None;
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::never_ready(),
    );

    let result = h.runner(CancellationToken::new()).run(&scenario).await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(result.poll, StageOutcome::NotConfigured);
    assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn workspace_id_is_passed_as_a_variable() {
    let scenario = lb_scenario().with_workspace_var("run_id");
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::ready_after(0),
    );

    let result = h.runner(CancellationToken::new()).run(&scenario).await;

    let id = result.workspace_id.expect("workspace id");
    let seen = h.tool.seen_options();
    assert!(!seen.is_empty());
    for options in seen {
        assert_eq!(options.vars.get("run_id"), Some(&VarValue::from(id.as_str())));
        assert!(options.dir.starts_with(PathBuf::from("/ws").join(&id)));
    }
}

// ── Failures are captured, destroy still runs ────────────────────────────────

#[tokio::test(start_paused = true)]
async fn assertion_mismatch_fails_only_that_assertion() {
    let outputs = LB_OUTPUTS.replace(r#""value": "network""#, r#""value": "application""#);
    let h = Harness::new(
        ScriptedTool::new().with_outputs(&outputs),
        ScriptedProbe::ready_after(0),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert!(!result.passed());
    assert_eq!(result.failed_stages(), vec![Stage::Assert]);
    let failed: Vec<_> = result.assertions.iter().filter(|a| !a.passed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].description, "load_balancer_type equals 'network'");
    assert_eq!(
        failed[0].message.as_deref(),
        Some("expected 'network', got 'application'")
    );
    assert!(result.destroy.is_passed());
}

#[tokio::test(start_paused = true)]
async fn exhausted_apply_skips_poll_and_assertions_but_destroys() {
    let h = Harness::new(
        ScriptedTool::new().with_apply(vec![Step::Out(throttled()); 3]),
        ScriptedProbe::ready_after(0),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert_eq!(failed_kind(&result.apply), Some(FailureKind::TransientExhausted));
    let StageOutcome::Failed { message, attempts, .. } = &result.apply else {
        panic!("apply should fail");
    };
    assert_eq!(*attempts, 3);
    assert!(message.contains("RequestLimitExceeded"));
    assert_eq!(result.poll, StageOutcome::Skipped);
    assert!(result.assertions.is_empty());
    assert!(result.destroy.is_passed());
    assert_eq!(h.tool.count("destroy"), 1);
    assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn permanent_apply_failure_is_reported_verbatim() {
    let h = Harness::new(
        ScriptedTool::new().with_apply(vec![Step::Out(err_output(
            1,
            b"Error: creating ELBv2 Load Balancer: ValidationError: At least two subnets in two different Availability Zones must be specified",
        ))]),
        ScriptedProbe::ready_after(0),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    let StageOutcome::Failed { kind, message, attempts } = &result.apply else {
        panic!("apply should fail");
    };
    assert_eq!(*kind, FailureKind::Permanent);
    assert_eq!(*attempts, 1);
    assert!(message.contains("At least two subnets in two different Availability Zones"));
    assert!(result.destroy.is_passed());
}

#[tokio::test(start_paused = true)]
async fn poll_timeout_skips_assertions_and_destroys() {
    let mut scenario = lb_scenario();
    scenario.poll = Some(PollConfig::new("load_balancer_id", 3, Duration::from_secs(30)));
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::never_ready(),
    );

    let result = h.runner(CancellationToken::new()).run(&scenario).await;

    assert_eq!(failed_kind(&result.poll), Some(FailureKind::ReadinessTimeout));
    assert!(result.assertions.is_empty());
    assert!(result.destroy.is_passed());
    assert_eq!(h.probe.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_poll_output_fails_poll_without_probing() {
    let h = Harness::new(ScriptedTool::new(), ScriptedProbe::ready_after(0));

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert_eq!(failed_kind(&result.poll), Some(FailureKind::MissingOutput));
    assert_eq!(h.probe.call_count(), 0);
    assert!(result.destroy.is_passed());
}

#[tokio::test(start_paused = true)]
async fn panicking_probe_still_destroys() {
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::new(vec![Probe::Panic]),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    let StageOutcome::Failed { kind, message, .. } = &result.poll else {
        panic!("poll should fail");
    };
    assert_eq!(*kind, FailureKind::Panicked);
    assert!(message.contains("probe exploded"));
    assert!(result.destroy.is_passed());
    assert_eq!(h.tool.count("destroy"), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_apply_and_still_destroys() {
    let mut h = Harness::new(
        ScriptedTool::new().with_apply(vec![Step::Hang]),
        ScriptedProbe::ready_after(0),
    );
    h.config.scenario_timeout = Duration::from_secs(600);

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert_eq!(failed_kind(&result.apply), Some(FailureKind::Deadline));
    assert_eq!(result.poll, StageOutcome::Skipped);
    assert!(result.destroy.is_passed());
    // The tool is told to stop and finishes before destroy reads its state.
    assert_eq!(
        h.tool.calls(),
        vec!["init", "apply", "apply interrupted", "init", "destroy"]
    );
    assert!(result.duration >= Duration::from_secs(600));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_apply_before_destroy() {
    let h = Harness::new(
        ScriptedTool::new().with_apply(vec![Step::Hang]),
        ScriptedProbe::ready_after(0),
    );
    let cancel = CancellationToken::new();
    let runner = h.runner(cancel.clone());
    let scenario = lb_scenario();

    let (result, ()) = tokio::join!(runner.run(&scenario), async {
        tokio::time::sleep(Duration::from_secs(45)).await;
        cancel.cancel();
    });

    let StageOutcome::Failed { kind, message, .. } = &result.apply else {
        panic!("apply should fail");
    };
    assert_eq!(*kind, FailureKind::Cancelled);
    assert_eq!(message, "suite cancelled");
    assert!(result.destroy.is_passed());
    assert_eq!(
        h.tool.calls(),
        vec!["init", "apply", "apply interrupted", "init", "destroy"]
    );
    assert!(result.duration < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn stage_ignoring_the_interrupt_is_abandoned_after_grace() {
    let mut h = Harness::new(
        ScriptedTool::new().with_output_step(Step::Hang),
        ScriptedProbe::ready_after(0),
    );
    h.config.scenario_timeout = Duration::from_secs(600);
    h.config.interrupt_grace = Duration::from_secs(60);

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert_eq!(failed_kind(&result.apply), Some(FailureKind::Deadline));
    assert!(result.destroy.is_passed());
    assert_eq!(h.tool.calls().last(), Some(&"destroy"));
    // Deadline, then grace plus the unwind margin.
    assert!(result.duration >= Duration::from_secs(690));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_poll_and_still_destroys() {
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::never_ready(),
    );
    let cancel = CancellationToken::new();
    let runner = h.runner(cancel.clone());
    let scenario = lb_scenario();

    let (result, ()) = tokio::join!(runner.run(&scenario), async {
        tokio::time::sleep(Duration::from_secs(45)).await;
        cancel.cancel();
    });

    assert!(result.apply.is_passed());
    assert_eq!(failed_kind(&result.poll), Some(FailureKind::Cancelled));
    assert!(result.assertions.is_empty());
    assert!(result.destroy.is_passed());
    assert_eq!(h.probe.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_suite_does_not_start_new_scenarios() {
    let h = Harness::new(ScriptedTool::new(), ScriptedProbe::ready_after(0));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h.runner(cancel).run(&lb_scenario()).await;

    assert_eq!(failed_kind(&result.apply), Some(FailureKind::Cancelled));
    assert_eq!(result.destroy, StageOutcome::Skipped);
    assert!(h.tool.calls().is_empty());
    assert!(h.workspaces.acquired().is_empty());
}

#[tokio::test(start_paused = true)]
async fn workspace_failure_fails_apply_without_touching_the_tool() {
    let mut h = Harness::new(ScriptedTool::new(), ScriptedProbe::ready_after(0));
    h.workspaces = MemoryWorkspaces::failing();

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    let StageOutcome::Failed { kind, message, .. } = &result.apply else {
        panic!("apply should fail");
    };
    assert_eq!(*kind, FailureKind::Workspace);
    assert!(message.contains("No space left on device"));
    assert_eq!(result.destroy, StageOutcome::Skipped);
    assert!(h.tool.calls().is_empty());
}

// ── Cleanup failure ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn destroy_failure_retains_workspace_and_flags_leak() {
    let h = Harness::new(
        ScriptedTool::new()
            .with_outputs(LB_OUTPUTS)
            .with_destroy(vec![Step::Out(err_output(
                1,
                b"Error: deleting ELBv2 Load Balancer: OperationNotPermitted: deletion protection is enabled",
            ))]),
        ScriptedProbe::ready_after(0),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    assert!(result.leaked());
    assert_eq!(failed_kind(&result.destroy), Some(FailureKind::Cleanup));
    let id = result.workspace_id.clone().expect("workspace id");
    assert_eq!(h.workspaces.released(), vec![(id.clone(), true)]);
    assert_eq!(
        result.retained_workspace,
        Some(PathBuf::from("/ws").join(&id))
    );
    assert_eq!(result.failed_stages(), vec![Stage::Destroy]);
}

#[tokio::test(start_paused = true)]
async fn panicking_destroy_is_a_cleanup_failure() {
    let h = Harness::new(
        ScriptedTool::new()
            .with_outputs(LB_OUTPUTS)
            .with_destroy(vec![Step::Panic("state file corrupted")]),
        ScriptedProbe::ready_after(0),
    );

    let result = h.runner(CancellationToken::new()).run(&lb_scenario()).await;

    let StageOutcome::Failed { kind, message, .. } = &result.destroy else {
        panic!("destroy should fail");
    };
    assert_eq!(*kind, FailureKind::Cleanup);
    assert!(message.contains("state file corrupted"));
    assert!(result.retained_workspace.is_some());
}

// ── Suites ───────────────────────────────────────────────────────────────────

fn slow_scenarios() -> Vec<Scenario> {
    ["a", "b", "c"]
        .into_iter()
        .map(|name| {
            Scenario::new(name, ProvisioningOptions::new(format!("/suites/{name}")))
                .with_poll(PollConfig::new("load_balancer_id", 2, Duration::from_secs(30)))
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn suite_results_keep_input_order() {
    let h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::never_ready(),
    );

    let report = h.runner(CancellationToken::new()).run_all(&slow_scenarios()).await;

    let names: Vec<&str> = report.results.iter().map(|r| r.scenario.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(report.failed_count(), 3);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenarios_run_concurrently_up_to_the_limit() {
    let mut h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::never_ready(),
    );
    h.config.parallelism = 3;
    let report = h.runner(CancellationToken::new()).run_all(&slow_scenarios()).await;
    assert_eq!(report.duration, Duration::from_secs(30));

    let mut h = Harness::new(
        ScriptedTool::new().with_outputs(LB_OUTPUTS),
        ScriptedProbe::never_ready(),
    );
    h.config.parallelism = 1;
    let report = h.runner(CancellationToken::new()).run_all(&slow_scenarios()).await;
    assert_eq!(report.duration, Duration::from_secs(90));
}

#[tokio::test(start_paused = true)]
async fn one_leak_sets_the_alarm_exit_code() {
    let h = Harness::new(
        ScriptedTool::new()
            .with_outputs(LB_OUTPUTS)
            .with_destroy(vec![Step::Out(err_output(1, b"Error: DependencyViolation"))]),
        ScriptedProbe::ready_after(0),
    );
    let mut scenarios = slow_scenarios();
    for s in &mut scenarios {
        s.poll = None;
    }

    let report = h.runner(CancellationToken::new()).run_all(&scenarios).await;

    assert_eq!(report.cleanup_failures().count(), 1);
    assert_eq!(report.exit_code(), 3);
    assert!(
        h.reporter
            .messages()
            .iter()
            .any(|m| m.starts_with("warn: ") && m.ends_with("failed (destroy)"))
    );
}
