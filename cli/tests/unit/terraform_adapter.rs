//! Tests for the Terraform and AWS CLI adapters over a recording runner.

#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::process::Output;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use infracheck_cli::application::ports::{
    CommandRunner, ProvisioningTool, ReadinessProbe, ResourceRef,
};
use infracheck_cli::domain::{ProvisioningOptions, ToolFlags};
use infracheck_cli::infra::aws::AwsElbProbe;
use infracheck_cli::infra::terraform::{TerraformCli, VAR_FILE};

use crate::helpers::{err_output, ok_output};

/// Runner that records every invocation and replays canned outputs.
struct RecordingRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    outputs: Mutex<VecDeque<Result<Output>>>,
}

impl RecordingRunner {
    fn new(outputs: Vec<Result<Output>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outputs: Mutex::new(outputs.into()),
        }
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("lock").clone()
    }
}

impl CommandRunner for &RecordingRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, Duration::from_secs(1)).await
    }

    async fn run_with_timeout(&self, program: &str, args: &[&str], _: Duration) -> Result<Output> {
        self.calls.lock().expect("lock").push((
            program.to_string(),
            args.iter().map(ToString::to_string).collect(),
        ));
        self.outputs
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Ok(ok_output(b"")))
    }

    async fn run_until(
        &self,
        program: &str,
        args: &[&str],
        stop: &CancellationToken,
    ) -> Result<Output> {
        if stop.is_cancelled() {
            anyhow::bail!("{program} interrupted");
        }
        self.run(program, args).await
    }
}

// ── Terraform ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn apply_writes_var_file_then_invokes_the_configured_binary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = ProvisioningOptions::new(dir.path())
        .with_var("name", "test-lb")
        .with_var("internal", true)
        .with_var("run_id", "infracheck-0000000000000001");
    let runner = RecordingRunner::new(Vec::new());
    let tool = TerraformCli::new(&runner, "tofu");

    tool.apply(&options, &CancellationToken::new())
        .await
        .expect("apply");

    let body = std::fs::read_to_string(dir.path().join(VAR_FILE)).expect("var file");
    let vars: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert_eq!(vars["name"], "test-lb");
    assert_eq!(vars["internal"], true);
    assert_eq!(vars["run_id"], "infracheck-0000000000000001");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "tofu");
    assert_eq!(calls[0].1[0], format!("-chdir={}", dir.path().display()));
    assert_eq!(calls[0].1[1], "apply");
    assert!(calls[0].1.contains(&format!("-var-file={VAR_FILE}")));
}

#[tokio::test]
async fn apply_is_interruptible_through_the_stop_token() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::new(Vec::new());
    let tool = TerraformCli::new(&runner, "terraform");
    let stop = CancellationToken::new();
    stop.cancel();

    let err = tool
        .apply(&ProvisioningOptions::new(dir.path()), &stop)
        .await
        .expect_err("stopped");

    let rendered = format!("{err:#}");
    assert!(rendered.starts_with("terraform apply"), "{rendered}");
    assert!(rendered.contains("interrupted"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn destroy_passes_the_same_variables_as_apply() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = ProvisioningOptions::new(dir.path())
        .with_var("name", "test-lb")
        .with_flags(ToolFlags {
            no_color: true,
            lock: false,
            ..ToolFlags::default()
        });
    let runner = RecordingRunner::new(Vec::new());
    let tool = TerraformCli::new(&runner, "terraform");

    tool.destroy(&options).await.expect("destroy");

    assert!(dir.path().join(VAR_FILE).exists());
    let args = &runner.calls()[0].1;
    assert_eq!(args[1], "destroy");
    assert!(args.iter().any(|a| a == "-auto-approve"));
    assert!(args.iter().any(|a| a == "-no-color"));
    assert!(args.iter().any(|a| a == "-lock=false"));
}

#[tokio::test]
async fn non_zero_exit_is_returned_not_raised() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::new(vec![Ok(err_output(1, b"Error: Invalid provider"))]);
    let tool = TerraformCli::new(&runner, "terraform");

    let output = tool
        .init(&ProvisioningOptions::new(dir.path()))
        .await
        .expect("ran to completion");

    assert!(!output.status.success());
    assert_eq!(output.stderr, b"Error: Invalid provider");
}

#[tokio::test]
async fn runner_errors_name_the_operation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::new(vec![Err(anyhow::anyhow!(
        "terraform timed out after 1800s"
    ))]);
    let tool = TerraformCli::new(&runner, "terraform");

    let err = tool
        .output(&ProvisioningOptions::new(dir.path()))
        .await
        .expect_err("timeout");

    let rendered = format!("{err:#}");
    assert!(rendered.starts_with("terraform output"), "{rendered}");
    assert!(rendered.contains("timed out after 1800s"));
}

#[tokio::test]
async fn initialised_once_provider_cache_or_state_exists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = ProvisioningOptions::new(dir.path());
    let runner = RecordingRunner::new(Vec::new());
    let tool = TerraformCli::new(&runner, "terraform");

    assert!(!tool.is_initialized(&options));
    std::fs::write(dir.path().join("terraform.tfstate"), "{}").expect("write");
    assert!(tool.is_initialized(&options));

    let other = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(other.path().join(".terraform")).expect("mkdir");
    assert!(tool.is_initialized(&ProvisioningOptions::new(other.path())));
}

// ── AWS readiness probe ──────────────────────────────────────────────────────

fn balancer() -> ResourceRef {
    ResourceRef {
        id: "test-lb".to_string(),
        region: "eu-west-1".to_string(),
    }
}

fn describe(state: &str) -> Output {
    ok_output(
        format!(r#"{{"LoadBalancers":[{{"LoadBalancerName":"test-lb","State":{{"Code":"{state}"}}}}]}}"#)
            .as_bytes(),
    )
}

#[tokio::test]
async fn active_balancer_is_ready() {
    let runner = RecordingRunner::new(vec![Ok(describe("provisioning")), Ok(describe("active"))]);
    let probe = AwsElbProbe::new(&runner, "aws");

    assert!(!probe.is_ready(&balancer()).await.expect("probe"));
    assert!(probe.is_ready(&balancer()).await.expect("probe"));

    let calls = runner.calls();
    assert_eq!(calls[0].0, "aws");
    assert_eq!(
        calls[0].1,
        vec![
            "elbv2",
            "describe-load-balancers",
            "--names",
            "test-lb",
            "--region",
            "eu-west-1",
            "--output",
            "json"
        ]
    );
}

#[tokio::test]
async fn unknown_balancer_is_not_ready_yet() {
    let runner = RecordingRunner::new(vec![Ok(err_output(
        254,
        b"An error occurred (LoadBalancerNotFound) when calling the DescribeLoadBalancers operation",
    ))]);
    let probe = AwsElbProbe::new(&runner, "aws");

    assert!(!probe.is_ready(&balancer()).await.expect("probe"));
}

#[tokio::test]
async fn other_cli_failures_are_probe_errors() {
    let runner = RecordingRunner::new(vec![Ok(err_output(
        255,
        b"Unable to locate credentials. You can configure credentials by running \"aws configure\".",
    ))]);
    let probe = AwsElbProbe::new(&runner, "aws");

    let err = probe.is_ready(&balancer()).await.expect_err("no credentials");
    assert!(err.to_string().contains("Unable to locate credentials"));
}
