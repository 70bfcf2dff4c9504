//! Infrastructure implementation of the `ReadinessProbe` port.
//!
//! `AwsElbProbe<R>` asks the AWS CLI for the state of an Elastic Load
//! Balancer and reports ready once it is `active`.

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::application::ports::{CommandRunner, ReadinessProbe, ResourceRef};

/// Readiness probe for ELBv2 load balancers.
pub struct AwsElbProbe<R: CommandRunner> {
    runner: R,
    binary: String,
}

impl<R: CommandRunner> AwsElbProbe<R> {
    pub fn new(runner: R, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }
}

impl<R: CommandRunner> ReadinessProbe for AwsElbProbe<R> {
    async fn is_ready(&self, resource: &ResourceRef) -> Result<bool> {
        let args = describe_args(resource);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run(&self.binary, &args)
            .await
            .with_context(|| format!("{} elbv2 describe-load-balancers", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Freshly created balancers can be briefly invisible.
            if stderr.contains("LoadBalancerNotFound") {
                return Ok(false);
            }
            bail!("describe-load-balancers failed: {}", stderr.trim());
        }
        parse_state(&output.stdout).map(|state| state.as_deref() == Some("active"))
    }
}

/// Arguments for `aws elbv2 describe-load-balancers`. ARNs and names are
/// looked up through different options.
#[must_use]
pub fn describe_args(resource: &ResourceRef) -> Vec<String> {
    let selector = if resource.id.starts_with("arn:") {
        "--load-balancer-arns"
    } else {
        "--names"
    };
    vec![
        "elbv2".to_string(),
        "describe-load-balancers".to_string(),
        selector.to_string(),
        resource.id.clone(),
        "--region".to_string(),
        resource.region.clone(),
        "--output".to_string(),
        "json".to_string(),
    ]
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResponse {
    #[serde(default)]
    load_balancers: Vec<LoadBalancer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancer {
    state: Option<LbState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LbState {
    code: String,
}

/// State code of the first load balancer in a describe response.
///
/// # Errors
///
/// Returns an error if the document is not a describe response.
pub fn parse_state(stdout: &[u8]) -> Result<Option<String>> {
    let response: DescribeResponse =
        serde_json::from_slice(stdout).context("parsing describe-load-balancers output")?;
    Ok(response
        .load_balancers
        .into_iter()
        .next()
        .and_then(|lb| lb.state)
        .map(|s| s.code))
}
