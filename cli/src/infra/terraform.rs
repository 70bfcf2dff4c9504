//! Infrastructure implementation of the `ProvisioningTool` port.
//!
//! `TerraformCli<R>` routes every Terraform invocation through a
//! `CommandRunner`. Arguments are built by pure functions so they can be
//! checked without spawning anything.

use std::path::Path;
use std::process::Output;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{CommandRunner, ProvisioningTool};
use crate::domain::ProvisioningOptions;

/// Variable file written next to the definition before apply and destroy.
pub const VAR_FILE: &str = "infracheck.tfvars.json";

/// Infrastructure adapter that drives the `terraform` CLI (or a compatible
/// binary such as `tofu`).
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct TerraformCli<R: CommandRunner> {
    runner: R,
    binary: String,
}

impl<R: CommandRunner> TerraformCli<R> {
    pub fn new(runner: R, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    async fn invoke(
        &self,
        args: Vec<String>,
        what: &str,
        stop: Option<&CancellationToken>,
    ) -> Result<Output> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = match stop {
            Some(stop) => self.runner.run_until(&self.binary, &args, stop).await,
            None => self.runner.run(&self.binary, &args).await,
        };
        output.with_context(|| format!("{} {what}", self.binary))
    }
}

impl<R: CommandRunner> ProvisioningTool for TerraformCli<R> {
    async fn init(&self, options: &ProvisioningOptions) -> Result<Output> {
        self.invoke(init_args(options), "init", None).await
    }

    async fn apply(
        &self,
        options: &ProvisioningOptions,
        stop: &CancellationToken,
    ) -> Result<Output> {
        write_var_file(options).await?;
        self.invoke(change_args("apply", options), "apply", Some(stop))
            .await
    }

    async fn output(&self, options: &ProvisioningOptions) -> Result<Output> {
        self.invoke(output_args(options), "output", None).await
    }

    async fn destroy(&self, options: &ProvisioningOptions) -> Result<Output> {
        write_var_file(options).await?;
        self.invoke(change_args("destroy", options), "destroy", None).await
    }

    fn is_initialized(&self, options: &ProvisioningOptions) -> bool {
        is_initialized(&options.dir)
    }
}

/// A directory was initialised if it has a provider cache or local state.
#[must_use]
pub fn is_initialized(dir: &Path) -> bool {
    dir.join(".terraform").exists() || dir.join("terraform.tfstate").exists()
}

async fn write_var_file(options: &ProvisioningOptions) -> Result<()> {
    let path = options.dir.join(VAR_FILE);
    let body = serde_json::to_vec_pretty(&options.vars).context("serializing variables")?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

// ── Argument builders ────────────────────────────────────────────────────────

fn chdir(options: &ProvisioningOptions) -> String {
    format!("-chdir={}", options.dir.display())
}

#[must_use]
pub fn init_args(options: &ProvisioningOptions) -> Vec<String> {
    let mut args = vec![chdir(options), "init".to_string(), "-input=false".to_string()];
    if options.flags.no_color {
        args.push("-no-color".to_string());
    }
    if !options.flags.lock {
        args.push("-lock=false".to_string());
    }
    args
}

/// Arguments for `apply` or `destroy`.
#[must_use]
pub fn change_args(command: &str, options: &ProvisioningOptions) -> Vec<String> {
    let mut args = vec![
        chdir(options),
        command.to_string(),
        "-input=false".to_string(),
        "-auto-approve".to_string(),
        format!("-var-file={VAR_FILE}"),
    ];
    let flags = &options.flags;
    if flags.no_color {
        args.push("-no-color".to_string());
    }
    if flags.compact_warnings {
        args.push("-compact-warnings".to_string());
    }
    if !flags.lock {
        args.push("-lock=false".to_string());
    }
    if let Some(n) = flags.parallelism {
        args.push(format!("-parallelism={n}"));
    }
    args
}

#[must_use]
pub fn output_args(options: &ProvisioningOptions) -> Vec<String> {
    let mut args = vec![chdir(options), "output".to_string(), "-json".to_string()];
    if options.flags.no_color {
        args.push("-no-color".to_string());
    }
    args
}
