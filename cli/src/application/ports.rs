//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::domain::{ProvisioningOptions, Scenario, WorkspaceRecord};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child must not be left running (see [`Self::run_until`]).
    async fn run_with_timeout(&self, program: &str, args: &[&str], timeout: Duration)
    -> Result<Output>;
    /// Run a program that `stop` may end early.
    ///
    /// # Errors
    ///
    /// As [`Self::run`], and also when `stop` fires. A stopped or timed-out
    /// child is first asked to shut down (SIGINT on Unix) and is only killed
    /// once its grace period runs out, so a tool mid-change can record what it
    /// already created.
    async fn run_until(&self, program: &str, args: &[&str], stop: &CancellationToken)
    -> Result<Output>;
}

// ── Provisioning Tool Port ────────────────────────────────────────────────────

/// The external tool that turns a definition into real resources.
///
/// Every operation returns the raw process output. A non-zero exit is not an
/// `Err`; `Err` is reserved for invocations that never completed (spawn
/// failure, timeout).
#[allow(async_fn_in_trait)]
pub trait ProvisioningTool {
    /// Prepare the definition directory (providers, modules, backend).
    async fn init(&self, options: &ProvisioningOptions) -> Result<Output>;
    /// Create or update resources to match the definition. When `stop` fires
    /// the tool is interrupted gracefully and the call returns `Err`.
    async fn apply(&self, options: &ProvisioningOptions, stop: &CancellationToken)
    -> Result<Output>;
    /// Print every output as a JSON document on stdout.
    async fn output(&self, options: &ProvisioningOptions) -> Result<Output>;
    /// Delete every resource recorded in state.
    async fn destroy(&self, options: &ProvisioningOptions) -> Result<Output>;
    /// Whether the directory was ever initialised, i.e. whether there can be
    /// anything to destroy.
    fn is_initialized(&self, options: &ProvisioningOptions) -> bool;
}

// ── Readiness Probe Port ──────────────────────────────────────────────────────

/// A provisioned resource to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Provider-specific id (ARN or name).
    pub id: String,
    pub region: String,
}

/// Asks the cloud provider whether a resource is ready to serve.
#[allow(async_fn_in_trait)]
pub trait ReadinessProbe {
    /// `Ok(false)` means "not yet"; `Err` means the probe itself failed.
    async fn is_ready(&self, resource: &ResourceRef) -> Result<bool>;
}

// ── Workspace Ports ───────────────────────────────────────────────────────────

/// An isolated copy of a scenario's definition, exclusively owned by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    pub id: String,
    /// Directory holding the copied tree.
    pub root: PathBuf,
    /// Options for this run, pointing inside `root`.
    pub options: ProvisioningOptions,
}

/// Creates and releases per-run workspaces.
#[allow(async_fn_in_trait)]
pub trait WorkspaceProvider {
    /// Copy the scenario's definition into a fresh workspace.
    async fn acquire(&self, scenario: &Scenario) -> Result<Workspace>;
    /// Delete the workspace, or keep it on disk when `retain` is set.
    ///
    /// Returns the retained path, if any.
    async fn release(&self, workspace: Workspace, retain: bool) -> Result<Option<PathBuf>>;
}

/// Abstracts workspace record persistence (load/save).
#[allow(async_fn_in_trait)]
pub trait WorkspaceRecordStore {
    /// Load the record of the workspace at `root`, returning `None` if absent.
    async fn load(&self, root: &Path) -> Result<Option<WorkspaceRecord>>;
    /// Persist `record` into the workspace at `root`.
    async fn save(&self, root: &Path, record: &WorkspaceRecord) -> Result<()>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
