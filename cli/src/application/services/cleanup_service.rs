//! Application service: destroy a retained workspace.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::{
    ProgressReporter, ProvisioningTool, Workspace, WorkspaceProvider, WorkspaceRecordStore,
};
use crate::application::services::provisioning::{Destroyed, ProvisioningDriver};
use crate::domain::{EngineConfig, WorkspaceError, validate_workspace_id};

/// Destroy the resources of a workspace kept after a failed destroy, then
/// delete the workspace directory.
///
/// # Errors
///
/// Returns an error if `root` holds no valid workspace record or destroy
/// still fails. The workspace is kept on disk in both cases.
pub async fn destroy_retained(
    tool: &impl ProvisioningTool,
    records: &impl WorkspaceRecordStore,
    workspaces: &impl WorkspaceProvider,
    reporter: &impl ProgressReporter,
    config: &EngineConfig,
    root: &Path,
) -> Result<Destroyed> {
    // 1. Identify the workspace
    let record = records
        .load(root)
        .await?
        .ok_or_else(|| WorkspaceError::NoRecord(root.display().to_string()))?;
    validate_workspace_id(&record.workspace_id)?;
    let options = record.options_at(root);

    // 2. Destroy under the configured retry policy
    reporter.step(&format!(
        "Destroying workspace {} (scenario '{}')...",
        record.workspace_id, record.scenario
    ));
    let destroyed = ProvisioningDriver::new(tool, &config.classifier, &config.retry)
        .destroy(&options)
        .await
        .with_context(|| format!("destroying workspace {}", record.workspace_id))?;

    // 3. Remove the directory
    let workspace = Workspace {
        id: record.workspace_id,
        root: root.to_path_buf(),
        options,
    };
    workspaces.release(workspace, false).await?;
    reporter.success("Workspace destroyed and removed.");

    Ok(destroyed)
}
