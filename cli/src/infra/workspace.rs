//! Infrastructure implementation of the `WorkspaceProvider` port.
//!
//! Each run gets `<base>/<workspace-id>/`, a private copy of the scenario's
//! definition tree, so Terraform state never leaks between runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::application::ports::{Workspace, WorkspaceProvider};
use crate::domain::{Scenario, WorkspaceRecord, generate_workspace_id};
use crate::infra::fs::copy_tree;
use crate::infra::state::save_sync;

/// Creates workspaces under a base directory (the system temp dir by default).
pub struct TempWorkspaceProvider {
    base: PathBuf,
}

impl TempWorkspaceProvider {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    pub fn in_system_temp() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl WorkspaceProvider for TempWorkspaceProvider {
    async fn acquire(&self, scenario: &Scenario) -> Result<Workspace> {
        let id = generate_workspace_id();
        let root = self.base.join(&id);
        let options = scenario.options_for(&id, &root.join(scenario.relative_dir()));
        let record = WorkspaceRecord {
            workspace_id: id.clone(),
            scenario: scenario.name.clone(),
            created_at: Utc::now(),
            relative_dir: scenario.relative_dir(),
            options: options.clone(),
        };

        let base = self.base.clone();
        let source = scenario.source_root().to_path_buf();
        let target = root.clone();
        tokio::task::spawn_blocking(move || prepare(&base, &source, &target, &record))
            .await
            .context("workspace setup task panicked")??;

        Ok(Workspace { id, root, options })
    }

    async fn release(&self, workspace: Workspace, retain: bool) -> Result<Option<PathBuf>> {
        if retain {
            warn!(
                workspace = %workspace.id,
                root = %workspace.root.display(),
                "Retaining workspace; run `infracheck destroy` on it once the cause is fixed"
            );
            return Ok(Some(workspace.root));
        }
        let root = workspace.root;
        tokio::task::spawn_blocking(move || {
            std::fs::remove_dir_all(&root).with_context(|| format!("removing {}", root.display()))
        })
        .await
        .context("workspace removal task panicked")??;
        info!(workspace = %workspace.id, "Workspace removed");
        Ok(None)
    }
}

fn prepare(base: &Path, source: &Path, root: &Path, record: &WorkspaceRecord) -> Result<()> {
    std::fs::create_dir_all(base).with_context(|| format!("creating {}", base.display()))?;
    std::fs::create_dir(root).with_context(|| format!("creating workspace {}", root.display()))?;
    let filled = copy_tree(source, root).and_then(|()| save_sync(root, record));
    if filled.is_err() {
        let _ = std::fs::remove_dir_all(root);
    }
    filled
}
