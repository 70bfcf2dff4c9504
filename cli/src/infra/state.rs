//! Infrastructure implementation of the `WorkspaceRecordStore` port.
//!
//! `RecordFile` provides async load/save using `tokio::task::spawn_blocking`
//! with atomic write (temp file + rename) to prevent record corruption.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::WorkspaceRecordStore;
use crate::domain::workspace::{RECORD_FILE, WorkspaceRecord};

/// Workspace record stored as `infracheck.workspace.json` at the workspace root.
pub struct RecordFile;

/// Synchronous load, used by `load` via `spawn_blocking`.
///
/// # Errors
///
/// Returns an error if the record exists but cannot be read or parsed.
pub fn load_sync(root: &Path) -> Result<Option<WorkspaceRecord>> {
    let path = root.join(RECORD_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading workspace record {}", path.display()))?;
    let record = serde_json::from_str(&content)
        .with_context(|| format!("parsing workspace record {}", path.display()))?;
    Ok(Some(record))
}

/// Synchronous save, used by `save` and by the workspace provider.
///
/// # Errors
///
/// Returns an error if the record cannot be written.
pub fn save_sync(root: &Path, record: &WorkspaceRecord) -> Result<()> {
    let path = root.join(RECORD_FILE);
    let content = serde_json::to_string_pretty(record).context("serializing workspace record")?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, &content)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }

    std::fs::rename(&temp_path, &path)
        .with_context(|| format!("finalizing workspace record {}", path.display()))?;
    Ok(())
}

impl WorkspaceRecordStore for RecordFile {
    async fn load(&self, root: &Path) -> Result<Option<WorkspaceRecord>> {
        let root: PathBuf = root.to_path_buf();
        tokio::task::spawn_blocking(move || load_sync(&root))
            .await
            .context("record load task panicked")?
    }

    async fn save(&self, root: &Path, record: &WorkspaceRecord) -> Result<()> {
        let root: PathBuf = root.to_path_buf();
        let record = record.clone();
        tokio::task::spawn_blocking(move || save_sync(&root, &record))
            .await
            .context("record save task panicked")?
    }
}
