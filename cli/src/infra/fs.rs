//! Filesystem helpers for preparing workspaces.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::workspace::RECORD_FILE;
use crate::infra::terraform::VAR_FILE;

/// Entries never copied into a workspace: provider caches, state from local
/// runs, VCS metadata and files the engine writes itself.
#[must_use]
pub fn is_excluded(name: &str) -> bool {
    name == ".terraform"
        || name == ".git"
        || name == RECORD_FILE
        || name == VAR_FILE
        || name.starts_with("terraform.tfstate")
        || name.ends_with(".tfstate")
        || name.ends_with(".tfstate.backup")
}

/// Recursively copy `src` into `dst`, skipping [`is_excluded`] entries.
/// Symlinks are followed.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    let entries =
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading directory {}", src.display()))?;
        let name = entry.file_name();
        if name.to_str().is_some_and(is_excluded) {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        let meta = std::fs::metadata(&from)
            .with_context(|| format!("reading metadata of {}", from.display()))?;
        if meta.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}
