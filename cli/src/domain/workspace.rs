//! Workspace identity and the record kept inside every workspace.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! All functions take data in and return data out.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::WorkspaceError;
use crate::domain::options::ProvisioningOptions;

/// Prefix of every generated workspace id.
pub const WORKSPACE_ID_PREFIX: &str = "infracheck-";

/// File written at the workspace root describing the run that owns it.
pub const RECORD_FILE: &str = "infracheck.workspace.json";

/// Describes the run that created a workspace.
///
/// Written before the first apply so a retained workspace carries everything
/// `infracheck destroy` needs to tear it down later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Workspace identifier (e.g., "infracheck-abc123def4567890").
    pub workspace_id: String,
    pub scenario: String,
    pub created_at: DateTime<Utc>,
    /// Definition directory relative to the workspace root.
    pub relative_dir: PathBuf,
    /// Options used for apply.
    pub options: ProvisioningOptions,
}

impl WorkspaceRecord {
    /// Options for a workspace whose root now lives at `root`.
    #[must_use]
    pub fn options_at(&self, root: &Path) -> ProvisioningOptions {
        self.options.rebased(&root.join(&self.relative_dir))
    }
}

/// Validates workspace ID format.
///
/// A valid workspace ID is `infracheck-` followed by exactly 16 hex characters.
///
/// # Errors
///
/// Returns an error if the ID doesn't match the expected format.
pub fn validate_workspace_id(id: &str) -> Result<(), WorkspaceError> {
    let valid = id.strip_prefix(WORKSPACE_ID_PREFIX).is_some_and(|hex| {
        hex.len() == 16 && hex.chars().all(|c| c.is_ascii_hexdigit())
    });
    if valid {
        Ok(())
    } else {
        Err(WorkspaceError::InvalidId(id.to_string()))
    }
}

/// Generate a unique workspace identifier.
///
/// Format: `infracheck-` followed by 16 lowercase hex characters.
/// Entropy sources: nanosecond timestamp and two independent `RandomState` hashes.
#[must_use]
pub fn generate_workspace_id() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    hasher.write_u64(RandomState::new().build_hasher().finish());
    format!("{WORKSPACE_ID_PREFIX}{:016x}", hasher.finish())
}
