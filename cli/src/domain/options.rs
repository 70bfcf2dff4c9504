//! Provisioning options handed to the provisioning tool.
//!
//! Pure data. Built once per scenario run and never mutated afterwards;
//! every retry of apply or destroy sees a value-equal copy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use infracheck_common::VarValue;
use serde::{Deserialize, Serialize};

/// Display and behaviour flags forwarded to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolFlags {
    /// Pass `-no-color`.
    pub no_color: bool,
    /// Pass `-compact-warnings`.
    pub compact_warnings: bool,
    /// Hold the state lock during operations (`-lock=false` when off).
    pub lock: bool,
    /// Pass `-parallelism=N`.
    pub parallelism: Option<u32>,
}

impl Default for ToolFlags {
    fn default() -> Self {
        Self {
            no_color: false,
            compact_warnings: false,
            lock: true,
            parallelism: None,
        }
    }
}

/// Directory, variables and flags for one provisioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningOptions {
    /// Directory holding the infrastructure definition.
    pub dir: PathBuf,
    /// Input variables.
    #[serde(default)]
    pub vars: BTreeMap<String, VarValue>,
    #[serde(default)]
    pub flags: ToolFlags,
}

impl ProvisioningOptions {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            vars: BTreeMap::new(),
            flags: ToolFlags::default(),
        }
    }

    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<VarValue>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ToolFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Same variables and flags, pointed at another directory.
    #[must_use]
    pub fn rebased(&self, dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ..self.clone()
        }
    }
}
