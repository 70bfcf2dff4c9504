//! YAML configuration file loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::config::ConfigFile;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "INFRACHECK_CONFIG";

/// Reads engine configuration from a YAML file on disk.
pub struct YamlConfigStore {
    explicit: Option<PathBuf>,
}

impl YamlConfigStore {
    /// `explicit` comes from `--config` and must exist when given.
    #[must_use]
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Load the config, or defaults when no file exists at the implicit location.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or a file exists but
    /// cannot be read or parsed.
    pub fn load(&self) -> Result<ConfigFile> {
        let explicit = self.explicit.is_some();
        let path = config_path(self.explicit.as_deref(), |k| std::env::var(k).ok())?;
        if !explicit && !path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }
}

/// Config location: `--config`, then `INFRACHECK_CONFIG`, then
/// `~/.infracheck/config.yaml`.
///
/// # Errors
///
/// Returns an error if no explicit path is set and the home directory
/// cannot be determined.
pub fn config_path(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(val) = env(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(val));
    }
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".infracheck").join("config.yaml"))
}
