//! Suite file loading.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::scenario::{Scenario, SuiteFile, validate_suite};

/// Read, parse and validate a suite file. Definition paths are resolved
/// against the directory containing the suite.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or fails validation.
pub fn load_suite(path: &Path) -> Result<Vec<Scenario>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read suite {}", path.display()))?;
    let file: SuiteFile = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse suite {}", path.display()))?;
    let absolute = std::path::absolute(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    let base = absolute.parent().unwrap_or_else(|| Path::new("/"));
    let scenarios = file.into_scenarios(base);
    validate_suite(&scenarios).with_context(|| format!("invalid suite {}", path.display()))?;
    Ok(scenarios)
}
