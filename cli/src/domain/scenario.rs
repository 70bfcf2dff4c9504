//! Scenario definitions and suite validation.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! Suite files are parsed elsewhere; here they are converted and checked.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use infracheck_common::VarValue;
use serde::{Deserialize, Serialize};

use crate::domain::assertion::Assertion;
use crate::domain::error::SuiteError;
use crate::domain::options::{ProvisioningOptions, ToolFlags};
use crate::domain::retry::grow;

// ── Readiness polling ────────────────────────────────────────────────────────

/// Delay schedule between readiness probes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// The same interval between every probe.
    #[default]
    Fixed,
    /// `interval × multiplier^(n-1)`, capped at `max_interval`.
    Exponential {
        multiplier: f64,
        #[serde(rename = "max_interval_secs", with = "secs")]
        max_interval: Duration,
    },
}

/// How to wait for a provisioned resource to become ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Output holding the id of the resource to probe.
    pub resource_output: String,
    /// Total probes, including the first one.
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
    #[serde(
        rename = "interval_secs",
        with = "secs",
        default = "default_poll_interval"
    )]
    pub interval: Duration,
    #[serde(default)]
    pub backoff: Backoff,
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

impl PollConfig {
    #[must_use]
    pub fn new(resource_output: impl Into<String>, max_attempts: u32, interval: Duration) -> Self {
        Self {
            resource_output: resource_output.into(),
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    /// Delay after probe number `attempt` (1-indexed) reported not ready.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                multiplier,
                max_interval,
            } => grow(
                self.interval,
                *multiplier,
                attempt.saturating_sub(1),
                *max_interval,
            ),
        }
    }

    /// Total sleep before the poller gives up, excluding probe latency.
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        let sleeps = self.max_attempts.saturating_sub(1);
        if let Backoff::Exponential { max_interval, .. } = &self.backoff {
            let mut total = Duration::ZERO;
            for attempt in 1..=sleeps {
                let delay = self.delay_after(attempt);
                if delay >= *max_interval {
                    let remaining = sleeps - attempt + 1;
                    return total.saturating_add(max_interval.saturating_mul(remaining));
                }
                total = total.saturating_add(delay);
            }
            return total;
        }
        self.interval.saturating_mul(sleeps)
    }
}

// ── Scenario ─────────────────────────────────────────────────────────────────

/// One end-to-end provisioning test. Never mutated while it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    /// Options pointing at the original definition directory.
    pub options: ProvisioningOptions,
    /// Directory copied into the workspace. Defaults to `options.dir`; set it
    /// higher when the definition references sibling modules.
    pub copy_root: Option<PathBuf>,
    /// Variable that receives the workspace id.
    pub workspace_var: Option<String>,
    pub poll: Option<PollConfig>,
    pub assertions: Vec<Assertion>,
}

impl Scenario {
    #[must_use]
    pub fn new(name: impl Into<String>, options: ProvisioningOptions) -> Self {
        Self {
            name: name.into(),
            options,
            copy_root: None,
            workspace_var: None,
            poll: None,
            assertions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = Some(poll);
        self
    }

    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    #[must_use]
    pub fn with_workspace_var(mut self, name: impl Into<String>) -> Self {
        self.workspace_var = Some(name.into());
        self
    }

    /// Directory tree to copy into a fresh workspace.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        self.copy_root.as_deref().unwrap_or(&self.options.dir)
    }

    /// Location of the definition relative to [`Self::source_root`].
    #[must_use]
    pub fn relative_dir(&self) -> PathBuf {
        normalize(&self.options.dir)
            .strip_prefix(normalize(self.source_root()))
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Options for a run inside workspace `workspace_id`, whose copy of the
    /// definition lives at `dir`.
    #[must_use]
    pub fn options_for(&self, workspace_id: &str, dir: &Path) -> ProvisioningOptions {
        let options = self.options.rebased(dir);
        match &self.workspace_var {
            Some(var) => options.with_var(var.clone(), workspace_id),
            None => options,
        }
    }
}

// ── Suite file ───────────────────────────────────────────────────────────────

/// Top-level suite document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteFile {
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

impl SuiteFile {
    /// Convert every entry, resolving paths against `base`.
    #[must_use]
    pub fn into_scenarios(self, base: &Path) -> Vec<Scenario> {
        self.scenarios
            .into_iter()
            .map(|spec| spec.into_scenario(base))
            .collect()
    }
}

/// A scenario as written in a suite file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    /// Definition directory, relative to the suite file.
    pub dir: PathBuf,
    #[serde(default)]
    pub vars: BTreeMap<String, VarValue>,
    #[serde(flatten)]
    pub flags: ToolFlags,
    #[serde(default)]
    pub copy_root: Option<PathBuf>,
    #[serde(default)]
    pub workspace_var: Option<String>,
    #[serde(default)]
    pub poll: Option<PollConfig>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl ScenarioSpec {
    #[must_use]
    pub fn into_scenario(self, base: &Path) -> Scenario {
        let options = ProvisioningOptions {
            dir: normalize(&base.join(&self.dir)),
            vars: self.vars,
            flags: self.flags,
        };
        Scenario {
            name: self.name,
            options,
            copy_root: self.copy_root.map(|p| normalize(&base.join(p))),
            workspace_var: self.workspace_var,
            poll: self.poll,
            assertions: self.assertions,
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Reject suites that could never run as written.
///
/// # Errors
///
/// Returns the first problem found, in suite order.
pub fn validate_suite(scenarios: &[Scenario]) -> Result<(), SuiteError> {
    if scenarios.is_empty() {
        return Err(SuiteError::Empty);
    }
    let mut seen = HashSet::new();
    for scenario in scenarios {
        if !seen.insert(scenario.name.as_str()) {
            return Err(SuiteError::DuplicateName(scenario.name.clone()));
        }
        validate_scenario(scenario).map_err(|reason| SuiteError::InvalidScenario {
            scenario: scenario.name.clone(),
            reason,
        })?;
    }
    Ok(())
}

fn validate_scenario(scenario: &Scenario) -> Result<(), String> {
    if scenario.name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if let Some(root) = &scenario.copy_root
        && !normalize(&scenario.options.dir).starts_with(normalize(root))
    {
        return Err(format!(
            "dir {} is outside copy_root {}",
            scenario.options.dir.display(),
            root.display()
        ));
    }
    if let Some(var) = &scenario.workspace_var {
        if var.is_empty() {
            return Err("workspace_var must not be empty".to_string());
        }
        if scenario.options.vars.contains_key(var) {
            return Err(format!("workspace_var '{var}' is also set in vars"));
        }
    }
    if let Some(poll) = &scenario.poll {
        if poll.resource_output.is_empty() {
            return Err("poll.resource_output must not be empty".to_string());
        }
        if poll.max_attempts == 0 {
            return Err("poll.max_attempts must be at least 1".to_string());
        }
        if let Backoff::Exponential { multiplier, .. } = poll.backoff
            && !(multiplier.is_finite() && multiplier >= 1.0)
        {
            return Err(format!("poll.backoff.multiplier must be >= 1.0, got {multiplier}"));
        }
    }
    for assertion in &scenario.assertions {
        assertion.validate()?;
    }
    Ok(())
}

/// Keep the named scenarios, in suite order. An empty filter keeps all.
///
/// # Errors
///
/// Returns an error for a name that matches no scenario.
pub fn select_scenarios(
    scenarios: Vec<Scenario>,
    filter: &[String],
) -> Result<Vec<Scenario>, SuiteError> {
    if filter.is_empty() {
        return Ok(scenarios);
    }
    if let Some(unknown) = filter
        .iter()
        .find(|name| !scenarios.iter().any(|s| &s.name == *name))
    {
        return Err(SuiteError::UnknownScenario(unknown.clone()));
    }
    Ok(scenarios
        .into_iter()
        .filter(|s| filter.contains(&s.name))
        .collect())
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)] // serde's serialize_with signature
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
