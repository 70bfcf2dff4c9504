//! Engine configuration schema and resolution.
//!
//! Pure functions only, with no I/O or async. The
//! environment is consulted through a caller-supplied lookup, exactly once,
//! while resolving.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::retry::{RetryClassifier, RetryPolicy, RetryablePattern};

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_REGION: &str = "us-east-1";
/// Environment variables consulted, in order, when no region is configured.
pub const REGION_ENV_VARS: &[&str] = &["AWS_REGION", "AWS_DEFAULT_REGION"];

// ── Config schema ────────────────────────────────────────────────────────────

/// Configuration stored in `~/.infracheck/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// AWS region for readiness probes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Provisioning tool binary.
    pub tool: String,
    /// Readiness probe binary.
    pub probe_tool: String,
    /// Scenarios running at once.
    pub parallelism: usize,
    pub scenario_timeout_secs: u64,
    /// Upper bound on any single tool or probe invocation.
    pub command_timeout_secs: u64,
    /// How long an interrupted tool may take to shut down (and record what it
    /// already created) before it is killed.
    pub interrupt_grace_secs: u64,
    pub retry: RetryFile,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            region: None,
            tool: "terraform".to_string(),
            probe_tool: "aws".to_string(),
            parallelism: 4,
            scenario_timeout_secs: 3600,
            command_timeout_secs: 1800,
            interrupt_grace_secs: 300,
            retry: RetryFile::default(),
        }
    }
}

/// Retry settings for apply and destroy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryFile {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub multiplier: f64,
    /// Replaces the built-in pattern list when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable_errors: Option<Vec<PatternEntry>>,
}

impl Default for RetryFile {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_secs: policy.initial_backoff.as_secs(),
            max_backoff_secs: policy.max_backoff.as_secs(),
            multiplier: policy.multiplier,
            retryable_errors: None,
        }
    }
}

/// One configured retryable error signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

// ── Resolved config ──────────────────────────────────────────────────────────

/// Immutable engine settings, shared read-only by every scenario.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub region: String,
    pub tool: String,
    pub probe_tool: String,
    pub parallelism: usize,
    pub scenario_timeout: Duration,
    pub command_timeout: Duration,
    pub interrupt_grace: Duration,
    pub retry: RetryPolicy,
    pub classifier: RetryClassifier,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            tool: "terraform".to_string(),
            probe_tool: "aws".to_string(),
            parallelism: 4,
            scenario_timeout: Duration::from_secs(3600),
            command_timeout: Duration::from_secs(1800),
            interrupt_grace: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            classifier: RetryClassifier::with_defaults(),
        }
    }
}

impl EngineConfig {
    /// Override the number of concurrent scenarios.
    ///
    /// # Errors
    ///
    /// Returns an error if `parallelism` is zero.
    pub fn with_parallelism(mut self, parallelism: usize) -> Result<Self, ConfigError> {
        if parallelism == 0 {
            return Err(invalid("parallelism", "must be at least 1"));
        }
        self.parallelism = parallelism;
        Ok(self)
    }
}

impl ConfigFile {
    /// Validate and resolve into an [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range values or an invalid pattern.
    pub fn resolve(self, env: impl Fn(&str) -> Option<String>) -> Result<EngineConfig, ConfigError> {
        if self.tool.trim().is_empty() {
            return Err(invalid("tool", "must not be empty"));
        }
        if self.probe_tool.trim().is_empty() {
            return Err(invalid("probe_tool", "must not be empty"));
        }
        if self.parallelism == 0 {
            return Err(invalid("parallelism", "must be at least 1"));
        }
        if self.scenario_timeout_secs == 0 {
            return Err(invalid("scenario_timeout_secs", "must be at least 1"));
        }
        if self.command_timeout_secs == 0 {
            return Err(invalid("command_timeout_secs", "must be at least 1"));
        }
        let retry = self.retry.policy()?;
        let classifier = self.retry.classifier()?;

        let region = self
            .region
            .filter(|r| !r.trim().is_empty())
            .or_else(|| {
                REGION_ENV_VARS
                    .iter()
                    .find_map(|var| env(var).filter(|v| !v.trim().is_empty()))
            })
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Ok(EngineConfig {
            region,
            tool: self.tool,
            probe_tool: self.probe_tool,
            parallelism: self.parallelism,
            scenario_timeout: Duration::from_secs(self.scenario_timeout_secs),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            interrupt_grace: Duration::from_secs(self.interrupt_grace_secs),
            retry,
            classifier,
        })
    }
}

impl RetryFile {
    fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        if self.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(invalid(
                "retry.multiplier",
                format!("must be a finite number >= 1.0, got {}", self.multiplier),
            ));
        }
        if self.max_backoff_secs < self.initial_backoff_secs {
            return Err(invalid(
                "retry.max_backoff_secs",
                "must not be smaller than retry.initial_backoff_secs",
            ));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            multiplier: self.multiplier,
        })
    }

    fn classifier(&self) -> Result<RetryClassifier, ConfigError> {
        let Some(entries) = &self.retryable_errors else {
            return Ok(RetryClassifier::with_defaults());
        };
        let patterns = entries
            .iter()
            .map(|e| -> Result<RetryablePattern, ConfigError> {
                let pattern = RetryablePattern::new(&e.pattern, &e.description)?;
                Ok(match e.code {
                    Some(code) => pattern.with_code(code),
                    None => pattern,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RetryClassifier::new(patterns))
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.into(),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
