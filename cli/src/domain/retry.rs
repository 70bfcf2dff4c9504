//! Retry classification and backoff policy for provisioning operations.
//!
//! Pure functions only: the classifier maps a failure description to a
//! classification, and the policy maps an attempt number to a delay. The
//! retry loop itself lives in `application::services::retry`.

use std::fmt;
use std::time::Duration;

use regex::Regex;

use crate::domain::error::ConfigError;

/// Failure signatures of the provisioning tool and AWS that are known to
/// clear up on their own. Checked in order; the first match wins.
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    ("read: connection reset by peer", "Connection reset while talking to a remote API."),
    ("TLS handshake timeout", "TLS handshake with a remote API timed out."),
    ("transport is closing", "Remote API closed the transport."),
    ("unable to verify signature", "Transient failure verifying a provider signature."),
    ("unable to verify checksum", "Transient failure verifying a provider checksum."),
    ("registry service is unreachable", "Provider registry is unreachable."),
    ("Error installing provider", "Provider download failed."),
    ("Failed to query available provider packages", "Provider registry query failed."),
    ("could not query provider registry for", "Provider registry query failed."),
    ("timeout while waiting for plugin to start", "Provider plugin did not start in time."),
    ("timed out waiting for server handshake", "Provider plugin handshake timed out."),
    (
        "Provider produced inconsistent result after apply",
        "Eventual consistency race inside the provider.",
    ),
    ("RequestLimitExceeded", "AWS request throttling."),
    ("Throttling", "AWS request throttling."),
    ("Rate exceeded", "AWS request throttling."),
    (r"timed out after \d+s", "Provisioning command timed out."),
];

// ── Failure description ──────────────────────────────────────────────────────

/// Opaque failure reported by one invocation of the provisioning tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    /// Message text, usually the tool's stderr.
    pub message: String,
    /// Exit code, when the tool ran to completion.
    pub code: Option<i32>,
}

impl ToolFailure {
    #[must_use]
    pub fn new(message: impl Into<String>, code: Option<i32>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (exit code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

// ── Classification ───────────────────────────────────────────────────────────

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Matched a known transient signature.
    Retryable { reason: String },
    /// Retrying will not help.
    Permanent,
}

impl Classification {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

/// One known-transient failure signature.
#[derive(Debug, Clone)]
pub struct RetryablePattern {
    regex: Regex,
    description: String,
    code: Option<i32>,
}

impl RetryablePattern {
    /// Compile a pattern matched against the failure message.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn new(pattern: &str, description: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            regex,
            description: description.to_string(),
            code: None,
        })
    }

    /// Restrict the pattern to failures carrying `code`.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    fn matches(&self, failure: &ToolFailure) -> bool {
        if self.code.is_some() && self.code != failure.code {
            return false;
        }
        self.regex.is_match(&failure.message)
    }

    fn reason(&self) -> String {
        if self.description.is_empty() {
            format!("matched '{}'", self.regex.as_str())
        } else {
            self.description.clone()
        }
    }
}

/// Ordered set of retryable patterns. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct RetryClassifier {
    patterns: Vec<RetryablePattern>,
}

impl RetryClassifier {
    #[must_use]
    pub fn new(patterns: Vec<RetryablePattern>) -> Self {
        Self { patterns }
    }

    /// Classifier over [`DEFAULT_RETRYABLE_ERRORS`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_RETRYABLE_ERRORS
                .iter()
                .filter_map(|(pattern, description)| {
                    RetryablePattern::new(pattern, description).ok()
                })
                .collect(),
        )
    }

    /// Classify a failure. First matching pattern wins; no match is permanent.
    #[must_use]
    pub fn classify(&self, failure: &ToolFailure) -> Classification {
        self.patterns
            .iter()
            .find(|p| p.matches(failure))
            .map_or(Classification::Permanent, |p| Classification::Retryable {
                reason: p.reason(),
            })
    }

    #[must_use]
    pub fn patterns(&self) -> &[RetryablePattern] {
        &self.patterns
    }
}

// ── Policy ───────────────────────────────────────────────────────────────────

/// Attempt cap and backoff schedule shared by apply and destroy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Growth factor applied per failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        grow(
            self.initial_backoff,
            self.multiplier,
            attempt.saturating_sub(1),
            self.max_backoff,
        )
    }
}

/// `base × factor^steps`, capped at `cap`.
pub(crate) fn grow(base: Duration, factor: f64, steps: u32, cap: Duration) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(steps).unwrap_or(i32::MAX);
    let secs = (base.as_secs_f64() * factor.powi(exponent)).min(cap.as_secs_f64());
    Duration::try_from_secs_f64(secs).unwrap_or(cap)
}

// ── Attempt records ──────────────────────────────────────────────────────────

/// Classified result of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    PermanentFailure,
}

/// Diagnostic record of one attempt of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-indexed attempt number.
    pub attempt: u32,
    /// Time since the operation started, measured when the attempt resolved.
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
}
