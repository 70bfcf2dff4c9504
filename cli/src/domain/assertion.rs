//! Assertions over apply outputs.
//!
//! Evaluation is total: every assertion produces an outcome, and a failing
//! one never stops the rest from running.

use infracheck_common::{OutputError, OutputSet, OutputValue};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::report::AssertionOutcome;

/// A check against one named output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case", deny_unknown_fields)]
pub enum Assertion {
    /// Scalar output equals `expected`.
    Equals { output: String, expected: String },
    /// Scalar is a non-empty string, or map has at least one entry.
    NotEmpty { output: String },
    /// Map output contains every key in `keys`.
    HasKeys { output: String, keys: Vec<String> },
    /// Scalar output matches the regular expression `pattern`.
    Matches { output: String, pattern: String },
    /// Output does not exist.
    Absent { output: String },
}

impl Assertion {
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            Self::Equals { output, .. }
            | Self::NotEmpty { output }
            | Self::HasKeys { output, .. }
            | Self::Matches { output, .. }
            | Self::Absent { output } => output,
        }
    }

    /// Human-readable description used in reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Equals { output, expected } => format!("{output} equals '{expected}'"),
            Self::NotEmpty { output } => format!("{output} is not empty"),
            Self::HasKeys { output, keys } => format!("{output} has keys [{}]", keys.join(", ")),
            Self::Matches { output, pattern } => format!("{output} matches /{pattern}/"),
            Self::Absent { output } => format!("{output} is absent"),
        }
    }

    /// Reject assertions that can never be evaluated.
    ///
    /// # Errors
    ///
    /// Returns a reason if the output name is empty or the pattern is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.output().is_empty() {
            return Err("assertion has an empty output name".to_string());
        }
        if let Self::Matches { pattern, .. } = self {
            Regex::new(pattern).map_err(|e| format!("invalid pattern /{pattern}/: {e}"))?;
        }
        Ok(())
    }

    /// Evaluate against the outputs of a successful apply.
    #[must_use]
    pub fn evaluate(&self, outputs: &OutputSet) -> AssertionOutcome {
        let description = self.describe();
        match self.check(outputs) {
            Ok(()) => AssertionOutcome::pass(description),
            Err(message) => AssertionOutcome::fail(description, message),
        }
    }

    fn check(&self, outputs: &OutputSet) -> Result<(), String> {
        match self {
            Self::Equals { output, expected } => {
                let actual = outputs.get(output).map_err(|e| e.to_string())?;
                if actual == expected {
                    Ok(())
                } else {
                    Err(format!("expected '{expected}', got '{actual}'"))
                }
            }
            Self::NotEmpty { output } => {
                let value = outputs.lookup(output).map_err(|e| e.to_string())?;
                if value.is_empty() {
                    Err(format!("output '{output}' is empty"))
                } else {
                    Ok(())
                }
            }
            Self::HasKeys { output, keys } => {
                let map = outputs.get_map(output).map_err(|e| e.to_string())?;
                let missing: Vec<&str> = keys
                    .iter()
                    .filter(|k| !map.contains_key(k.as_str()))
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("missing keys [{}]", missing.join(", ")))
                }
            }
            Self::Matches { output, pattern } => {
                let actual = outputs.get(output).map_err(|e| e.to_string())?;
                let re = Regex::new(pattern).map_err(|e| format!("invalid pattern: {e}"))?;
                if re.is_match(actual) {
                    Ok(())
                } else {
                    Err(format!("'{actual}' does not match /{pattern}/"))
                }
            }
            Self::Absent { output } => match outputs.lookup(output) {
                Err(OutputError::NotFound(_)) => Ok(()),
                Err(e) => Err(e.to_string()),
                Ok(OutputValue::Scalar(v)) => Err(format!("output '{output}' is present: '{v}'")),
                Ok(OutputValue::Map(_)) => Err(format!("output '{output}' is present")),
            },
        }
    }
}

/// Evaluate every assertion, in order, regardless of earlier failures.
#[must_use]
pub fn evaluate_all(assertions: &[Assertion], outputs: &OutputSet) -> Vec<AssertionOutcome> {
    assertions.iter().map(|a| a.evaluate(outputs)).collect()
}
