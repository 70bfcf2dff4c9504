//! Outputs produced by a successful apply.
//!
//! An [`OutputSet`] is built once from the tool's `output -json` document and
//! is read-only afterwards. Lookups distinguish a missing output from an
//! output of the wrong shape, since assertions legitimately probe for both.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A single output value: a scalar string or a flat string map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    Scalar(String),
    Map(BTreeMap<String, String>),
}

impl OutputValue {
    /// `true` for an empty string or an empty map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::Map(m) => m.is_empty(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Map(_) => "map",
        }
    }
}

/// Errors raised when reading outputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutputError {
    #[error("output '{0}' not found")]
    NotFound(String),

    #[error("output '{name}' is a {actual}, expected a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("malformed output document: {0}")]
    Malformed(String),
}

/// Immutable mapping from output name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OutputSet {
    values: BTreeMap<String, OutputValue>,
}

impl OutputSet {
    /// Parse the document printed by `terraform output -json`.
    ///
    /// Each top-level member is an object carrying a `value`. Strings are kept
    /// verbatim, booleans and numbers render as their literal text, objects of
    /// scalars become maps, and anything else is kept as compact JSON.
    pub fn from_tool_json(bytes: &[u8]) -> Result<Self, OutputError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let doc: Value =
            serde_json::from_slice(bytes).map_err(|e| OutputError::Malformed(e.to_string()))?;
        let Value::Object(entries) = doc else {
            return Err(OutputError::Malformed("expected a JSON object".to_string()));
        };

        let mut values = BTreeMap::new();
        for (name, entry) in entries {
            let value = entry
                .get("value")
                .ok_or_else(|| OutputError::Malformed(format!("output '{name}' has no value")))?;
            values.insert(name, convert(value));
        }
        Ok(Self { values })
    }

    /// Look up a scalar output.
    pub fn get(&self, name: &str) -> Result<&str, OutputError> {
        match self.lookup(name)? {
            OutputValue::Scalar(s) => Ok(s),
            other => Err(wrong_kind(name, "scalar", other)),
        }
    }

    /// Look up a map output.
    pub fn get_map(&self, name: &str) -> Result<&BTreeMap<String, String>, OutputError> {
        match self.lookup(name)? {
            OutputValue::Map(m) => Ok(m),
            other => Err(wrong_kind(name, "map", other)),
        }
    }

    /// Look up an output of either shape.
    pub fn lookup(&self, name: &str) -> Result<&OutputValue, OutputError> {
        self.values
            .get(name)
            .ok_or_else(|| OutputError::NotFound(name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl FromIterator<(String, OutputValue)> for OutputSet {
    fn from_iter<I: IntoIterator<Item = (String, OutputValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn wrong_kind(name: &str, expected: &'static str, actual: &OutputValue) -> OutputError {
    OutputError::WrongKind {
        name: name.to_string(),
        expected,
        actual: actual.kind(),
    }
}

fn convert(value: &Value) -> OutputValue {
    if let Some(s) = render_scalar(value) {
        return OutputValue::Scalar(s);
    }
    if let Value::Object(members) = value {
        let flat: Option<BTreeMap<String, String>> = members
            .iter()
            .map(|(k, v)| render_scalar(v).map(|s| (k.clone(), s)))
            .collect();
        if let Some(map) = flat {
            return OutputValue::Map(map);
        }
    }
    OutputValue::Scalar(value.to_string())
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
