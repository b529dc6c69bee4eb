//! Samples read from result collections and their per-sample outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field map recovered from a model's raw output.
///
/// Values are always text; non-string values decoded from the output are
/// rendered with [`value_to_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct ParsedOutput(BTreeMap<String, String>);

impl ParsedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as a strict, double-quoted mapping that parses back to `self`.
    pub fn to_text(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<BTreeMap<String, Value>> for ParsedOutput {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(k, v)| (k, value_to_text(&v)))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParsedOutput {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Render a decoded value as text the way the benchmark's outputs spell it:
/// strings verbatim, `True`/`False`/`None` for literals, numbers as written,
/// containers as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// What the model produced for a sample: raw text still to be parsed, or a
/// mapping recovered by an earlier conversion step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelOutput {
    Parsed(ParsedOutput),
    Raw(String),
    #[default]
    Missing,
}

/// One evaluation unit of a result collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(deserialize_with = "id_from_scalar")]
    pub id: String,

    #[serde(rename = "gpt_output", alias = "output", default)]
    pub output: ModelOutput,

    /// Ground-truth record from the benchmark dataset.
    #[serde(default)]
    pub testbed_data: Map<String, Value>,
}

impl Sample {
    pub fn new(id: impl Into<String>, output: ModelOutput) -> Self {
        Self {
            id: id.into(),
            output,
            testbed_data: Map::new(),
        }
    }

    pub fn with_ground_truth(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.testbed_data.insert(field.to_string(), value.into());
        self
    }
}

fn id_from_scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "sample id must be a string or number, got {other}"
        ))),
    }
}

/// Per-sample verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResult {
    Correct,
    Wrong,
    /// Parse failure, missing key, or unusable ground truth.
    Excepted,
}

/// Outcome of a single sample, with the reason when it was excepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleOutcome {
    pub id: String,
    pub result: TaskResult,
    pub reason: Option<String>,
}
