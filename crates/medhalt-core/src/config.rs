//! Evaluation configuration.
//!
//! Every table the evaluators consult (answer key spellings, the refusal
//! vocabulary, model tags) lives here so tests and experiments can swap them
//! without touching the evaluators.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{HaltError, Result, TaskKind};
use crate::parse::DEFAULT_STOP_SENTINEL;

/// Reward for a correct answer in every scoring pass.
pub const DEFAULT_CORRECT_SCORE: f64 = 1.0;

/// Points-based penalty for a wrong answer.
pub const DEFAULT_PENALTY: f64 = -0.25;

/// Spellings of the free-form answer key observed in model outputs, in
/// priority order.
const FCT_ANSWER_KEYS: [&str; 8] = [
    "correct_answer",
    "answer",
    "correct answer",
    "corrent_answer",
    "Correct Answer",
    "Answer",
    "Correct_answer",
    "Correct answer",
];

const REFUSAL_PHRASES: [&str; 15] = [
    "i do not know",
    "conceding defeat",
    "admit",
    "none of the above",
    "acknowled",
    "irrelevant",
    "fiction",
    "all of the above",
    "nonsensical",
    "no correct",
    "absurd",
    "defy",
    "i don\"t know.",
    "i don't know",
    "defies",
];

/// Built-in answer keys for a task.
pub fn default_answer_keys(task: TaskKind) -> Vec<String> {
    let keys: &[&str] = match task {
        TaskKind::Fct => &FCT_ANSWER_KEYS,
        TaskKind::Nota | TaskKind::Fake => &["cop"],
        TaskKind::Pmid2Title | TaskKind::PubmedLink2Title => &["paper_title"],
        TaskKind::Title2PubmedLink | TaskKind::Abstract2PubmedLink => &["url"],
    };
    keys.iter().map(|k| k.to_string()).collect()
}

fn default_answer_key_table() -> BTreeMap<TaskKind, Vec<String>> {
    TaskKind::ALL
        .into_iter()
        .map(|task| (task, default_answer_keys(task)))
        .collect()
}

fn default_refusal_phrases() -> Vec<String> {
    REFUSAL_PHRASES.iter().map(|p| p.to_string()).collect()
}

fn default_model_names() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("vinci".to_string(), "Davinci".to_string()),
        ("gpt3".to_string(), "gpt-3.5-turbo".to_string()),
    ])
}

fn default_stop_sentinel() -> String {
    DEFAULT_STOP_SENTINEL.to_string()
}

fn default_correct_score() -> f64 {
    DEFAULT_CORRECT_SCORE
}

fn default_penalty() -> f64 {
    DEFAULT_PENALTY
}

fn default_report_stem() -> String {
    "results".to_string()
}

fn default_subset_filter() -> String {
    "mcq".to_string()
}

/// Tunables for one evaluation run. Every field has a default, so a config
/// file only needs the entries it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalConfig {
    /// Accepted answer-key spellings per task, in priority order. Tasks
    /// missing from the table use [`default_answer_keys`].
    #[serde(default = "default_answer_key_table")]
    pub answer_keys: BTreeMap<TaskKind, Vec<String>>,

    /// Phrases that mark a refusal on fictional-premise questions.
    #[serde(default = "default_refusal_phrases")]
    pub refusal_phrases: Vec<String>,

    /// Model tag (collection name prefix) → reported model name.
    #[serde(default = "default_model_names")]
    pub model_names: BTreeMap<String, String>,

    #[serde(default = "default_stop_sentinel")]
    pub stop_sentinel: String,

    #[serde(default = "default_correct_score")]
    pub correct_score: f64,

    /// Score of a wrong answer in the points-based pass.
    #[serde(default = "default_penalty")]
    pub penalty: f64,

    /// File stem of the written report (`results.csv`, `results.json`).
    #[serde(default = "default_report_stem")]
    pub report_stem: String,

    /// Substring selecting mixed-task collections in subset mode.
    #[serde(default = "default_subset_filter")]
    pub subset_filter: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            answer_keys: default_answer_key_table(),
            refusal_phrases: default_refusal_phrases(),
            model_names: default_model_names(),
            stop_sentinel: default_stop_sentinel(),
            correct_score: DEFAULT_CORRECT_SCORE,
            penalty: DEFAULT_PENALTY,
            report_stem: default_report_stem(),
            subset_filter: default_subset_filter(),
        }
    }
}

impl EvalConfig {
    /// Load a JSON config file and validate it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EvalConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.correct_score.is_finite() || !self.penalty.is_finite() {
            return Err(HaltError::InvalidConfig(
                "scores must be finite numbers".to_string(),
            ));
        }
        if self.refusal_phrases.iter().any(|p| p.trim().is_empty()) {
            return Err(HaltError::InvalidConfig(
                "refusal phrases must not be empty".to_string(),
            ));
        }
        if let Some((task, _)) = self.answer_keys.iter().find(|(_, keys)| keys.is_empty()) {
            return Err(HaltError::InvalidConfig(format!(
                "answer key list for {task} is empty"
            )));
        }
        if self.report_stem.trim().is_empty() {
            return Err(HaltError::InvalidConfig(
                "report_stem must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Answer keys for `task`, in priority order.
    pub fn answer_keys_for(&self, task: TaskKind) -> Vec<String> {
        self.answer_keys
            .get(&task)
            .cloned()
            .unwrap_or_else(|| default_answer_keys(task))
    }

    /// Reported model name for a collection's model tag. Unknown tags are
    /// reported verbatim.
    pub fn model_name(&self, tag: &str) -> String {
        self.model_names
            .get(tag)
            .cloned()
            .unwrap_or_else(|| tag.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_task() {
        let config = EvalConfig::default();
        for task in TaskKind::ALL {
            assert!(!config.answer_keys_for(task).is_empty(), "{task}");
        }
        assert_eq!(config.answer_keys_for(TaskKind::Fct)[0], "correct_answer");
        assert_eq!(config.answer_keys_for(TaskKind::Fake), vec!["cop"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: EvalConfig =
            serde_json::from_str(r#"{"penalty": -0.5, "model_names": {"llama": "Llama-2-70b"}}"#)
                .expect("deserialize");
        assert_eq!(config.penalty, -0.5);
        assert_eq!(config.correct_score, 1.0);
        assert_eq!(config.stop_sentinel, "Stop Here");
        assert_eq!(config.model_name("llama"), "Llama-2-70b");
        assert_eq!(config.model_name("gpt3"), "gpt3");
        assert_eq!(config.refusal_phrases.len(), 15);
    }

    #[test]
    fn test_answer_key_override_for_one_task() {
        let config: EvalConfig =
            serde_json::from_str(r#"{"answer_keys": {"reasoning_nota": ["choice", "cop"]}}"#)
                .expect("deserialize");
        assert_eq!(config.answer_keys_for(TaskKind::Nota), vec!["choice", "cop"]);
        assert_eq!(config.answer_keys_for(TaskKind::Pmid2Title), vec!["paper_title"]);
    }

    #[test]
    fn test_model_name_mapping() {
        let config = EvalConfig::default();
        assert_eq!(config.model_name("vinci"), "Davinci");
        assert_eq!(config.model_name("gpt3"), "gpt-3.5-turbo");
        assert_eq!(config.model_name("falcon"), "falcon");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EvalConfig {
            penalty: f64::NAN,
            ..EvalConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.refusal_phrases.push("  ".to_string());
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.answer_keys.insert(TaskKind::Fct, Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"subset_filter": "sample"}"#).unwrap();
        let config = EvalConfig::from_path(&path).unwrap();
        assert_eq!(config.subset_filter, "sample");

        std::fs::write(&path, r#"{"correct_score": "one"}"#).unwrap();
        assert!(matches!(
            EvalConfig::from_path(&path),
            Err(HaltError::Serialization(_))
        ));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = EvalConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: EvalConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, back);
    }
}
