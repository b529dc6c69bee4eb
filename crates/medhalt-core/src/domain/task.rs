//! Task kinds of the benchmark and collection naming.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::HaltError;

/// The seven evaluation categories of the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    /// PubMed id → paper title.
    #[serde(rename = "IR_pmid2title")]
    Pmid2Title,
    /// PubMed link → paper title.
    #[serde(rename = "IR_pubmedlink2title")]
    PubmedLink2Title,
    /// Paper title → PubMed link.
    #[serde(rename = "IR_title2pubmedlink")]
    Title2PubmedLink,
    /// Paper abstract → PubMed link.
    #[serde(rename = "IR_abstract2pubmedlink")]
    Abstract2PubmedLink,
    /// False confidence test: free-form reasoning over a proposed answer.
    #[serde(rename = "reasoning_FCT")]
    Fct,
    /// Multiple choice where "none of the above" may be the right option.
    #[serde(rename = "reasoning_nota")]
    Nota,
    /// Fictional-premise questions the model should refuse.
    #[serde(rename = "reasoning_fake")]
    Fake,
}

/// How a task kind is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFamily {
    TitleRetrieval,
    UrlRetrieval,
    FreeFormReasoning,
    MultipleChoice,
    RefusalDetection,
}

impl TaskKind {
    pub const ALL: [TaskKind; 7] = [
        TaskKind::Pmid2Title,
        TaskKind::PubmedLink2Title,
        TaskKind::Title2PubmedLink,
        TaskKind::Abstract2PubmedLink,
        TaskKind::Fct,
        TaskKind::Nota,
        TaskKind::Fake,
    ];

    /// Dataset name, also the bare task name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Pmid2Title => "IR_pmid2title",
            TaskKind::PubmedLink2Title => "IR_pubmedlink2title",
            TaskKind::Title2PubmedLink => "IR_title2pubmedlink",
            TaskKind::Abstract2PubmedLink => "IR_abstract2pubmedlink",
            TaskKind::Fct => "reasoning_FCT",
            TaskKind::Nota => "reasoning_nota",
            TaskKind::Fake => "reasoning_fake",
        }
    }

    /// File stem the inference harness uses for this task's prediction CSV.
    pub fn prediction_prefix(self) -> &'static str {
        match self {
            TaskKind::Pmid2Title => "pmid2title",
            TaskKind::PubmedLink2Title => "url2title",
            TaskKind::Title2PubmedLink => "title2pub",
            TaskKind::Abstract2PubmedLink => "abs2pub",
            TaskKind::Fct => "FCT",
            TaskKind::Nota => "Nota",
            TaskKind::Fake => "fake",
        }
    }

    pub fn from_prediction_prefix(prefix: &str) -> Result<Self, HaltError> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.prediction_prefix() == prefix)
            .ok_or_else(|| HaltError::UnknownPredictionPrefix(prefix.to_string()))
    }

    pub fn family(self) -> TaskFamily {
        match self {
            TaskKind::Pmid2Title | TaskKind::PubmedLink2Title => TaskFamily::TitleRetrieval,
            TaskKind::Title2PubmedLink | TaskKind::Abstract2PubmedLink => TaskFamily::UrlRetrieval,
            TaskKind::Fct => TaskFamily::FreeFormReasoning,
            TaskKind::Nota => TaskFamily::MultipleChoice,
            TaskKind::Fake => TaskFamily::RefusalDetection,
        }
    }

    /// Ground-truth field the prediction is compared against, if any.
    ///
    /// Refusal detection has no explicit ground truth.
    pub fn ground_truth_field(self) -> Option<&'static str> {
        match self.family() {
            TaskFamily::TitleRetrieval => Some("Title"),
            TaskFamily::UrlRetrieval => Some("url"),
            TaskFamily::FreeFormReasoning | TaskFamily::MultipleChoice => Some("correct_answer"),
            TaskFamily::RefusalDetection => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = HaltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| HaltError::UnknownTask(s.to_string()))
    }
}

/// Identity of a result collection, recovered from its file stem.
///
/// Stems follow `<model_tag>_<task>` (e.g. `gpt3_reasoning_fake`); a bare
/// task name (`reasoning_fake`) carries no model tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionId {
    pub stem: String,
    pub task: TaskKind,
    pub model_tag: Option<String>,
}

impl CollectionId {
    pub fn parse(stem: &str) -> Result<Self, HaltError> {
        if let Ok(task) = stem.parse::<TaskKind>() {
            return Ok(Self {
                stem: stem.to_string(),
                task,
                model_tag: None,
            });
        }

        let (tag, rest) = stem
            .split_once('_')
            .ok_or_else(|| HaltError::UnknownTask(stem.to_string()))?;
        let task = rest
            .parse::<TaskKind>()
            .map_err(|_| HaltError::UnknownTask(stem.to_string()))?;
        Ok(Self {
            stem: stem.to_string(),
            task,
            model_tag: Some(tag.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_names_roundtrip_through_from_str() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.name().parse::<TaskKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_task_kind_serializes_as_dataset_name() {
        let json = serde_json::to_string(&TaskKind::Fct).expect("serialize");
        assert_eq!(json, "\"reasoning_FCT\"");
        let kind: TaskKind = serde_json::from_str("\"IR_pmid2title\"").expect("deserialize");
        assert_eq!(kind, TaskKind::Pmid2Title);
    }

    #[test]
    fn test_prediction_prefixes() {
        assert_eq!(
            TaskKind::from_prediction_prefix("abs2pub").unwrap(),
            TaskKind::Abstract2PubmedLink
        );
        assert_eq!(
            TaskKind::from_prediction_prefix("Nota").unwrap(),
            TaskKind::Nota
        );
        assert!(TaskKind::from_prediction_prefix("nota").is_err());
    }

    #[test]
    fn test_ground_truth_fields() {
        assert_eq!(TaskKind::Pmid2Title.ground_truth_field(), Some("Title"));
        assert_eq!(TaskKind::Abstract2PubmedLink.ground_truth_field(), Some("url"));
        assert_eq!(TaskKind::Nota.ground_truth_field(), Some("correct_answer"));
        assert_eq!(TaskKind::Fct.ground_truth_field(), Some("correct_answer"));
        assert_eq!(TaskKind::Fake.ground_truth_field(), None);
    }

    #[test]
    fn test_collection_id_with_model_tag() {
        let id = CollectionId::parse("vinci_IR_pmid2title").unwrap();
        assert_eq!(id.task, TaskKind::Pmid2Title);
        assert_eq!(id.model_tag.as_deref(), Some("vinci"));

        let id = CollectionId::parse("gpt3_reasoning_FCT").unwrap();
        assert_eq!(id.task, TaskKind::Fct);
        assert_eq!(id.model_tag.as_deref(), Some("gpt3"));
    }

    #[test]
    fn test_collection_id_bare_task() {
        let id = CollectionId::parse("reasoning_nota").unwrap();
        assert_eq!(id.task, TaskKind::Nota);
        assert!(id.model_tag.is_none());
    }

    #[test]
    fn test_collection_id_unknown() {
        assert!(matches!(
            CollectionId::parse("gpt3_reasoning_trivia"),
            Err(HaltError::UnknownTask(_))
        ));
        assert!(CollectionId::parse("results").is_err());
    }
}
