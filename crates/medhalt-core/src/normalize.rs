//! Answer extraction: picks the predicted answer out of a parsed output.

use crate::config::EvalConfig;
use crate::domain::{ParsedOutput, SampleError, TaskKind};

/// Ordered answer-key spellings for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKeys {
    keys: Vec<String>,
}

impl AnswerKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn for_task(config: &EvalConfig, task: TaskKind) -> Self {
        Self::new(config.answer_keys_for(task))
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Value of the first key present in `parsed`, in priority order.
    pub fn extract<'a>(&self, parsed: &'a ParsedOutput) -> Option<&'a str> {
        self.keys.iter().find_map(|key| parsed.get(key))
    }

    /// Like [`AnswerKeys::extract`], but a miss is a [`SampleError::MissingKey`].
    pub fn require<'a>(&self, parsed: &'a ParsedOutput) -> Result<&'a str, SampleError> {
        self.extract(parsed).ok_or_else(|| SampleError::MissingKey {
            tried: self.keys.clone(),
        })
    }
}

/// Extract the predicted answer for `task` using the built-in key lists.
pub fn extract(parsed: &ParsedOutput, task: TaskKind) -> Option<String> {
    AnswerKeys::for_task(&EvalConfig::default(), task)
        .extract(parsed)
        .map(str::to_string)
}
