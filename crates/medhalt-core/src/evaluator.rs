//! Per-task judging of samples.
//!
//! Each [`TaskEvaluator`] resolves the model output to a field map, pulls the
//! predicted answer out with the task's [`AnswerKeys`], and applies the
//! task family's [`Strategy`]. Any [`SampleError`] is caught at the sample
//! boundary and turned into an excepted outcome so one bad sample never
//! aborts the batch.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::config::EvalConfig;
use crate::domain::{
    ModelOutput, ParsedOutput, Sample, SampleError, SampleOutcome, TaskFamily, TaskKind,
    TaskResult,
};
use crate::metrics::METRICS;
use crate::normalize::AnswerKeys;
use crate::obs;
use crate::parse::LooseParser;

/// How a prediction is compared with the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Case-insensitive equality with a ground-truth field.
    ExactMatch { field: &'static str },
    /// The answer must contain a refusal phrase; no ground truth is consulted.
    Refusal,
}

impl Strategy {
    pub fn for_task(task: TaskKind) -> Self {
        match (task.family(), task.ground_truth_field()) {
            (TaskFamily::RefusalDetection, _) | (_, None) => Strategy::Refusal,
            (_, Some(field)) => Strategy::ExactMatch { field },
        }
    }
}

/// Case-insensitive comparison; surrounding whitespace is ignored, interior
/// whitespace must match.
pub fn exact_match(predicted: &str, ground_truth: &str) -> bool {
    predicted.trim().to_lowercase() == ground_truth.trim().to_lowercase()
}

/// Phrases that show the model declined a fictional premise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefusalVocabulary {
    phrases: Vec<String>,
}

impl RefusalVocabulary {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &EvalConfig) -> Self {
        Self::new(&config.refusal_phrases)
    }

    pub fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }
}

/// Judges the samples of one task.
#[derive(Debug, Clone)]
pub struct TaskEvaluator {
    task: TaskKind,
    strategy: Strategy,
    keys: AnswerKeys,
    refusals: RefusalVocabulary,
    parser: LooseParser,
}

impl TaskEvaluator {
    pub fn new(task: TaskKind, config: &EvalConfig) -> Self {
        Self {
            task,
            strategy: Strategy::for_task(task),
            keys: AnswerKeys::for_task(config, task),
            refusals: RefusalVocabulary::from_config(config),
            parser: LooseParser::new(config.stop_sentinel.clone()),
        }
    }

    pub fn with_answer_keys(mut self, keys: AnswerKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_refusals(mut self, refusals: RefusalVocabulary) -> Self {
        self.refusals = refusals;
        self
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Judge one sample. Never fails: errors become [`TaskResult::Excepted`].
    pub fn evaluate(&self, sample: &Sample) -> SampleOutcome {
        match self.judge(sample) {
            Ok(correct) => SampleOutcome {
                id: sample.id.clone(),
                result: if correct {
                    TaskResult::Correct
                } else {
                    TaskResult::Wrong
                },
                reason: None,
            },
            Err(err) => {
                METRICS.inc_samples_excepted();
                obs::emit_sample_excepted(self.task.name(), &sample.id, &err);
                SampleOutcome {
                    id: sample.id.clone(),
                    result: TaskResult::Excepted,
                    reason: Some(err.to_string()),
                }
            }
        }
    }

    /// Judge every sample in order.
    pub fn evaluate_all<'a, I>(&self, samples: I) -> Vec<SampleOutcome>
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        samples.into_iter().map(|s| self.evaluate(s)).collect()
    }

    /// `Ok(true)` for correct, `Ok(false)` for wrong.
    pub fn judge(&self, sample: &Sample) -> Result<bool, SampleError> {
        let parsed = self.resolve_output(sample);
        if parsed.is_empty() {
            return Err(SampleError::ParseFailure);
        }
        let predicted = self.keys.require(&parsed)?;
        self.judge_answer(predicted, &sample.testbed_data)
    }

    /// Compare an extracted answer with the sample's ground-truth record.
    pub fn judge_answer(
        &self,
        predicted: &str,
        ground_truth: &Map<String, Value>,
    ) -> Result<bool, SampleError> {
        match self.strategy {
            Strategy::Refusal => Ok(self.refusals.matches(predicted)),
            Strategy::ExactMatch { field } => {
                let truth = ground_truth_text(ground_truth, field)?;
                Ok(exact_match(predicted, truth))
            }
        }
    }

    fn resolve_output<'a>(&self, sample: &'a Sample) -> Cow<'a, ParsedOutput> {
        match &sample.output {
            ModelOutput::Parsed(parsed) => Cow::Borrowed(parsed),
            ModelOutput::Raw(raw) => Cow::Owned(self.parser.parse_sample(&sample.id, raw).output),
            ModelOutput::Missing => Cow::Owned(ParsedOutput::new()),
        }
    }
}

fn ground_truth_text<'a>(
    ground_truth: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, SampleError> {
    match ground_truth.get(field) {
        None | Some(Value::Null) => Err(SampleError::GroundTruthMissing {
            field: field.to_string(),
        }),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(SampleError::ComparisonError {
            field: field.to_string(),
            reason: format!("expected text, found {other}"),
        }),
    }
}
