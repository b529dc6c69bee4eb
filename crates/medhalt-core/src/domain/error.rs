//! Domain-level error taxonomy for the evaluation harness.

use std::path::PathBuf;

/// Errors raised while judging a single sample.
///
/// These never escape a task's evaluation loop: the evaluator converts each
/// one into an excepted outcome and logs it with the task and sample id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("no answer key found in model output (tried: {})", tried.join(", "))]
    MissingKey { tried: Vec<String> },

    #[error("model output could not be parsed into any field")]
    ParseFailure,

    #[error("ground truth field missing: {field}")]
    GroundTruthMissing { field: String },

    #[error("cannot compare against ground truth field {field}: {reason}")]
    ComparisonError { field: String, reason: String },
}

/// Errors produced by the harness outside the per-sample boundary.
#[derive(Debug, thiserror::Error)]
pub enum HaltError {
    #[error("unknown task name: {0}")]
    UnknownTask(String),

    #[error("unknown prediction file prefix: {0}")]
    UnknownPredictionPrefix(String),

    #[error("invalid collection {path:?}: {reason}")]
    InvalidCollection { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HaltError>;
