//! Domain models for the evaluation harness.
//!
//! Canonical definitions for the core entities:
//! - `TaskKind`: The seven benchmark task categories
//! - `CollectionId`: Model tag + task recovered from a collection file name
//! - `Sample`: One model output paired with its ground truth
//! - `TaskResult`: The verdict for a single sample

pub mod error;
pub mod sample;
pub mod task;

// Re-export main types and errors
pub use error::{HaltError, Result, SampleError};
pub use sample::{value_to_text, ModelOutput, ParsedOutput, Sample, SampleOutcome, TaskResult};
pub use task::{CollectionId, TaskFamily, TaskKind};
