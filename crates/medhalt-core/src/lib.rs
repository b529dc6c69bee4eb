//! MedHalt core library
//!
//! Parses raw model outputs from the MedHalt medical hallucination
//! benchmark, judges them against ground truth, and aggregates per-task
//! metrics under plain and points-based scoring.

pub mod config;
pub mod convert;
pub mod domain;
pub mod evaluator;
pub mod metrics;
pub mod normalize;
pub mod obs;
pub mod parse;
pub mod pipeline;
pub mod reporting;
pub mod score;
pub mod store;
pub mod telemetry;

pub use config::{default_answer_keys, EvalConfig, DEFAULT_CORRECT_SCORE, DEFAULT_PENALTY};

pub use convert::{collection_stem, ConvertedCollection, Converter, Prediction};

pub use domain::{
    value_to_text, CollectionId, HaltError, ModelOutput, ParsedOutput, Result, Sample,
    SampleError, SampleOutcome, TaskFamily, TaskKind, TaskResult,
};

pub use evaluator::{exact_match, RefusalVocabulary, Strategy, TaskEvaluator};

pub use normalize::{extract, AnswerKeys};

pub use parse::{parse_output, LooseParser, ParsePath, Parsed, DEFAULT_STOP_SENTINEL};

pub use pipeline::{
    evaluate, run, subset_total_name, EvalMode, EvalOptions, RowCounts, SubsetGroup,
};

pub use reporting::{
    render_report_md, write_report_csv, write_report_json, write_report_md, EvaluationReport,
    REPORT_COLUMNS,
};

pub use score::{
    finalize, tally, total_row, Counts, Report, ScoringMode, ScoringPass, TaskTally,
    TOTAL_ROW_NAME,
};

pub use store::{Collection, FsResultStore, MemoryResultStore, ReportPaths, ResultStore};

pub use metrics::{ParseStats, METRICS};
pub use obs::{
    emit_collection_loaded, emit_collection_skipped, emit_parse_failed, emit_parse_recovered,
    emit_report_written, emit_sample_excepted, emit_task_evaluated, EvalSpan,
};
pub use telemetry::init_tracing;

/// MedHalt version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
