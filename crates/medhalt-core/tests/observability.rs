//! Observability tests for evaluation tracing and counters.
//!
//! `METRICS` is process-wide and tests run in parallel, so counter checks
//! compare before/after values with `>=`.

use medhalt_core::{
    emit_collection_loaded, emit_collection_skipped, emit_parse_failed, emit_parse_recovered,
    emit_report_written, emit_sample_excepted, emit_task_evaluated, EvalConfig, EvalSpan,
    LooseParser, ModelOutput, ParsePath, Sample, SampleError, TaskEvaluator, TaskKind,
    TaskResult, METRICS,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_collection_loaded() {
    emit_collection_loaded("preds/gpt3_reasoning_fake.json", 42);
    assert!(logs_contain("collection.loaded"));
    assert!(logs_contain("gpt3_reasoning_fake.json"));
}

#[traced_test]
#[test]
fn test_emit_collection_skipped_logs_warning() {
    emit_collection_skipped("preds/gpt3_trivia.json", &"unknown task name: gpt3_trivia");
    assert!(logs_contain("collection.skipped"));
    assert!(logs_contain("unknown task name: gpt3_trivia"));
}

#[traced_test]
#[test]
fn test_emit_parse_events() {
    emit_parse_recovered("s-1", 2, "{'cop': 'C', 'why': 'x} trailing");
    emit_parse_failed("s-2", &"no structure ".repeat(50));
    assert!(logs_contain("parse.recovered"));
    assert!(logs_contain("parse.failed"));
    assert!(logs_contain("s-2"));
}

#[traced_test]
#[test]
fn test_emit_sample_excepted_logs_task_and_id() {
    let err = SampleError::MissingKey {
        tried: vec!["cop".to_string()],
    };
    emit_sample_excepted("reasoning_nota", "s-3", &err);
    assert!(logs_contain("sample.excepted"));
    assert!(logs_contain("s-3"));
    assert!(logs_contain("no answer key found"));
}

#[traced_test]
#[test]
fn test_emit_task_and_report_events() {
    emit_task_evaluated("reasoning_fake", 10, 8, 2, 1);
    emit_report_written("preds/results.csv", 14);
    assert!(logs_contain("task.evaluated"));
    assert!(logs_contain("report.written"));
}

#[traced_test]
#[test]
fn test_eval_span_enter_creates_span() {
    let span = EvalSpan::enter("IR_pmid2title", Some("Davinci"));
    emit_task_evaluated("IR_pmid2title", 0, 0, 0, 0);
    drop(span);
    assert!(logs_contain("medhalt.task"));
    assert!(logs_contain("Davinci"));
}

#[traced_test]
#[test]
fn test_parse_sample_counts_paths() {
    let parser = LooseParser::default();
    let parsed_before = METRICS.outputs_parsed();
    let lenient_before = METRICS.lenient_recoveries();
    let failed_before = METRICS.parse_failures();

    assert_eq!(parser.parse_sample("a", "{'cop': 'A'}").path, ParsePath::Strict);
    assert_eq!(
        parser.parse_sample("b", "{'cop': 'B', 'why': 'cut off} more").path,
        ParsePath::Lenient
    );
    assert_eq!(parser.parse_sample("c", "plain prose").path, ParsePath::Failed);

    assert!(METRICS.outputs_parsed() >= parsed_before + 3);
    assert!(METRICS.lenient_recoveries() > lenient_before);
    assert!(METRICS.parse_failures() > failed_before);
    assert!(logs_contain("parse.recovered"));
    assert!(logs_contain("parse.failed"));
}

#[traced_test]
#[test]
fn test_excepted_samples_are_counted() {
    let evaluator = TaskEvaluator::new(TaskKind::Nota, &EvalConfig::default());
    let before = METRICS.samples_excepted();

    let sample = Sample::new("x-1", ModelOutput::Raw("{'answer': 'A'}".to_string()))
        .with_ground_truth("correct_answer", "A");
    let outcome = evaluator.evaluate(&sample);

    assert_eq!(outcome.result, TaskResult::Excepted);
    assert!(METRICS.samples_excepted() > before);
    assert!(logs_contain("sample.excepted"));
    assert!(logs_contain("x-1"));
}

#[traced_test]
#[test]
fn test_run_stats_cover_only_this_run() {
    let start = METRICS.snapshot();
    LooseParser::default().parse_sample("r-1", "{'cop': 'A'}");
    let run = METRICS.flush_since(&start);
    assert!(run.outputs_parsed >= 1);
    assert!(logs_contain("run.stats"));
}
