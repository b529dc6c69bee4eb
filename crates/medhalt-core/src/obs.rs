//! Structured log events for evaluation runs.
//!
//! Lifecycle events are emitted at `info!`, sample-level problems at
//! `warn!`, so an audit of excepted samples is a log filter away:
//! `MEDHALT_LOG=warn medhalt evaluate ...`.

use tracing::{info, warn};

/// Raw outputs are truncated to this many characters in log events.
const LOG_SNIPPET_CHARS: usize = 120;

/// RAII guard that scopes every event of one task evaluation.
pub struct EvalSpan {
    _span: tracing::span::EnteredSpan,
}

impl EvalSpan {
    pub fn enter(task: &str, model: Option<&str>) -> Self {
        let span = tracing::info_span!(
            "medhalt.task",
            task = %task,
            model = model.unwrap_or("-"),
        );
        Self {
            _span: span.entered(),
        }
    }
}

fn snippet(text: &str) -> String {
    let mut out: String = text.chars().take(LOG_SNIPPET_CHARS).collect();
    if text.chars().nth(LOG_SNIPPET_CHARS).is_some() {
        out.push_str("...");
    }
    out
}

/// A result collection was read from disk.
pub fn emit_collection_loaded(path: &str, samples: usize) {
    info!(event = "collection.loaded", path = %path, samples = samples);
}

/// A file in the store or prediction folder was not evaluated.
pub fn emit_collection_skipped(path: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "collection.skipped", path = %path, reason = %reason);
}

/// Strict decoding failed; the key/value scan recovered `fields` entries.
pub fn emit_parse_recovered(sample_id: &str, fields: usize, cleaned: &str) {
    info!(
        event = "parse.recovered",
        sample_id = %sample_id,
        fields = fields,
        cleaned = %snippet(cleaned),
    );
}

/// Neither decoder recovered anything.
pub fn emit_parse_failed(sample_id: &str, raw: &str) {
    warn!(event = "parse.failed", sample_id = %sample_id, raw = %snippet(raw));
}

pub fn emit_sample_excepted(task: &str, sample_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "sample.excepted",
        task = %task,
        sample_id = %sample_id,
        error = %error,
    );
}

pub fn emit_task_evaluated(task: &str, total: u64, correct: u64, wrong: u64, excepted: u64) {
    info!(
        event = "task.evaluated",
        task = %task,
        total = total,
        correct = correct,
        wrong = wrong,
        excepted = excepted,
    );
}

pub fn emit_report_written(path: &str, rows: usize) {
    info!(event = "report.written", path = %path, rows = rows);
}
