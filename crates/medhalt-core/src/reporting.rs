//! Report artifacts: `results.csv`, `results.json` and an optional Markdown
//! summary.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Result;
use crate::pipeline::EvalMode;
use crate::score::{Report, TaskTally};

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// CSV header, in column order.
pub const REPORT_COLUMNS: [&str; 13] = [
    "task_name",
    "model_name",
    "total",
    "correct",
    "wrong",
    "excepted",
    "accuracy",
    "precision",
    "recall",
    "f1_score",
    "score",
    "functional_accuracy",
    "point_score",
];

/// Rendering of a metric that could not be computed.
pub const UNDEFINED: &str = "undefined";

/// Everything one evaluation run produced. Passes are kept in run order,
/// penalized first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub mode: EvalMode,
    pub passes: Vec<Report>,
}

impl EvaluationReport {
    pub fn new(mode: EvalMode, passes: Vec<Report>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            mode,
            passes,
        }
    }

    /// All rows of all passes, in output order.
    pub fn rows(&self) -> impl Iterator<Item = &TaskTally> {
        self.passes.iter().flat_map(|p| p.rows.iter())
    }

    pub fn row_count(&self) -> usize {
        self.passes.iter().map(|p| p.rows.len()).sum()
    }

    /// The pass with the given `point_score` flag, if it was run.
    pub fn pass(&self, point_score: bool) -> Option<&Report> {
        self.passes.iter().find(|p| p.pass.point_score == point_score)
    }
}

pub fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), |v| v.to_string())
}

fn csv_record(row: &TaskTally) -> [String; 13] {
    [
        row.task_name.clone(),
        row.model_name.clone().unwrap_or_default(),
        row.total.to_string(),
        row.correct.to_string(),
        row.wrong.to_string(),
        row.excepted.to_string(),
        format_metric(row.accuracy),
        format_metric(row.precision),
        format_metric(row.recall),
        format_metric(row.f1_score),
        row.score.to_string(),
        format_metric(row.functional_accuracy),
        row.point_score.to_string(),
    ]
}

/// Write the report table as CSV to any writer.
pub fn write_report_csv_to<W: std::io::Write>(writer: W, report: &EvaluationReport) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(REPORT_COLUMNS)?;
    for row in report.rows() {
        wtr.write_record(csv_record(row))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_report_csv(path: &Path, report: &EvaluationReport) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_report_csv_to(file, report)
}

/// Write the report as pretty JSON. Undefined metrics are `null`.
pub fn write_report_json(path: &Path, report: &EvaluationReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn md_metric(value: Option<f64>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), |v| format!("{v:.3}"))
}

fn pass_heading(report: &Report) -> String {
    if report.pass.point_score {
        format!(
            "Points-based scoring (correct {:+}, wrong {:+})",
            report.pass.correct_score, report.pass.incorrect_score
        )
    } else {
        format!("Plain scoring (correct {:+})", report.pass.correct_score)
    }
}

/// Render a Markdown summary with one table per scoring pass.
pub fn render_report_md(report: &EvaluationReport) -> String {
    let mut out = String::new();
    out.push_str("# MedHalt Evaluation\n\n");
    out.push_str(&format!(
        "- generated: {}\n- mode: {}\n- rows: {}\n\n",
        report.generated_at.to_rfc3339(),
        report.mode,
        report.row_count()
    ));

    for pass in &report.passes {
        out.push_str(&format!("## {}\n\n", pass_heading(pass)));
        if pass.rows.is_empty() {
            out.push_str("_no collections evaluated_\n\n");
            continue;
        }
        out.push_str(
            "| task | model | total | correct | wrong | excepted | accuracy | f1 | score |\n",
        );
        out.push_str("|---|---|---:|---:|---:|---:|---:|---:|---:|\n");
        for row in &pass.rows {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {:.3} |\n",
                row.task_name,
                row.model_name.as_deref().unwrap_or("-"),
                row.total,
                row.correct,
                row.wrong,
                row.excepted,
                md_metric(row.accuracy),
                md_metric(row.f1_score),
                row.score,
            ));
        }
        out.push('\n');
    }
    out
}

pub fn write_report_md(path: &Path, report: &EvaluationReport) -> Result<()> {
    std::fs::write(path, render_report_md(report))?;
    Ok(())
}
