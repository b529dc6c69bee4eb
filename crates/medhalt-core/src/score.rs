//! Score aggregation.
//!
//! Turns per-sample [`TaskResult`]s into a [`TaskTally`] per task and
//! scoring pass, and folds tallies into a [`Report`]. Metrics whose
//! denominator is zero are `None` rather than NaN or a panic.

use serde::{Deserialize, Serialize};

use crate::config::EvalConfig;
use crate::domain::TaskResult;

/// Name of the synthetic cross-task row.
pub const TOTAL_ROW_NAME: &str = "total/avg";

// ---------------------------------------------------------------------------
// Scoring passes
// ---------------------------------------------------------------------------

/// Fixed reward/penalty pair for one pass over all tasks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringPass {
    pub correct_score: f64,
    pub incorrect_score: f64,
    /// True for the points-based (penalized) pass.
    pub point_score: bool,
}

impl ScoringPass {
    /// Wrong answers score the same as correct ones; `score` tracks volume.
    pub fn plain(correct_score: f64) -> Self {
        Self {
            correct_score,
            incorrect_score: correct_score,
            point_score: false,
        }
    }

    pub fn point(correct_score: f64, penalty: f64) -> Self {
        Self {
            correct_score,
            incorrect_score: penalty,
            point_score: true,
        }
    }
}

/// Which passes a run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    #[default]
    Both,
    Plain,
    Point,
}

impl ScoringMode {
    /// Passes to run, penalized first.
    pub fn passes(self, config: &EvalConfig) -> Vec<ScoringPass> {
        let plain = ScoringPass::plain(config.correct_score);
        let point = ScoringPass::point(config.correct_score, config.penalty);
        match self {
            ScoringMode::Both => vec![point, plain],
            ScoringMode::Plain => vec![plain],
            ScoringMode::Point => vec![point],
        }
    }
}

// ---------------------------------------------------------------------------
// Tallies
// ---------------------------------------------------------------------------

/// Raw outcome counts of one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub correct: u64,
    pub wrong: u64,
    pub excepted: u64,
}

impl Counts {
    pub fn record(&mut self, result: TaskResult) {
        match result {
            TaskResult::Correct => self.correct += 1,
            TaskResult::Wrong => self.wrong += 1,
            TaskResult::Excepted => self.excepted += 1,
        }
    }

    /// Judged samples only; exceptions are excluded.
    pub fn total(&self) -> u64 {
        self.correct + self.wrong
    }
}

/// Count outcomes.
pub fn tally<I>(results: I) -> Counts
where
    I: IntoIterator<Item = TaskResult>,
{
    let mut counts = Counts::default();
    for result in results {
        counts.record(result);
    }
    counts
}

/// One report row: a task's counts and derived metrics under one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTally {
    pub task_name: String,
    pub model_name: Option<String>,
    pub total: u64,
    pub correct: u64,
    pub wrong: u64,
    pub excepted: u64,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub score: f64,
    pub functional_accuracy: Option<f64>,
    pub point_score: bool,
}

impl TaskTally {
    pub fn new(
        task_name: impl Into<String>,
        model_name: Option<String>,
        counts: Counts,
        pass: &ScoringPass,
    ) -> Self {
        let total = counts.total();
        let correct = counts.correct as f64;
        let wrong = counts.wrong as f64;

        let precision = ratio(correct, correct + wrong);
        let recall = ratio(correct, total as f64);
        let f1_score = match (precision, recall) {
            (Some(p), Some(r)) => ratio(2.0 * p * r, p + r),
            _ => None,
        };

        Self {
            task_name: task_name.into(),
            model_name,
            total,
            correct: counts.correct,
            wrong: counts.wrong,
            excepted: counts.excepted,
            accuracy: ratio(correct * 100.0, total as f64).map(round3),
            precision,
            recall,
            f1_score,
            score: (correct * pass.correct_score + wrong * pass.incorrect_score) / 100.0,
            functional_accuracy: ratio(
                correct * 100.0,
                (counts.total() + counts.excepted) as f64,
            )
            .map(round3),
            point_score: pass.point_score,
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            correct: self.correct,
            wrong: self.wrong,
            excepted: self.excepted,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Round half away from zero to three decimals.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn mean_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let defined: Vec<f64> = values.into_iter().flatten().collect();
    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

/// Cross-task summary row: counts summed, metrics averaged over the rows
/// where they are defined. The model name is kept only when every row
/// agrees on it.
pub fn total_row(rows: &[TaskTally], pass: &ScoringPass) -> TaskTally {
    let model_name = match rows.first() {
        Some(first) if rows.iter().all(|r| r.model_name == first.model_name) => {
            first.model_name.clone()
        }
        _ => None,
    };

    TaskTally {
        task_name: TOTAL_ROW_NAME.to_string(),
        model_name,
        total: rows.iter().map(|r| r.total).sum(),
        correct: rows.iter().map(|r| r.correct).sum(),
        wrong: rows.iter().map(|r| r.wrong).sum(),
        excepted: rows.iter().map(|r| r.excepted).sum(),
        accuracy: mean_defined(rows.iter().map(|r| r.accuracy)),
        precision: mean_defined(rows.iter().map(|r| r.precision)),
        recall: mean_defined(rows.iter().map(|r| r.recall)),
        f1_score: mean_defined(rows.iter().map(|r| r.f1_score)),
        score: mean_defined(rows.iter().map(|r| Some(r.score))).unwrap_or(0.0),
        functional_accuracy: mean_defined(rows.iter().map(|r| r.functional_accuracy)),
        point_score: pass.point_score,
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// All rows of one scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub pass: ScoringPass,
    pub rows: Vec<TaskTally>,
}

impl Report {
    pub fn new(pass: ScoringPass) -> Self {
        Self {
            pass,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: TaskTally) {
        self.rows.push(row);
    }

    pub fn row(&self, task_name: &str) -> Option<&TaskTally> {
        self.rows.iter().find(|r| r.task_name == task_name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Collect tallies into a report, optionally appending the `total/avg` row.
pub fn finalize(pass: ScoringPass, tallies: Vec<TaskTally>, with_total: bool) -> Report {
    let mut report = Report {
        pass,
        rows: tallies,
    };
    if with_total && !report.rows.is_empty() {
        let total = total_row(&report.rows, &report.pass);
        report.rows.push(total);
    }
    report
}
