//! Evaluation pipeline.
//!
//! Full mode evaluates one collection per task, named `<model_tag>_<task>`.
//! Subset mode evaluates mixed-task collections (stems containing the
//! configured subset filter) where each sample names its task in
//! `testbed_data.dataset_name`. Every collection is reported on its own:
//! its task rows, then a `<stem>/total/avg` summary row.
//!
//! Samples are judged once; each scoring pass only re-scores the counts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EvalConfig;
use crate::domain::{CollectionId, HaltError, Result, Sample, TaskKind};
use crate::evaluator::TaskEvaluator;
use crate::metrics::METRICS;
use crate::obs::{self, EvalSpan};
use crate::reporting::EvaluationReport;
use crate::score::{
    finalize, tally, total_row, Counts, Report, ScoringMode, ScoringPass, TaskTally,
    TOTAL_ROW_NAME,
};
use crate::store::{Collection, ReportPaths, ResultStore};

/// Field of a subset sample's ground truth that names its task.
pub const DATASET_NAME_FIELD: &str = "dataset_name";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMode {
    #[default]
    Full,
    Subset,
}

impl fmt::Display for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalMode::Full => f.write_str("full"),
            EvalMode::Subset => f.write_str("subset"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    pub mode: EvalMode,
    pub scoring: ScoringMode,
}

/// Outcome counts of one report row, before any scoring pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCounts {
    pub task_name: String,
    pub model_name: Option<String>,
    pub counts: Counts,
}

fn judge(evaluator: &TaskEvaluator, samples: &[Sample]) -> Counts {
    tally(evaluator.evaluate_all(samples).into_iter().map(|o| o.result))
}

fn emit_counts(task: &str, counts: &Counts) {
    obs::emit_task_evaluated(
        task,
        counts.total(),
        counts.correct,
        counts.wrong,
        counts.excepted,
    );
}

/// One row per collection whose stem names a known task. Other
/// collections are skipped with a warning.
pub fn count_full(collections: &[Collection], config: &EvalConfig) -> Vec<RowCounts> {
    let mut rows = Vec::new();
    for collection in collections {
        let id = match CollectionId::parse(&collection.stem) {
            Ok(id) => id,
            Err(err) => {
                obs::emit_collection_skipped(&collection.path.display().to_string(), &err);
                continue;
            }
        };
        let model_name = id.model_tag.as_deref().map(|tag| config.model_name(tag));
        let _span = EvalSpan::enter(id.task.name(), model_name.as_deref());

        let counts = judge(&TaskEvaluator::new(id.task, config), &collection.samples);
        emit_counts(id.task.name(), &counts);
        rows.push(RowCounts {
            task_name: id.task.name().to_string(),
            model_name,
            counts,
        });
    }
    rows
}

/// Model of a subset collection: its stem prefix, when that is a known tag.
fn subset_model(stem: &str, config: &EvalConfig) -> Option<String> {
    let (tag, _) = stem.split_once('_')?;
    config
        .model_names
        .contains_key(tag)
        .then(|| config.model_name(tag))
}

fn sample_task(sample: &Sample) -> Result<TaskKind> {
    sample
        .testbed_data
        .get(DATASET_NAME_FIELD)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HaltError::UnknownTask(format!("<missing {DATASET_NAME_FIELD}>")))?
        .parse()
}

/// Name of the summary row closing a subset collection's section.
pub fn subset_total_name(stem: &str) -> String {
    format!("{stem}/{TOTAL_ROW_NAME}")
}

/// Per-task counts of one subset collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetGroup {
    pub stem: String,
    pub model_name: Option<String>,
    pub rows: Vec<RowCounts>,
    /// Samples whose `dataset_name` is missing or unknown.
    pub unrouted: u64,
}

/// One group per collection matching the subset filter, each sample routed
/// to its task by `testbed_data.dataset_name`. Collections are never merged.
pub fn count_subset(collections: &[Collection], config: &EvalConfig) -> Vec<SubsetGroup> {
    let mut evaluators: BTreeMap<TaskKind, TaskEvaluator> = BTreeMap::new();
    let mut groups = Vec::new();

    for collection in collections
        .iter()
        .filter(|c| c.stem.contains(&config.subset_filter))
    {
        let model_name = subset_model(&collection.stem, config);
        let _span = EvalSpan::enter(&collection.stem, model_name.as_deref());

        let mut per_task: BTreeMap<TaskKind, Counts> = BTreeMap::new();
        let mut unrouted = 0;
        for sample in &collection.samples {
            let task = match sample_task(sample) {
                Ok(task) => task,
                Err(err) => {
                    unrouted += 1;
                    METRICS.inc_samples_excepted();
                    obs::emit_sample_excepted(&collection.stem, &sample.id, &err);
                    continue;
                }
            };
            let evaluator = evaluators
                .entry(task)
                .or_insert_with(|| TaskEvaluator::new(task, config));
            per_task
                .entry(task)
                .or_default()
                .record(evaluator.evaluate(sample).result);
        }

        let rows = per_task
            .into_iter()
            .map(|(task, counts)| {
                emit_counts(task.name(), &counts);
                RowCounts {
                    task_name: task.name().to_string(),
                    model_name: model_name.clone(),
                    counts,
                }
            })
            .collect();
        groups.push(SubsetGroup {
            stem: collection.stem.clone(),
            model_name,
            rows,
            unrouted,
        });
    }
    groups
}

impl RowCounts {
    pub fn tally(&self, pass: &ScoringPass) -> TaskTally {
        TaskTally::new(
            self.task_name.clone(),
            self.model_name.clone(),
            self.counts,
            pass,
        )
    }
}

/// Score full-mode rows under each pass.
pub fn score_rows(rows: &[RowCounts], passes: &[ScoringPass]) -> Vec<Report> {
    passes
        .iter()
        .map(|pass| finalize(*pass, rows.iter().map(|r| r.tally(pass)).collect(), false))
        .collect()
}

/// Score subset groups under each pass. Each group contributes its task
/// rows followed by its summary row; unrouted samples count as excepted
/// there.
pub fn score_subset(groups: &[SubsetGroup], passes: &[ScoringPass]) -> Vec<Report> {
    passes
        .iter()
        .map(|pass| {
            let mut report = Report::new(*pass);
            for group in groups {
                let tallies: Vec<TaskTally> = group.rows.iter().map(|r| r.tally(pass)).collect();
                let mut summary = total_row(&tallies, pass);
                summary.task_name = subset_total_name(&group.stem);
                summary.model_name = group.model_name.clone();
                summary.excepted += group.unrouted;
                report.rows.extend(tallies);
                report.push(summary);
            }
            report
        })
        .collect()
}

/// Evaluate loaded collections into a report.
pub fn evaluate(
    collections: &[Collection],
    config: &EvalConfig,
    options: &EvalOptions,
) -> EvaluationReport {
    let passes = options.scoring.passes(config);
    let reports = match options.mode {
        EvalMode::Full => score_rows(&count_full(collections, config), &passes),
        EvalMode::Subset => score_subset(&count_subset(collections, config), &passes),
    };
    EvaluationReport::new(options.mode, reports)
}

/// Load every collection from `store`, evaluate, and write the report back.
pub fn run(
    store: &dyn ResultStore,
    config: &EvalConfig,
    options: &EvalOptions,
    markdown: bool,
) -> Result<(EvaluationReport, ReportPaths)> {
    let start = METRICS.snapshot();
    let collections = store.load_collections()?;
    let report = evaluate(&collections, config, options);
    let paths = store.write_report(&report, markdown)?;
    METRICS.flush_since(&start);
    Ok((report, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelOutput;
    use crate::store::MemoryResultStore;

    fn raw(id: &str, text: &str) -> Sample {
        Sample::new(id, ModelOutput::Raw(text.to_string()))
    }

    fn nota_collection(stem: &str) -> Collection {
        Collection::new(
            stem,
            vec![
                raw("1", "{'cop': 'A'}").with_ground_truth("correct_answer", "A"),
                raw("2", "{'cop': 'B'}").with_ground_truth("correct_answer", "C"),
                raw("3", "no mapping here").with_ground_truth("correct_answer", "C"),
            ],
        )
    }

    fn subset_sample(id: &str, task: &str, output: &str, truth: (&str, &str)) -> Sample {
        raw(id, output)
            .with_ground_truth(DATASET_NAME_FIELD, task)
            .with_ground_truth(truth.0, truth.1)
    }

    #[test]
    fn full_mode_rows_per_collection() {
        let collections = vec![
            nota_collection("gpt3_reasoning_nota"),
            nota_collection("reasoning_nota"),
            nota_collection("gpt3_trivia"),
        ];
        let rows = count_full(&collections, &EvalConfig::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].task_name, "reasoning_nota");
        assert_eq!(rows[0].model_name.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(
            rows[0].counts,
            Counts {
                correct: 1,
                wrong: 1,
                excepted: 1
            }
        );
        assert_eq!(rows[1].model_name, None);
    }

    #[test]
    fn both_passes_penalized_first_without_total() {
        let report = evaluate(
            &[nota_collection("vinci_reasoning_nota")],
            &EvalConfig::default(),
            &EvalOptions::default(),
        );
        assert_eq!(report.passes.len(), 2);
        let point = &report.passes[0];
        assert!(point.pass.point_score);
        assert_eq!(point.rows.len(), 1);
        assert_eq!(point.rows[0].model_name.as_deref(), Some("Davinci"));
        assert!((point.rows[0].score - 0.0075).abs() < 1e-12);
        assert!((report.passes[1].rows[0].score - 0.02).abs() < 1e-12);
    }

    #[test]
    fn subset_mode_groups_by_task_and_appends_total() {
        let collection = Collection::new(
            "gpt3_mcq_sample",
            vec![
                subset_sample("1", "reasoning_nota", "{'cop': 'A'}", ("correct_answer", "A")),
                subset_sample(
                    "2",
                    "IR_pmid2title",
                    "{'paper_title': 'X'}",
                    ("Title", "Y"),
                ),
                subset_sample(
                    "3",
                    "reasoning_fake",
                    "{'cop': 'This is fiction'}",
                    ("correct_answer", "-"),
                ),
                subset_sample("4", "reasoning_trivia", "{'cop': 'A'}", ("correct_answer", "A")),
                raw("5", "{'cop': 'A'}"),
            ],
        );
        let ignored = nota_collection("gpt3_reasoning_nota");
        let options = EvalOptions {
            mode: EvalMode::Subset,
            scoring: ScoringMode::Plain,
        };
        let report = evaluate(&[collection, ignored], &EvalConfig::default(), &options);

        assert_eq!(report.passes.len(), 1);
        let rows = &report.passes[0].rows;
        let names: Vec<&str> = rows.iter().map(|r| r.task_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "IR_pmid2title",
                "reasoning_nota",
                "reasoning_fake",
                "gpt3_mcq_sample/total/avg"
            ]
        );
        assert!(rows[..3].iter().all(|r| r.excepted == 0));

        let total = rows.last().unwrap();
        assert_eq!(total.total, 3);
        assert_eq!(total.correct, 2);
        // Samples 4 and 5 name no known task.
        assert_eq!(total.excepted, 2);
        assert_eq!(total.model_name.as_deref(), Some("gpt-3.5-turbo"));
    }

    #[test]
    fn subset_collections_are_reported_separately() {
        let variant = |stem: &str, answer: &str| {
            Collection::new(
                stem,
                vec![
                    subset_sample("1", "reasoning_nota", answer, ("correct_answer", "A")),
                    subset_sample("2", "reasoning_nota", answer, ("correct_answer", "A")),
                ],
            )
        };
        let collections = vec![
            variant("gpt3_mcq_promptA", "{'cop': 'A'}"),
            variant("gpt3_mcq_promptB", "{'cop': 'D'}"),
        ];

        let groups = count_subset(&collections, &EvalConfig::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].stem, "gpt3_mcq_promptA");
        assert_eq!(groups[0].rows[0].counts.correct, 2);
        assert_eq!(groups[1].rows[0].counts.wrong, 2);

        let reports = score_subset(&groups, &[ScoringPass::plain(1.0)]);
        let rows = &reports[0].rows;
        assert_eq!(rows.len(), 4);
        let a = reports[0].row(&subset_total_name("gpt3_mcq_promptA")).unwrap();
        let b = reports[0].row(&subset_total_name("gpt3_mcq_promptB")).unwrap();
        assert_eq!(a.accuracy, Some(100.0));
        assert_eq!(b.accuracy, Some(0.0));
        assert_eq!(rows[3].task_name, "gpt3_mcq_promptB/total/avg");
    }

    #[test]
    fn subset_collection_of_unrouted_samples_still_reports_them() {
        let groups = count_subset(
            &[Collection::new("vinci_mcq_bad", vec![raw("1", "{'cop': 'A'}")])],
            &EvalConfig::default(),
        );
        let reports = score_subset(&groups, &[ScoringPass::point(1.0, -0.25)]);
        let rows = &reports[0].rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].task_name, "vinci_mcq_bad/total/avg");
        assert_eq!(rows[0].model_name.as_deref(), Some("Davinci"));
        assert_eq!((rows[0].total, rows[0].excepted), (0, 1));
        assert_eq!(rows[0].accuracy, None);
    }

    #[test]
    fn subset_mode_without_matching_collections_is_empty() {
        let options = EvalOptions {
            mode: EvalMode::Subset,
            scoring: ScoringMode::Both,
        };
        let report = evaluate(
            &[nota_collection("reasoning_nota")],
            &EvalConfig::default(),
            &options,
        );
        assert!(report.passes.iter().all(|p| p.rows.is_empty()));
    }

    #[test]
    fn run_writes_through_the_store() {
        let store = MemoryResultStore::new(vec![nota_collection("reasoning_nota")]);
        let (report, paths) = run(
            &store,
            &EvalConfig::default(),
            &EvalOptions::default(),
            true,
        )
        .unwrap();
        assert_eq!(store.written(), Some(report));
        assert!(paths.markdown.is_some());
    }
}
