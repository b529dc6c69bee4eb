//! Prediction conversion: joins raw prediction CSVs with their dataset CSVs
//! and writes result collections the store can evaluate.
//!
//! A prediction file is `<prefix>.csv` with no header and two columns,
//! `id,output`. Its dataset is `<dataset_dir>/<task>.csv` with a header that
//! includes `id`. Rows are inner-joined on `id` in dataset order.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde_json::{Map, Value};

use crate::config::EvalConfig;
use crate::domain::{HaltError, ModelOutput, Result, Sample, TaskKind};
use crate::obs;
use crate::parse::LooseParser;
use crate::store::write_collection;

/// One row of a prediction file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub id: String,
    pub output: String,
}

/// A collection written by the converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedCollection {
    pub task: TaskKind,
    pub path: PathBuf,
    pub samples: usize,
    /// Distinct prediction ids with no dataset row.
    pub unmatched: usize,
}

/// `<tag>_<task>` or the bare task name.
pub fn collection_stem(task: TaskKind, model_tag: Option<&str>) -> String {
    match model_tag {
        Some(tag) if !tag.is_empty() => format!("{tag}_{}", task.name()),
        _ => task.name().to_string(),
    }
}

/// Read a headerless `id,output` file. A missing output is empty text.
pub fn read_predictions(path: &Path) -> Result<Vec<Prediction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut predictions = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let Some(id) = record.get(0) else { continue };
        predictions.push(Prediction {
            id: id.trim().to_string(),
            output: record.get(1).unwrap_or("").to_string(),
        });
    }
    Ok(predictions)
}

/// Read a dataset CSV into one ground-truth record per row. Every cell is
/// kept as text.
pub fn read_dataset(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers = rdr.headers()?.clone();
    if !headers.iter().any(|h| h == "id") {
        return Err(HaltError::InvalidCollection {
            path: path.to_path_buf(),
            reason: "dataset has no id column".to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn row_id(row: &Map<String, Value>) -> Option<String> {
    row.get("id")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
}

/// Distinct prediction ids that found no dataset row.
pub fn unmatched_predictions(predictions: &[Prediction], samples: &[Sample]) -> usize {
    let joined: HashSet<&str> = samples.iter().map(|s| s.id.as_str()).collect();
    predictions
        .iter()
        .map(|p| p.id.as_str())
        .filter(|id| !joined.contains(id))
        .collect::<HashSet<_>>()
        .len()
}

/// Inner join on `id`, in dataset order. Later predictions for the same id
/// replace earlier ones. Outputs are parsed so the collection carries
/// field maps.
pub fn join_predictions(
    dataset: Vec<Map<String, Value>>,
    predictions: &[Prediction],
    parser: &LooseParser,
) -> Vec<Sample> {
    let by_id: HashMap<&str, &str> = predictions
        .iter()
        .map(|p| (p.id.as_str(), p.output.as_str()))
        .collect();

    dataset
        .into_iter()
        .filter_map(|row| {
            let id = row_id(&row)?;
            let raw = by_id.get(id.as_str())?;
            let parsed = parser.parse_sample(&id, raw);
            Some(Sample {
                id,
                output: ModelOutput::Parsed(parsed.output),
                testbed_data: row,
            })
        })
        .collect()
}

/// Converts prediction folders into result collections.
#[derive(Debug, Clone)]
pub struct Converter {
    parser: LooseParser,
    report_stem: String,
    model_tag: Option<String>,
}

impl Converter {
    pub fn new(config: &EvalConfig) -> Self {
        Self {
            parser: LooseParser::new(config.stop_sentinel.clone()),
            report_stem: config.report_stem.clone(),
            model_tag: None,
        }
    }

    pub fn with_model_tag(mut self, tag: Option<String>) -> Self {
        self.model_tag = tag;
        self
    }

    /// Convert one prediction file; the task comes from the file prefix.
    pub fn convert_file(
        &self,
        prediction: &Path,
        dataset_dir: &Path,
        out_dir: &Path,
    ) -> Result<ConvertedCollection> {
        let prefix = prediction_prefix(prediction)?;
        let task = TaskKind::from_prediction_prefix(prefix)?;

        let dataset = read_dataset(&dataset_dir.join(format!("{}.csv", task.name())))?;
        let predictions = read_predictions(prediction)?;
        let samples = join_predictions(dataset, &predictions, &self.parser);

        let path = out_dir.join(format!(
            "{}.json",
            collection_stem(task, self.model_tag.as_deref())
        ));
        write_collection(&path, &samples)?;
        tracing::info!(
            event = "collection.converted",
            task = %task,
            path = %path.display(),
            samples = samples.len(),
        );

        Ok(ConvertedCollection {
            task,
            path,
            samples: samples.len(),
            unmatched: unmatched_predictions(&predictions, &samples),
        })
    }

    /// Convert every `*.csv` in `prediction_dir` except the report. Files
    /// with an unknown prefix are skipped with a warning.
    pub fn convert_folder(
        &self,
        prediction_dir: &Path,
        dataset_dir: &Path,
        out_dir: &Path,
    ) -> Result<Vec<ConvertedCollection>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(prediction_dir)? {
            let path = entry?.path();
            let is_csv = path.extension().and_then(|e| e.to_str()) == Some("csv");
            let is_report =
                path.file_stem().and_then(|s| s.to_str()) == Some(self.report_stem.as_str());
            if path.is_file() && is_csv && !is_report {
                files.push(path);
            }
        }
        files.sort();

        fs::create_dir_all(out_dir)?;
        let mut converted = Vec::new();
        for file in files {
            match self.convert_file(&file, dataset_dir, out_dir) {
                Ok(c) => converted.push(c),
                Err(err @ HaltError::UnknownPredictionPrefix(_)) => {
                    obs::emit_collection_skipped(&file.display().to_string(), &err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(converted)
    }
}

/// File name up to the first `.`.
fn prediction_prefix(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .ok_or_else(|| HaltError::InvalidCollection {
            path: path.to_path_buf(),
            reason: "file name is not valid UTF-8".to_string(),
        })
}
