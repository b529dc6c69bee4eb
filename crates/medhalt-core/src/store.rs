//! Result-store adapter: reads result collections and writes the report.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::domain::{HaltError, Result, Sample};
use crate::obs;
use crate::reporting::{self, EvaluationReport};

/// One result collection: the samples of a `*.json` file and its stem.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub stem: String,
    pub path: PathBuf,
    pub samples: Vec<Sample>,
}

impl Collection {
    pub fn new(stem: impl Into<String>, samples: Vec<Sample>) -> Self {
        let stem = stem.into();
        Self {
            path: PathBuf::from(format!("{stem}.json")),
            stem,
            samples,
        }
    }
}

/// Where a report was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub markdown: Option<PathBuf>,
}

impl ReportPaths {
    /// Sibling `.json` and `.md` paths share the CSV's stem.
    pub fn from_csv(csv: impl Into<PathBuf>, markdown: bool) -> Self {
        let csv = csv.into();
        Self {
            json: csv.with_extension("json"),
            markdown: markdown.then(|| csv.with_extension("md")),
            csv,
        }
    }
}

/// Source of result collections and sink for the final report.
pub trait ResultStore {
    /// Every collection in the store, in a stable order. Report files are
    /// never returned.
    fn load_collections(&self) -> Result<Vec<Collection>>;

    fn write_report(&self, report: &EvaluationReport, markdown: bool) -> Result<ReportPaths>;
}

/// Directory of `*.json` collections, the layout the converter writes.
pub struct FsResultStore {
    root: PathBuf,
    report_csv: PathBuf,
}

impl FsResultStore {
    /// Store rooted at `root`; the report is `<root>/<report_stem>.csv`.
    pub fn new(root: impl AsRef<Path>, report_stem: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            report_csv: root.join(format!("{report_stem}.csv")),
            root,
        }
    }

    /// Write the report to `csv` (and siblings) instead of the store root.
    pub fn with_report_path(mut self, csv: impl Into<PathBuf>) -> Self {
        self.report_csv = csv.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_report_file(&self, path: &Path) -> bool {
        let report_json = self.report_csv.with_extension("json");
        path.file_name().is_some() && path.file_name() == report_json.file_name()
    }

    /// Collection files under the root, sorted by name.
    pub fn collection_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
            if path.is_file() && is_json && !self.is_report_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// True for a report written by an earlier run, whatever its file name.
pub fn is_report_artifact(value: &Value) -> bool {
    value.get("schema_version").is_some() && value.get("passes").is_some()
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read one collection file: a JSON array of sample records.
pub fn read_collection(path: &Path) -> Result<Collection> {
    collection_from_value(path, read_json(path)?)
}

fn collection_from_value(path: &Path, value: Value) -> Result<Collection> {
    if !value.is_array() {
        return Err(HaltError::InvalidCollection {
            path: path.to_path_buf(),
            reason: "expected a JSON array of samples".to_string(),
        });
    }
    let samples: Vec<Sample> =
        serde_json::from_value(value).map_err(|e| HaltError::InvalidCollection {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| HaltError::InvalidCollection {
            path: path.to_path_buf(),
            reason: "file name is not valid UTF-8".to_string(),
        })?
        .to_string();

    obs::emit_collection_loaded(&path.display().to_string(), samples.len());
    Ok(Collection {
        stem,
        path: path.to_path_buf(),
        samples,
    })
}

/// Write a collection as pretty JSON.
pub fn write_collection(path: &Path, samples: &[Sample]) -> Result<()> {
    let content = serde_json::to_string_pretty(samples)?;
    fs::write(path, content)?;
    Ok(())
}

impl ResultStore for FsResultStore {
    fn load_collections(&self) -> Result<Vec<Collection>> {
        let mut collections = Vec::new();
        for path in self.collection_paths()? {
            let value = read_json(&path)?;
            if is_report_artifact(&value) {
                obs::emit_collection_skipped(&path.display().to_string(), &"evaluation report");
                continue;
            }
            collections.push(collection_from_value(&path, value)?);
        }
        Ok(collections)
    }

    fn write_report(&self, report: &EvaluationReport, markdown: bool) -> Result<ReportPaths> {
        let paths = ReportPaths::from_csv(&self.report_csv, markdown);
        if let Some(parent) = paths.csv.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        reporting::write_report_csv(&paths.csv, report)?;
        reporting::write_report_json(&paths.json, report)?;
        if let Some(md) = &paths.markdown {
            reporting::write_report_md(md, report)?;
        }
        obs::emit_report_written(&paths.csv.display().to_string(), report.row_count());
        Ok(paths)
    }
}

/// In-memory store for tests and embedding; keeps the last written report.
#[derive(Default)]
pub struct MemoryResultStore {
    collections: Vec<Collection>,
    written: RefCell<Option<EvaluationReport>>,
}

impl MemoryResultStore {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self {
            collections,
            written: RefCell::new(None),
        }
    }

    pub fn written(&self) -> Option<EvaluationReport> {
        self.written.borrow().clone()
    }
}

impl ResultStore for MemoryResultStore {
    fn load_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.collections.clone())
    }

    fn write_report(&self, report: &EvaluationReport, markdown: bool) -> Result<ReportPaths> {
        *self.written.borrow_mut() = Some(report.clone());
        Ok(ReportPaths::from_csv("memory://results.csv", markdown))
    }
}
