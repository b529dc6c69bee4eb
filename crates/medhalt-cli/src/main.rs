//! MedHalt CLI
//!
//! The `medhalt` command scores model outputs for the MedHalt benchmark.
//!
//! ## Commands
//!
//! - `evaluate`: Score result collections and write `results.csv`/`results.json`
//! - `convert`: Join prediction CSVs with their datasets into result collections
//! - `parse`: Show the field map recovered from one raw output

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, Level};

use medhalt_core::{
    Converter, EvalConfig, EvalMode, EvalOptions, EvaluationReport, FsResultStore, LooseParser,
    ScoringMode,
};

#[derive(Parser)]
#[command(name = "medhalt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score model outputs on the MedHalt medical hallucination benchmark", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every result collection in a folder
    Evaluate {
        /// Folder holding `*.json` result collections (and prediction CSVs)
        #[arg(long)]
        prediction_folder: PathBuf,

        /// Folder holding the benchmark dataset CSVs
        #[arg(long)]
        dataset_folder: Option<PathBuf>,

        /// Convert prediction CSVs to collections before scoring
        #[arg(long, requires = "dataset_folder")]
        do_json_conversion: bool,

        /// Model tag prefixed to converted collection names
        #[arg(long)]
        model_tag: Option<String>,

        /// Scoring passes to run
        #[arg(long, value_enum, default_value_t = ScoringArg::Both)]
        scoring: ScoringArg,

        /// Full dataset (one collection per task) or mixed-task subsets
        #[arg(long, value_enum, default_value_t = ModeArg::Full)]
        mode: ModeArg,

        /// Substring selecting subset collections (default from config: `mcq`)
        #[arg(long)]
        subset_filter: Option<String>,

        /// Report CSV path (default: `<prediction-folder>/results.csv`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON config file overriding key lists, vocabulary and scores
        #[arg(long, env = "MEDHALT_CONFIG")]
        config: Option<PathBuf>,

        /// Also write a Markdown summary next to the CSV
        #[arg(long)]
        markdown: bool,
    },

    /// Convert prediction CSVs into result collections
    Convert {
        /// Folder holding `<prefix>.csv` prediction files
        #[arg(long)]
        prediction_folder: PathBuf,

        /// Folder holding the benchmark dataset CSVs
        #[arg(long)]
        dataset_folder: PathBuf,

        /// Model tag prefixed to collection names
        #[arg(long)]
        model_tag: Option<String>,

        /// JSON config file
        #[arg(long, env = "MEDHALT_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Parse one raw model output and print the recovered fields as JSON
    Parse {
        /// Raw output text
        raw: String,

        /// Stop sentinel stripped from the output
        #[arg(long)]
        stop_sentinel: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ScoringArg {
    Both,
    Plain,
    Point,
}

impl From<ScoringArg> for ScoringMode {
    fn from(arg: ScoringArg) -> Self {
        match arg {
            ScoringArg::Both => ScoringMode::Both,
            ScoringArg::Plain => ScoringMode::Plain,
            ScoringArg::Point => ScoringMode::Point,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Full,
    Subset,
}

impl From<ModeArg> for EvalMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Full => EvalMode::Full,
            ModeArg::Subset => EvalMode::Subset,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    medhalt_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Evaluate {
            prediction_folder,
            dataset_folder,
            do_json_conversion,
            model_tag,
            scoring,
            mode,
            subset_filter,
            output,
            config,
            markdown,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(filter) = subset_filter {
                config.subset_filter = filter;
            }
            if do_json_conversion {
                let dataset_folder = dataset_folder
                    .context("--do-json-conversion needs --dataset-folder")?;
                cmd_convert(&config, &prediction_folder, &dataset_folder, model_tag)?;
            }
            let options = EvalOptions {
                mode: mode.into(),
                scoring: scoring.into(),
            };
            cmd_evaluate(&config, &prediction_folder, output, &options, markdown).map(|_| ())
        }
        Commands::Convert {
            prediction_folder,
            dataset_folder,
            model_tag,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            cmd_convert(&config, &prediction_folder, &dataset_folder, model_tag)
        }
        Commands::Parse { raw, stop_sentinel } => {
            let parser = match stop_sentinel {
                Some(sentinel) => LooseParser::new(sentinel),
                None => LooseParser::default(),
            };
            let value = parse_to_json(&parser, &raw);
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EvalConfig> {
    match path {
        Some(path) => EvalConfig::from_path(path)
            .with_context(|| format!("Failed to load config: {:?}", path)),
        None => Ok(EvalConfig::default()),
    }
}

/// Convert prediction CSVs into collections in the same folder.
fn cmd_convert(
    config: &EvalConfig,
    prediction_folder: &Path,
    dataset_folder: &Path,
    model_tag: Option<String>,
) -> Result<()> {
    let converted = Converter::new(config)
        .with_model_tag(model_tag)
        .convert_folder(prediction_folder, dataset_folder, prediction_folder)
        .with_context(|| format!("Failed to convert predictions in {:?}", prediction_folder))?;

    for c in &converted {
        println!(
            "Converted {} -> {:?} ({} samples, {} unmatched)",
            c.task, c.path, c.samples, c.unmatched
        );
    }
    info!(collections = converted.len(), "conversion finished");
    Ok(())
}

/// Score the collections in `prediction_folder` and write the report.
fn cmd_evaluate(
    config: &EvalConfig,
    prediction_folder: &Path,
    output: Option<PathBuf>,
    options: &EvalOptions,
    markdown: bool,
) -> Result<EvaluationReport> {
    let mut store = FsResultStore::new(prediction_folder, &config.report_stem);
    if let Some(output) = output {
        store = store.with_report_path(output);
    }

    let (report, paths) = medhalt_core::run(&store, config, options, markdown)
        .with_context(|| format!("Failed to evaluate collections in {:?}", prediction_folder))?;

    for pass in &report.passes {
        let label = if pass.pass.point_score {
            "point"
        } else {
            "plain"
        };
        for row in &pass.rows {
            println!(
                "[{label}] {:<24} {:<16} total={:<5} correct={:<5} wrong={:<5} excepted={:<5} accuracy={}",
                row.task_name,
                row.model_name.as_deref().unwrap_or("-"),
                row.total,
                row.correct,
                row.wrong,
                row.excepted,
                medhalt_core::reporting::format_metric(row.accuracy),
            );
        }
    }
    println!("Report written to {:?}", paths.csv);
    if let Some(md) = &paths.markdown {
        println!("Summary written to {:?}", md);
    }
    Ok(report)
}

fn parse_to_json(parser: &LooseParser, raw: &str) -> serde_json::Value {
    let parsed = parser.parse(raw);
    json!({
        "path": parsed.path,
        "output": parsed.output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_evaluate_defaults() {
        let cli = Cli::try_parse_from(["medhalt", "evaluate", "--prediction-folder", "preds"])
            .unwrap();
        let Commands::Evaluate {
            prediction_folder,
            scoring,
            mode,
            do_json_conversion,
            markdown,
            ..
        } = cli.command
        else {
            panic!("expected evaluate");
        };
        assert_eq!(prediction_folder, PathBuf::from("preds"));
        assert_eq!(scoring, ScoringArg::Both);
        assert_eq!(mode, ModeArg::Full);
        assert!(!do_json_conversion);
        assert!(!markdown);
    }

    #[test]
    fn test_conversion_requires_dataset_folder() {
        let result = Cli::try_parse_from([
            "medhalt",
            "evaluate",
            "--prediction-folder",
            "preds",
            "--do-json-conversion",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "medhalt",
            "--json",
            "evaluate",
            "--prediction-folder",
            "preds",
            "--dataset-folder",
            "data",
            "--do-json-conversion",
            "--scoring",
            "point",
            "--mode",
            "subset",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Evaluate { scoring, mode, .. } = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(ScoringMode::from(scoring), ScoringMode::Point);
        assert_eq!(EvalMode::from(mode), EvalMode::Subset);
    }

    #[test]
    fn test_rejects_unknown_scoring() {
        assert!(Cli::try_parse_from([
            "medhalt",
            "evaluate",
            "--prediction-folder",
            "p",
            "--scoring",
            "strict",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_command_output() {
        let value = parse_to_json(&LooseParser::default(), "{'cop': 'It's B'}\nStop Here");
        assert_eq!(value["path"], json!("strict"));
        assert_eq!(value["output"], json!({"cop": "Its B"}));

        let value = parse_to_json(&LooseParser::default(), "no fields");
        assert_eq!(value["path"], json!("failed"));
        assert_eq!(value["output"], json!({}));
    }

    #[test]
    fn test_convert_then_evaluate() {
        let preds = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write(
            data.path(),
            "reasoning_nota.csv",
            "id,question,correct_answer\n1,q1,A\n2,q2,B\n3,q3,C\n",
        );
        write(
            preds.path(),
            "Nota.csv",
            "1,\"{'cop': 'A'}\"\n2,\"{'cop': 'D'}\"\n3,unparseable\n",
        );

        let config = EvalConfig::default();
        cmd_convert(&config, preds.path(), data.path(), Some("gpt3".to_string())).unwrap();
        let report = cmd_evaluate(
            &config,
            preds.path(),
            None,
            &EvalOptions::default(),
            true,
        )
        .unwrap();

        assert_eq!(report.passes.len(), 2);
        let row = &report.passes[0].rows[0];
        assert_eq!(row.task_name, "reasoning_nota");
        assert_eq!(row.model_name.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!((row.correct, row.wrong, row.excepted), (1, 1, 1));
        assert!(preds.path().join("results.csv").exists());
        assert!(preds.path().join("results.json").exists());
        assert!(preds.path().join("results.md").exists());
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/medhalt.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
