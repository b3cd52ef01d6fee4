//! Local validation of a submission directory.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use vouch::{ERRORS_FILE, SUMMARY_FILE};
use vouch_config::VouchConfig;
use vouch_types::{DataType, ValidationOutcome};
use vouch_validator::{CancellationToken, Pipeline, PipelineResult, Reporter, ValidationRequest};

use crate::style::{self, colors::SemanticStyle};

/// Exit code of a run that found problems in the data.
pub const EXIT_INVALID: u8 = 2;

pub struct ValidateArgs {
    pub dir: PathBuf,
    pub data_types: Vec<String>,
    pub report: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Requested data types; every data type when none are named.
fn parse_data_types(names: &[String]) -> Result<Vec<DataType>> {
    if names.is_empty() {
        return Ok(DataType::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            name.parse::<DataType>()
                .with_context(|| format!("expected one of: {}", known_data_types()))
        })
        .collect()
}

fn known_data_types() -> String {
    DataType::ALL
        .iter()
        .map(|data_type| data_type.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn reporter(args: &ValidateArgs) -> Result<(Reporter, Option<PathBuf>)> {
    let path = args
        .report
        .clone()
        .or_else(|| args.output.as_ref().map(|dir| dir.join(ERRORS_FILE)));

    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok((Reporter::json_lines(Box::new(BufWriter::new(file))), Some(path)))
        }
        None => Ok((Reporter::in_memory(), None)),
    }
}

pub fn run(config: &VouchConfig, args: &ValidateArgs) -> Result<ExitCode> {
    let data_types = parse_data_types(&args.data_types)?;
    let (mut reporter, report_path) = reporter(args)?;

    let mut request = ValidationRequest::new(&args.dir, data_types);
    if let Some(output) = &args.output {
        request = request.with_run_dir(output);
    }

    let pipeline = Pipeline::from_config(config);
    let result = pipeline
        .run(&request, &mut reporter, &CancellationToken::new())
        .with_context(|| format!("validation of {} failed", args.dir.display()))?;

    if let Some(output) = &args.output {
        let summary = serde_json::to_vec_pretty(&result.report)?;
        fs::create_dir_all(output)?;
        fs::write(output.join(SUMMARY_FILE), summary)
            .with_context(|| format!("failed to write summary to {}", output.display()))?;
    }

    print_result(&result, reporter.error_count(), report_path.as_deref());

    Ok(match result.outcome {
        ValidationOutcome::Valid => ExitCode::SUCCESS,
        _ => ExitCode::from(EXIT_INVALID),
    })
}

fn print_result(result: &PipelineResult, errors: u64, report_path: Option<&std::path::Path>) {
    println!("{}", "Validation".header());
    println!("{}", style::data_type_table(&result.report));

    if let Some(table) = style::error_table(&result.report) {
        println!("{table}");
    }

    if let Some(integrity) = &result.integrity {
        style::print_labeled("Files", &integrity.files.to_string());
        style::print_labeled("Rows", &integrity.rows.to_string());
    }
    if let Some(summary) = &result.normalization {
        let counters = &summary.counters;
        style::print_labeled("Observations", &counters.total_start.to_string());
        style::print_labeled("Duplicates dropped", &counters.dropped.to_string());
        style::print_labeled("Controlled", &counters.marked_as_controlled.to_string());
        style::print_labeled("Masked copies", &counters.masked.to_string());
        style::print_labeled(
            "Controlled ratio",
            &format!("{:.4} (threshold {})", summary.ratio, summary.threshold),
        );
    }

    match result.outcome {
        ValidationOutcome::Valid => style::print_success("submission is VALID"),
        outcome => {
            style::print_failure(&format!("submission is {outcome} with {errors} error(s)"));
            match report_path {
                Some(path) => style::print_hint(&format!("details in {}", path.display())),
                None => style::print_hint("rerun with --report FILE for the full error list"),
            }
        }
    }
    if result.integrity.is_none() && result.outcome != ValidationOutcome::Valid {
        style::print_warn("structural errors stopped the run before integrity checks");
    }
}
