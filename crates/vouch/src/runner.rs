//! The seam between the engine and whatever validates a submission.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use vouch_config::{EngineConfig, VouchConfig};
use vouch_types::{DataType, ProjectKey, ReleaseName, RunSummary, SubmissionReport, ValidationOutcome};
use vouch_validator::{CancellationToken, Pipeline, Reporter, ValidationRequest};

use crate::error::{EngineError, EngineResult};

/// Name of the JSON lines error report inside a run directory.
pub const ERRORS_FILE: &str = "errors.jsonl";

/// Name of the summary report inside a run directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// One admitted validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub release: ReleaseName,
    pub project: ProjectKey,
    pub data_types: BTreeSet<DataType>,
    pub run_id: String,
}

/// What a run hands back to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub outcome: ValidationOutcome,
    pub report: SubmissionReport,
}

impl RunOutput {
    pub fn new(outcome: ValidationOutcome, report: SubmissionReport) -> Self {
        Self { outcome, report }
    }
}

/// Validates one admitted submission.
///
/// Called from worker threads without the state lock held. `Err` means the
/// engine failed and the submission ends in ERROR; data problems belong in
/// an INVALID outcome.
pub trait SubmissionRunner: Send + Sync + 'static {
    fn run(&self, context: &RunContext, token: &CancellationToken) -> EngineResult<RunOutput>;
}

/// Runs the validation pipeline over `<fs_root>/<release>/<project>/`.
///
/// Every run gets its own directory `<report_dir>/<release>/<project>/<run_id>/`
/// holding the error report, the summary and any normalized output.
pub struct PipelineRunner {
    pipeline: Pipeline,
    engine: EngineConfig,
}

impl PipelineRunner {
    pub fn new(pipeline: Pipeline, engine: &EngineConfig) -> Self {
        Self {
            pipeline,
            engine: engine.clone(),
        }
    }

    pub fn from_config(config: &VouchConfig) -> Self {
        Self::new(Pipeline::from_config(config), &config.engine)
    }

    pub fn submission_dir(&self, context: &RunContext) -> PathBuf {
        self.engine
            .submission_dir(context.release.as_str(), context.project.as_str())
    }

    pub fn run_dir(&self, context: &RunContext) -> PathBuf {
        self.engine
            .run_dir(context.release.as_str(), context.project.as_str(), &context.run_id)
    }

    fn write_summary(run_dir: &Path, report: &SubmissionReport) -> EngineResult<()> {
        let json = serde_json::to_vec_pretty(report)
            .map_err(|e| EngineError::internal(format!("failed to render summary: {e}")))?;
        fs::write(run_dir.join(SUMMARY_FILE), json)?;
        Ok(())
    }
}

impl SubmissionRunner for PipelineRunner {
    fn run(&self, context: &RunContext, token: &CancellationToken) -> EngineResult<RunOutput> {
        let run_dir = self.run_dir(context);
        fs::create_dir_all(&run_dir)?;
        let errors_path = run_dir.join(ERRORS_FILE);
        let mut reporter = Reporter::json_lines(Box::new(BufWriter::new(File::create(&errors_path)?)));

        let request = ValidationRequest::new(self.submission_dir(context), context.data_types.iter().copied())
            .with_run_dir(&run_dir);
        let result = self.pipeline.run(&request, &mut reporter, token);

        // Keys of this run are gone; drop their components from the pool.
        self.pipeline.interner().purge();
        tracing::debug!(
            run_id = %context.run_id,
            pooled = self.pipeline.interner().len(),
            "interning pool purged"
        );

        let result = result?;
        let mut report = result.report;
        if result.outcome == ValidationOutcome::Cancelled {
            // Nothing from an interrupted run is kept as a report.
            drop(reporter);
            fs::remove_dir_all(&run_dir)?;
            tracing::debug!(run_id = %context.run_id, "discarded cancelled run output");
        } else {
            report.last_run = Some(RunSummary {
                run_id: context.run_id.clone(),
                errors_path: Some(errors_path.display().to_string()),
                error_count: reporter.error_count(),
            });
            Self::write_summary(&run_dir, &report)?;
        }

        Ok(RunOutput::new(result.outcome, report))
    }
}
