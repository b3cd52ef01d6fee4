//! The ordered validation stages for one submission.
//!
//! structural checks → deletion manifest → referential integrity →
//! normalization. Structural errors that make key extraction meaningless end
//! the run after the structural stage. Normalization only runs on a
//! submission that is clean so far.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use vouch_config::{NormalizerConfig, ValidatorConfig, VouchConfig};
use vouch_types::{DataType, FileType, SubmissionReport, ValidationOutcome};

use crate::cancel::CancellationToken;
use crate::checker::FileChecker;
use crate::deletion::DeletionManifest;
use crate::dictionary::Dictionary;
use crate::error::{NormalizationError, ValidatorError};
use crate::integrity::{IntegrityEngine, IntegrityStats};
use crate::interner::Interner;
use crate::normalize::{Counters, NORMALIZED_FILE, NormalizationSummary, Normalizer};
use crate::report::Reporter;
use crate::source;
use crate::submission::{SubmissionFiles, file_name};

/// What to validate.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub submission_dir: PathBuf,
    pub data_types: BTreeSet<DataType>,
    /// Directory for the normalized output; discarded when `None`.
    pub run_dir: Option<PathBuf>,
}

impl ValidationRequest {
    pub fn new(submission_dir: impl Into<PathBuf>, data_types: impl IntoIterator<Item = DataType>) -> Self {
        Self {
            submission_dir: submission_dir.into(),
            data_types: data_types.into_iter().collect(),
            run_dir: None,
        }
    }

    pub fn with_run_dir(mut self, run_dir: impl Into<PathBuf>) -> Self {
        self.run_dir = Some(run_dir.into());
        self
    }

    /// Requested data types plus the clinical core they depend on.
    pub fn effective_data_types(&self) -> BTreeSet<DataType> {
        let mut data_types = self.data_types.clone();
        data_types.insert(DataType::Clinical);
        data_types
    }
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub outcome: ValidationOutcome,
    /// Per data type states and error counts of this run.
    pub report: SubmissionReport,
    pub integrity: Option<IntegrityStats>,
    pub normalization: Option<NormalizationSummary>,
}

pub struct Pipeline {
    dictionary: Arc<Dictionary>,
    validator: ValidatorConfig,
    normalizer: NormalizerConfig,
    interner: Arc<Interner>,
}

impl Pipeline {
    pub fn new(
        dictionary: Arc<Dictionary>,
        validator: ValidatorConfig,
        normalizer: NormalizerConfig,
        interner: Arc<Interner>,
    ) -> Self {
        Self {
            dictionary,
            validator,
            normalizer,
            interner,
        }
    }

    /// Built-in dictionary and the process-wide interning pool.
    pub fn from_config(config: &VouchConfig) -> Self {
        Self::new(
            Arc::new(Dictionary::builtin()),
            config.validator.clone(),
            config.normalizer.clone(),
            Interner::shared(),
        )
    }

    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// Runs every stage.
    ///
    /// Problems with the data end up in `reporter` and an INVALID outcome.
    /// Cancellation yields a CANCELLED outcome with an empty report. Any
    /// other `Err` is an engine failure.
    pub fn run(
        &self,
        request: &ValidationRequest,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<PipelineResult, ValidatorError> {
        let data_types = request.effective_data_types();
        match self.run_stages(request, &data_types, reporter, token) {
            Err(ValidatorError::Cancelled) => {
                tracing::info!(dir = %request.submission_dir.display(), "validation cancelled");
                Ok(PipelineResult {
                    outcome: ValidationOutcome::Cancelled,
                    report: SubmissionReport::new(),
                    integrity: None,
                    normalization: None,
                })
            }
            other => other,
        }
    }

    fn run_stages(
        &self,
        request: &ValidationRequest,
        data_types: &BTreeSet<DataType>,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<PipelineResult, ValidatorError> {
        let dir = &request.submission_dir;
        let files = SubmissionFiles::scan(dir, data_types)?;
        tracing::info!(
            dir = %dir.display(),
            file_types = files.file_types().count(),
            "starting validation"
        );

        let structural = FileChecker::new(&self.validator).check_submission(
            &files,
            &self.dictionary,
            reporter,
            token,
        )?;
        tracing::info!(errors = structural, "structural checks done");
        if reporter.halting_count() > 0 {
            return self.finish(data_types, reporter, None, None);
        }

        let deletions = match files.deletion_manifest() {
            Some(path) => DeletionManifest::parse(source::open(path)?, &file_name(path), reporter)?,
            None => DeletionManifest::new(),
        };

        let integrity = IntegrityEngine::new(&self.dictionary, &self.interner, &self.validator, &deletions)
            .run(&files, reporter, token)?;

        let normalization = if files.contains(FileType::SsmP) && !reporter.has_errors() {
            Some(self.normalize(&files, request, reporter, token)?)
        } else {
            None
        };

        self.finish(data_types, reporter, Some(integrity), normalization)
    }

    fn normalize(
        &self,
        files: &SubmissionFiles,
        request: &ValidationRequest,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<NormalizationSummary, ValidatorError> {
        let schema = self.dictionary.schema(FileType::SsmP)?;
        let mut normalizer = Normalizer::new(schema, &self.normalizer, &self.validator)?;

        let mut output: Box<dyn Write> = match &request.run_dir {
            Some(run_dir) => {
                std::fs::create_dir_all(run_dir).map_err(NormalizationError::from)?;
                let path = run_dir.join(NORMALIZED_FILE);
                Box::new(BufWriter::new(File::create(&path).map_err(NormalizationError::from)?))
            }
            None => Box::new(io::sink()),
        };

        let mut counters = Counters::default();
        let paths = files.paths(FileType::SsmP);
        for (i, path) in paths.iter().enumerate() {
            let name = file_name(path);
            tracing::info!(file = %name, "normalizing");
            normalizer.normalize_file(&name, source::open(path)?, &mut *output, i == 0, &mut counters, token)?;
        }
        output.flush().map_err(NormalizationError::from)?;

        let report_name = paths.first().map(|path| file_name(path)).unwrap_or_default();
        normalizer.finish(counters, &report_name, reporter)
    }

    fn finish(
        &self,
        data_types: &BTreeSet<DataType>,
        reporter: &mut Reporter,
        integrity: Option<IntegrityStats>,
        normalization: Option<NormalizationSummary>,
    ) -> Result<PipelineResult, ValidatorError> {
        reporter.flush()?;
        let outcome = if reporter.has_errors() {
            ValidationOutcome::Invalid
        } else {
            ValidationOutcome::Valid
        };
        tracing::info!(?outcome, errors = reporter.error_count(), "validation finished");

        Ok(PipelineResult {
            outcome,
            report: reporter.summary(data_types.iter().copied()),
            integrity,
            normalization,
        })
    }
}
