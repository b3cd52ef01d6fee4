//! Engine failures.
//!
//! Problems found in submitted data are never errors here: they are
//! [`crate::report::ValidationError`] records written to the reporter. The
//! types below are for failures that stop a run and need operator attention,
//! plus cancellation which unwinds a run without a verdict.

use std::io;
use std::path::PathBuf;

use vouch_types::FileType;

use crate::normalize::Marking;

#[derive(thiserror::Error, Debug)]
pub enum ValidatorError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to write report: {0}")]
    Report(#[source] io::Error),

    #[error("row at line {line} has no column {index} ({len} fields)")]
    MalformedRow { line: u64, index: usize, len: usize },

    #[error("dictionary has no schema for {0}")]
    MissingSchema(FileType),

    #[error("schema for {file_type} has no field '{field}'")]
    UnknownField { file_type: FileType, field: String },

    #[error("failed to parse dictionary: {0}")]
    Dictionary(#[from] serde_json::Error),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("validation cancelled")]
    Cancelled,
}

impl ValidatorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ValidatorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ValidatorError::Cancelled)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NormalizationError {
    /// An observation reached allele masking already classified.
    #[error("observation at line {line} entered masking marked {marking}, expected OPEN")]
    UnexpectedMarking { line: u64, marking: Marking },

    /// An observation too short to hold the allele columns.
    #[error("observation at line {line} has {len} fields, allele masking needs {needed}")]
    MissingAlleleColumns { line: u64, len: usize, needed: usize },

    #[error("failed to write normalized output: {0}")]
    Output(#[from] io::Error),
}
