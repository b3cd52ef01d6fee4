//! Append-only sink for validation errors.
//!
//! Every problem found in submitted data becomes one immutable
//! [`ValidationError`] record. Records are streamed to the sink as they are
//! found (JSON lines on disk, or memory for tests and the CLI) while the
//! [`Reporter`] keeps per-file counts for the submission summary.

use std::io::{BufWriter, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vouch_types::{DataType, DataTypeState, ErrorKind, ErrorType, FileType, SubmissionReport};

use crate::error::ValidatorError;

/// Line number used for records that are not tied to one row.
pub const NO_LINE: i64 = -1;

/// One problem found in a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub file_type: Option<FileType>,
    pub file_name: String,
    pub field_names: Vec<String>,
    pub line_number: i64,
    pub value: Vec<String>,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl ValidationError {
    pub fn new(error_type: ErrorType, file_type: Option<FileType>, file_name: &str) -> Self {
        Self {
            file_type,
            file_name: file_name.to_string(),
            field_names: Vec::new(),
            line_number: NO_LINE,
            value: Vec::new(),
            error_type,
            params: None,
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line_number = i64::try_from(line).unwrap_or(i64::MAX);
        self
    }

    pub fn with_fields(mut self, field_names: &[String]) -> Self {
        self.field_names = field_names.to_vec();
        self
    }

    pub fn with_value(mut self, value: Vec<String>) -> Self {
        self.value = value;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.error_type.kind()
    }

    /// Data type the record is counted under.
    pub fn data_type(&self) -> DataType {
        self.file_type
            .map_or(DataType::Clinical, FileType::data_type)
    }
}

enum Sink {
    JsonLines(BufWriter<Box<dyn Write + Send>>),
    Memory(Vec<ValidationError>),
}

/// Collects the errors of one validation run.
pub struct Reporter {
    sink: Sink,
    summary: SubmissionReport,
    total: u64,
    halting: u64,
}

impl Reporter {
    /// Streams records as JSON lines to `writer`.
    pub fn json_lines(writer: Box<dyn Write + Send>) -> Self {
        Self::with_sink(Sink::JsonLines(BufWriter::new(writer)))
    }

    /// Keeps records in memory, see [`Reporter::errors`].
    pub fn in_memory() -> Self {
        Self::with_sink(Sink::Memory(Vec::new()))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            sink,
            summary: SubmissionReport::new(),
            total: 0,
            halting: 0,
        }
    }

    pub fn report(&mut self, error: ValidationError) -> Result<(), ValidatorError> {
        tracing::debug!(
            file = %error.file_name,
            line = error.line_number,
            error_type = %error.error_type,
            value = ?error.value,
            "validation error"
        );

        self.summary
            .record_error(error.data_type(), &error.file_name, error.error_type);
        self.total += 1;
        if error.error_type.halts_pipeline() {
            self.halting += 1;
        }

        match &mut self.sink {
            Sink::JsonLines(writer) => {
                serde_json::to_writer(&mut *writer, &error)
                    .map_err(|e| ValidatorError::Report(e.into()))?;
                writer.write_all(b"\n").map_err(ValidatorError::Report)?;
            }
            Sink::Memory(errors) => errors.push(error),
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ValidatorError> {
        if let Sink::JsonLines(writer) = &mut self.sink {
            writer.flush().map_err(ValidatorError::Report)?;
        }
        Ok(())
    }

    pub fn error_count(&self) -> u64 {
        self.total
    }

    pub fn has_errors(&self) -> bool {
        self.total > 0
    }

    /// Errors after which later stages must not run.
    pub fn halting_count(&self) -> u64 {
        self.halting
    }

    pub fn count_for(&self, data_type: DataType) -> u64 {
        self.summary
            .data_types
            .get(&data_type)
            .map_or(0, |report| report.error_count())
    }

    /// Records kept by an in-memory reporter; empty for JSON lines.
    pub fn errors(&self) -> &[ValidationError] {
        match &self.sink {
            Sink::Memory(errors) => errors,
            Sink::JsonLines(_) => &[],
        }
    }

    /// Summary of the run with each data type marked valid or invalid.
    pub fn summary(&self, data_types: impl IntoIterator<Item = DataType>) -> SubmissionReport {
        let mut summary = self.summary.clone();
        for data_type in data_types {
            let state = if self.count_for(data_type) > 0 {
                DataTypeState::Invalid
            } else {
                DataTypeState::Valid
            };
            summary.data_types.entry(data_type).or_default().state = state;
        }
        summary
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("total", &self.total)
            .field("halting", &self.halting)
            .finish_non_exhaustive()
    }
}
