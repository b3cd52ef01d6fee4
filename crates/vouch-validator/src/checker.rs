//! Structural checks on submitted files.
//!
//! Each file is streamed once through an ordered list of row checks. With
//! `fail_fast` the first halting error ends the stage; otherwise every error
//! in every file is reported. A missing line terminator never ends the stage,
//! so every file reaching integrity has been fully checked.

use serde_json::json;
use vouch_config::ValidatorConfig;
use vouch_types::{ErrorType, FileType};

use crate::cancel::{CancellationToken, Checkpoint};
use crate::dictionary::{Dictionary, FileSchema};
use crate::error::ValidatorError;
use crate::reader::{FIELD_SEPARATOR, Line, LineReader};
use crate::report::{Reporter, ValidationError};
use crate::source;
use crate::submission::{SubmissionFiles, file_name};

/// What a row check sees besides the line itself.
pub struct FileContext<'a> {
    pub file_type: FileType,
    pub file_name: &'a str,
    pub schema: &'a FileSchema,
    header: Vec<u8>,
}

impl<'a> FileContext<'a> {
    pub fn new(file_type: FileType, file_name: &'a str, schema: &'a FileSchema) -> Self {
        Self {
            file_type,
            file_name,
            schema,
            header: header_line(schema),
        }
    }

    fn error(&self, error_type: ErrorType, line: &Line<'_>) -> ValidationError {
        ValidationError::new(error_type, Some(self.file_type), self.file_name).at_line(line.number)
    }
}

pub type RowCheck = fn(&FileContext<'_>, &Line<'_>) -> Option<ValidationError>;

/// The header must list the schema's field names, in order.
pub fn check_header(context: &FileContext<'_>, line: &Line<'_>) -> Option<ValidationError> {
    if line.number != 1 || line.content == context.header.as_slice() {
        return None;
    }
    let found = line
        .fields()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();
    Some(
        context
            .error(ErrorType::FileHeader, line)
            .with_fields(&context.schema.field_names)
            .with_value(found),
    )
}

/// Every non-blank data row splits into exactly the schema's column count.
pub fn check_column_count(context: &FileContext<'_>, line: &Line<'_>) -> Option<ValidationError> {
    if line.number == 1 || line.is_blank() {
        return None;
    }
    let found = line.field_count();
    let expected = context.schema.column_count();
    (found != expected).then(|| {
        context
            .error(ErrorType::ColumnCount, line)
            .with_value(vec![found.to_string()])
            .with_params(json!([expected]))
    })
}

/// Flags a last line without `\n`. Not fatal.
pub fn check_line_terminator(context: &FileContext<'_>, line: &Line<'_>) -> Option<ValidationError> {
    (!line.terminated).then(|| context.error(ErrorType::LineTerminatorMissing, line))
}

/// Ordered chain of row checks plus the fail-fast policy.
pub struct FileChecker {
    checks: Vec<RowCheck>,
    fail_fast: bool,
    cancel_interval: u64,
    log_interval: u64,
}

impl FileChecker {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            checks: vec![check_header, check_column_count, check_line_terminator],
            fail_fast: config.fail_fast,
            cancel_interval: config.cancel_check_interval,
            log_interval: config.progress_log_interval,
        }
    }

    pub fn with_checks(mut self, checks: Vec<RowCheck>) -> Self {
        self.checks = checks;
        self
    }

    /// Runs the structural stage over a whole submission.
    ///
    /// Returns the number of errors reported by this stage.
    pub fn check_submission(
        &self,
        files: &SubmissionFiles,
        dictionary: &Dictionary,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<u64, ValidatorError> {
        let before = reporter.error_count();
        let halting_before = reporter.halting_count();

        check_referenced_files(files, reporter)?;
        if self.fail_fast && reporter.halting_count() > halting_before {
            return Ok(reporter.error_count() - before);
        }

        for (file_type, path) in files.iter() {
            let schema = dictionary.schema(file_type)?;
            let name = file_name(path);
            let context = FileContext::new(file_type, &name, schema);
            let mut input = source::open(path)?;
            self.check_file(&context, &mut input, reporter, token)?;
            if self.fail_fast && reporter.halting_count() > halting_before {
                break;
            }
        }

        Ok(reporter.error_count() - before)
    }

    /// Streams one file through the chain, returning its error count.
    pub fn check_file(
        &self,
        context: &FileContext<'_>,
        input: &mut source::Source,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<u64, ValidatorError> {
        let mut lines = LineReader::new(input);
        let mut checkpoint = Checkpoint::new(
            token,
            self.cancel_interval,
            self.log_interval,
            context.file_name,
        );
        let mut found = 0;

        while let Some(line) = lines.next_line().map_err(|e| ValidatorError::io(context.file_name, e))? {
            checkpoint.tick()?;
            for check in &self.checks {
                if let Some(error) = check(context, &line) {
                    let halts = error.error_type.halts_pipeline();
                    reporter.report(error)?;
                    found += 1;
                    if self.fail_fast && halts {
                        return Ok(found);
                    }
                }
            }
        }

        if lines.line_number() == 0 {
            reporter.report(
                ValidationError::new(ErrorType::FileHeader, Some(context.file_type), context.file_name)
                    .with_fields(&context.schema.field_names),
            )?;
            found += 1;
        }

        tracing::debug!(file = context.file_name, rows = checkpoint.rows(), errors = found, "checked structure");
        Ok(found)
    }
}

/// Every present file type's referenced type must have a file too.
pub fn check_referenced_files(
    files: &SubmissionFiles,
    reporter: &mut Reporter,
) -> Result<(), ValidatorError> {
    for file_type in files.file_types() {
        let Some(referenced) = file_type.referenced_type() else {
            continue;
        };
        if files.contains(referenced) {
            continue;
        }
        let name = files
            .paths(file_type)
            .first()
            .map(|path| file_name(path))
            .unwrap_or_default();
        reporter.report(
            ValidationError::new(ErrorType::MissingReferencedFile, Some(file_type), &name)
                .with_value(vec![referenced.as_str().to_string()])
                .with_params(json!([referenced])),
        )?;
    }
    Ok(())
}

/// The expected header: field names separated by tabs.
pub fn header_line(schema: &FileSchema) -> Vec<u8> {
    let mut line = Vec::new();
    for (i, name) in schema.field_names.iter().enumerate() {
        if i > 0 {
            line.push(FIELD_SEPARATOR);
        }
        line.extend_from_slice(name.as_bytes());
    }
    line
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::io::Cursor;

    use vouch_types::DataType;

    use super::*;

    const DONOR_HEADER: &str =
        "donor_id\tdonor_sex\tdonor_vital_status\tdisease_status_last_followup\tdonor_age_at_diagnosis";

    fn run(content: &str, fail_fast: bool) -> Vec<ValidationError> {
        let dictionary = Dictionary::builtin();
        let schema = dictionary.schema(FileType::Donor).unwrap();
        let context = FileContext::new(FileType::Donor, "donor.txt", schema);
        let config = ValidatorConfig {
            fail_fast,
            ..ValidatorConfig::default()
        };
        let mut input: source::Source = Box::new(Cursor::new(content.as_bytes().to_vec()));
        let mut reporter = Reporter::in_memory();
        FileChecker::new(&config)
            .check_file(&context, &mut input, &mut reporter, &CancellationToken::new())
            .unwrap();
        reporter.errors().to_vec()
    }

    fn types(errors: &[ValidationError]) -> Vec<(ErrorType, i64)> {
        errors.iter().map(|e| (e.error_type, e.line_number)).collect()
    }

    #[test]
    fn well_formed_file_passes() {
        let content = format!("{DONOR_HEADER}\nDO1\tmale\talive\tremission\t40\n");
        assert!(run(&content, false).is_empty());
    }

    #[test]
    fn header_must_match_exactly_in_order() {
        let content = "donor_sex\tdonor_id\tdonor_vital_status\tdisease_status_last_followup\tdonor_age_at_diagnosis\n";
        let errors = run(content, false);
        assert_eq!(types(&errors), vec![(ErrorType::FileHeader, 1)]);
        assert_eq!(errors[0].value[0], "donor_sex");
    }

    #[test]
    fn ragged_rows_are_reported_blank_rows_skipped() {
        let content = format!("{DONOR_HEADER}\nDO1\tmale\n\nDO2\tfemale\talive\tremission\t40\tx\n");
        let errors = run(&content, false);
        assert_eq!(
            types(&errors),
            vec![(ErrorType::ColumnCount, 2), (ErrorType::ColumnCount, 4)]
        );
        assert_eq!(errors[0].value, vec!["2".to_string()]);
    }

    #[test]
    fn fail_fast_stops_at_first_error() {
        let content = format!("{DONOR_HEADER}\nDO1\tmale\nDO2\n");
        assert_eq!(run(&content, true).len(), 1);
        assert_eq!(run(&content, false).len(), 2);
    }

    #[test]
    fn missing_terminator_is_reported_not_fatal() {
        let content = format!("{DONOR_HEADER}\nDO1\tmale\talive\tremission\t40");
        let errors = run(&content, false);
        assert_eq!(types(&errors), vec![(ErrorType::LineTerminatorMissing, 2)]);
        assert!(!errors[0].error_type.halts_pipeline());
    }

    #[test]
    fn fail_fast_keeps_going_past_missing_terminator() {
        let content = format!("{DONOR_HEADER}\nDO1\tmale\talive\tremission\t40");
        assert_eq!(types(&run(&content, true)), vec![(ErrorType::LineTerminatorMissing, 2)]);
    }

    fn check_dir(dir: &std::path::Path, fail_fast: bool) -> Vec<(String, ErrorType)> {
        let all: BTreeSet<DataType> = DataType::ALL.into_iter().collect();
        let files = SubmissionFiles::scan(dir, &all).unwrap();
        let config = ValidatorConfig {
            fail_fast,
            ..ValidatorConfig::default()
        };
        let mut reporter = Reporter::in_memory();
        FileChecker::new(&config)
            .check_submission(&files, &Dictionary::builtin(), &mut reporter, &CancellationToken::new())
            .unwrap();
        reporter
            .errors()
            .iter()
            .map(|e| (e.file_name.clone(), e.error_type))
            .collect()
    }

    #[test]
    fn fail_fast_checks_later_files_after_non_halting_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("donor.txt"),
            format!("{DONOR_HEADER}\nD1\tmale\talive\tremission\t40"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("specimen.txt"),
            "donor_id\tspecimen_id\tspecimen_type\ttumour_histological_type\nD1\nD1\tSP1\n",
        )
        .unwrap();

        assert_eq!(
            check_dir(dir.path(), true),
            vec![
                ("donor.txt".to_string(), ErrorType::LineTerminatorMissing),
                ("specimen.txt".to_string(), ErrorType::ColumnCount),
            ]
        );
        assert_eq!(check_dir(dir.path(), false).len(), 3);
    }

    #[test]
    fn fail_fast_skips_files_after_halting_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("donor.txt"), format!("{DONOR_HEADER}\nD1\tmale\n")).unwrap();
        std::fs::write(
            dir.path().join("specimen.txt"),
            "donor_id\tspecimen_id\tspecimen_type\ttumour_histological_type\nD1\n",
        )
        .unwrap();

        assert_eq!(
            check_dir(dir.path(), true),
            vec![("donor.txt".to_string(), ErrorType::ColumnCount)]
        );
        assert_eq!(check_dir(dir.path(), false).len(), 2);
    }

    #[test]
    fn empty_file_has_no_header() {
        assert_eq!(types(&run("", false)), vec![(ErrorType::FileHeader, -1)]);
    }

    #[test]
    fn cancellation_interrupts_the_scan() {
        let dictionary = Dictionary::builtin();
        let schema = dictionary.schema(FileType::Donor).unwrap();
        let context = FileContext::new(FileType::Donor, "donor.txt", schema);
        let config = ValidatorConfig {
            cancel_check_interval: 1,
            ..ValidatorConfig::default()
        };
        let token = CancellationToken::new();
        token.cancel();

        let mut input: source::Source = Box::new(Cursor::new(format!("{DONOR_HEADER}\n").into_bytes()));
        let result = FileChecker::new(&config).check_file(
            &context,
            &mut input,
            &mut Reporter::in_memory(),
            &token,
        );
        assert!(matches!(result, Err(ValidatorError::Cancelled)));
    }

    #[test]
    fn missing_parent_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("donor.txt"), format!("{DONOR_HEADER}\n")).unwrap();
        std::fs::write(dir.path().join("sample.txt"), b"x\n").unwrap();
        let all: BTreeSet<DataType> = DataType::ALL.into_iter().collect();
        let files = SubmissionFiles::scan(dir.path(), &all).unwrap();

        let mut reporter = Reporter::in_memory();
        check_referenced_files(&files, &mut reporter).unwrap();

        let errors = reporter.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ErrorType::MissingReferencedFile);
        assert_eq!(errors[0].file_name, "sample.txt");
        assert_eq!(errors[0].value, vec!["specimen".to_string()]);
    }

    #[test]
    fn header_line_matches_context_header() {
        let dictionary = Dictionary::builtin();
        let schema = dictionary.schema(FileType::Donor).unwrap();
        assert_eq!(header_line(schema), DONOR_HEADER.as_bytes());
    }
}
