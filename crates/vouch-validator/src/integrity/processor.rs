//! Generic per-row key processing, driven by the file type's [`RowPolicy`].

use std::io::BufRead;

use serde_json::{Value, json};
use vouch_types::{ErrorType, FileType, RowPolicy};

use super::encountered::EncounteredKeySet;
use super::lineage::DonorLineage;
use super::primary_keys::PrimaryKeySet;
use crate::cancel::{CancellationToken, Checkpoint};
use crate::dictionary::Dictionary;
use crate::error::ValidatorError;
use crate::interner::Interner;
use crate::key::Key;
use crate::reader::LineReader;
use crate::report::{Reporter, ValidationError};

/// Where the keys of a file type live and how they are reported.
#[derive(Debug, Clone)]
pub struct RowLayout {
    pub file_type: FileType,
    pub policy: RowPolicy,
    primary_key: Vec<usize>,
    foreign_key: Vec<usize>,
    secondary_foreign_key: Vec<usize>,
    primary_key_names: Vec<String>,
    foreign_key_names: Vec<String>,
    secondary_foreign_key_names: Vec<String>,
    relation_params: Option<Value>,
}

impl RowLayout {
    pub fn new(file_type: FileType, dictionary: &Dictionary) -> Result<Self, ValidatorError> {
        let schema = dictionary.schema(file_type)?;
        let policy = file_type.policy();

        let relation_params = match file_type.referenced_type() {
            Some(referenced) => {
                let parent = dictionary.schema(referenced)?;
                Some(json!([referenced, parent.primary_key]))
            }
            None => None,
        };

        let primary_key_names = if policy.checks_uniqueness() {
            schema.primary_key.clone()
        } else {
            Vec::new()
        };
        let foreign_key_names = if policy.foreign_key {
            schema.foreign_key.clone()
        } else {
            Vec::new()
        };
        let secondary_foreign_key_names = if policy.secondary_foreign_key {
            schema.secondary_foreign_key.clone()
        } else {
            Vec::new()
        };

        Ok(Self {
            file_type,
            policy,
            primary_key: schema.indices(&primary_key_names)?,
            foreign_key: schema.indices(&foreign_key_names)?,
            secondary_foreign_key: schema.indices(&secondary_foreign_key_names)?,
            primary_key_names,
            foreign_key_names,
            secondary_foreign_key_names,
            relation_params,
        })
    }

    pub fn foreign_key_names(&self) -> &[String] {
        &self.foreign_key_names
    }
}

/// Accumulators one file is processed against.
pub struct Accumulators<'a> {
    /// The file type's own keys; `None` when it declares none.
    pub primary_keys: Option<&'a mut PrimaryKeySet>,
    /// Complete key set of the referenced parent type.
    pub referenced: Option<&'a PrimaryKeySet>,
    /// Parent keys used so far, when this type feeds a surjectivity check.
    pub encountered: Option<&'a mut EncounteredKeySet>,
    pub lineage: &'a mut DonorLineage,
}

pub struct FileProcessor<'a> {
    layout: &'a RowLayout,
    interner: &'a Interner,
    missing_codes: &'a [String],
    cancel_interval: u64,
    log_interval: u64,
}

impl<'a> FileProcessor<'a> {
    pub fn new(
        layout: &'a RowLayout,
        interner: &'a Interner,
        missing_codes: &'a [String],
        cancel_interval: u64,
        log_interval: u64,
    ) -> Self {
        Self {
            layout,
            interner,
            missing_codes,
            cancel_interval,
            log_interval,
        }
    }

    /// Streams the data rows of one file, returning how many were processed.
    ///
    /// Every violation is reported and processing continues; only I/O
    /// failures, malformed rows and cancellation end the scan early.
    pub fn process(
        &self,
        file_name: &str,
        input: impl BufRead,
        accumulators: &mut Accumulators<'_>,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<u64, ValidatorError> {
        let layout = self.layout;
        let file_index = accumulators
            .primary_keys
            .as_deref_mut()
            .map(|keys| keys.begin_file(file_name));

        let mut lines = LineReader::new(input);
        let mut checkpoint =
            Checkpoint::new(token, self.cancel_interval, self.log_interval, file_name);

        while let Some(line) = lines.next_line().map_err(|e| ValidatorError::io(file_name, e))? {
            if line.number == 1 || line.is_blank() {
                continue;
            }
            checkpoint.tick()?;
            let row: Vec<&[u8]> = line.fields().collect();

            let primary_key = match (&accumulators.primary_keys, layout.primary_key.is_empty()) {
                (Some(_), false) => Some(Key::from_row(&row, &layout.primary_key, line.number, self.interner)?),
                _ => None,
            };
            let foreign_key = if layout.foreign_key.is_empty() {
                None
            } else {
                Some(Key::from_row(&row, &layout.foreign_key, line.number, self.interner)?)
            };

            if let (Some(pk), Some(fk)) = (&primary_key, &foreign_key) {
                accumulators.lineage.record(layout.file_type, pk, fk);
            }

            if let (Some(pk), Some(keys)) = (primary_key, accumulators.primary_keys.as_deref_mut()) {
                let file = file_index.unwrap_or_default();
                if let Err(duplicate) = keys.try_insert(pk, file) {
                    reporter.report(
                        ValidationError::new(ErrorType::Uniqueness, Some(layout.file_type), file_name)
                            .at_line(line.number)
                            .with_fields(&layout.primary_key_names)
                            .with_value(duplicate.to_strings()),
                    )?;
                }
            }

            if let Some(fk) = foreign_key {
                if !accumulators.referenced.is_some_and(|parent| parent.contains(&fk)) {
                    reporter.report(self.relation_error(ErrorType::PrimaryRelation, file_name, line.number, &fk))?;
                }
                if let Some(encountered) = accumulators.encountered.as_deref_mut() {
                    encountered.insert(fk);
                }
            }

            if self.declares_secondary(&row) {
                let secondary =
                    Key::from_row(&row, &layout.secondary_foreign_key, line.number, self.interner)?;
                if !accumulators.referenced.is_some_and(|parent| parent.contains(&secondary)) {
                    reporter.report(self.relation_error(
                        ErrorType::SecondaryRelation,
                        file_name,
                        line.number,
                        &secondary,
                    ))?;
                }
            }
        }

        Ok(checkpoint.rows())
    }

    fn relation_error(&self, error_type: ErrorType, file_name: &str, line: u64, key: &Key) -> ValidationError {
        let names = if error_type == ErrorType::SecondaryRelation {
            &self.layout.secondary_foreign_key_names
        } else {
            &self.layout.foreign_key_names
        };
        let mut error = ValidationError::new(error_type, Some(self.layout.file_type), file_name)
            .at_line(line)
            .with_fields(names)
            .with_value(key.to_strings());
        if let Some(params) = &self.layout.relation_params {
            error = error.with_params(params.clone());
        }
        error
    }

    /// A secondary foreign key counts only when every value is present and
    /// not a missing code.
    fn declares_secondary(&self, row: &[&[u8]]) -> bool {
        let indices = &self.layout.secondary_foreign_key;
        !indices.is_empty()
            && indices.iter().all(|&index| {
                row.get(index).is_some_and(|value| {
                    !value.is_empty()
                        && !self
                            .missing_codes
                            .iter()
                            .any(|code| code.as_bytes() == *value)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    struct Fixture {
        dictionary: Dictionary,
        interner: Interner,
        missing: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dictionary: Dictionary::builtin(),
                interner: Interner::new(),
                missing: vec!["-777".to_string(), "-888".to_string()],
            }
        }

        fn process(
            &self,
            file_type: FileType,
            content: &str,
            accumulators: &mut Accumulators<'_>,
        ) -> Vec<ValidationError> {
            let layout = RowLayout::new(file_type, &self.dictionary).unwrap();
            let processor = FileProcessor::new(&layout, &self.interner, &self.missing, 10_000, 1_000_000);
            let mut reporter = Reporter::in_memory();
            processor
                .process(
                    &format!("{file_type}.txt"),
                    Cursor::new(content.as_bytes().to_vec()),
                    accumulators,
                    &mut reporter,
                    &CancellationToken::new(),
                )
                .unwrap();
            reporter.errors().to_vec()
        }
    }

    fn types(errors: &[ValidationError]) -> Vec<(ErrorType, i64)> {
        errors.iter().map(|e| (e.error_type, e.line_number)).collect()
    }

    #[test]
    fn reinserted_key_reports_uniqueness_once() {
        let fixture = Fixture::new();
        let mut donors = PrimaryKeySet::new();
        let mut lineage = DonorLineage::new();
        let mut accumulators = Accumulators {
            primary_keys: Some(&mut donors),
            referenced: None,
            encountered: None,
            lineage: &mut lineage,
        };

        let errors = fixture.process(
            FileType::Donor,
            "h\nDO1\tm\ta\tr\t1\nDO2\tm\ta\tr\t1\nDO1\tf\ta\tr\t1\n",
            &mut accumulators,
        );
        assert_eq!(types(&errors), vec![(ErrorType::Uniqueness, 4)]);
        assert_eq!(errors[0].value, vec!["DO1".to_string()]);
        assert_eq!(donors.len(), 2);
    }

    #[test]
    fn every_missing_reference_is_reported() {
        let fixture = Fixture::new();
        let mut donors = PrimaryKeySet::new();
        let file = donors.begin_file("donor.txt");
        donors.insert(Key::new([fixture.interner.intern(b"DO1")]), file);

        let mut specimens = PrimaryKeySet::new();
        let mut encountered = EncounteredKeySet::new();
        let mut lineage = DonorLineage::new();
        let mut accumulators = Accumulators {
            primary_keys: Some(&mut specimens),
            referenced: Some(&donors),
            encountered: Some(&mut encountered),
            lineage: &mut lineage,
        };

        let errors = fixture.process(
            FileType::Specimen,
            "h\nDO1\tSP1\tt\th\nDO9\tSP2\tt\th\nDO9\tSP3\tt\th\n",
            &mut accumulators,
        );
        assert_eq!(
            types(&errors),
            vec![(ErrorType::PrimaryRelation, 3), (ErrorType::PrimaryRelation, 4)]
        );
        assert_eq!(errors[0].params, Some(json!(["DONOR", ["donor_id"]])));
        assert_eq!(errors[0].field_names, vec!["donor_id".to_string()]);
        // recorded regardless of the relation check
        assert_eq!(encountered.len(), 2);
    }

    #[test]
    fn secondary_key_ignores_missing_codes() {
        let fixture = Fixture::new();
        let mut samples = PrimaryKeySet::new();
        let file = samples.begin_file("sample.txt");
        samples.insert(Key::new([fixture.interner.intern(b"SA1")]), file);

        let mut meta = PrimaryKeySet::new();
        let mut lineage = DonorLineage::new();
        let mut accumulators = Accumulators {
            primary_keys: Some(&mut meta),
            referenced: Some(&samples),
            encountered: None,
            lineage: &mut lineage,
        };

        let errors = fixture.process(
            FileType::SsmM,
            "h\nAN1\tSA1\tSA1\tGRCh37\tp\nAN2\tSA1\t-777\tGRCh37\tp\nAN3\tSA1\t\tGRCh37\tp\nAN4\tSA1\tSA9\tGRCh37\tp\n",
            &mut accumulators,
        );
        assert_eq!(types(&errors), vec![(ErrorType::SecondaryRelation, 5)]);
        assert_eq!(errors[0].field_names, vec!["matched_sample_id".to_string()]);
    }

    #[test]
    fn keyless_types_skip_uniqueness() {
        let fixture = Fixture::new();
        let mut meta = PrimaryKeySet::new();
        let file = meta.begin_file("ssm_m.txt");
        meta.insert(
            Key::new([fixture.interner.intern(b"AN1"), fixture.interner.intern(b"SA1")]),
            file,
        );
        let mut lineage = DonorLineage::new();
        let mut encountered = EncounteredKeySet::new();
        let mut accumulators = Accumulators {
            primary_keys: None,
            referenced: Some(&meta),
            encountered: Some(&mut encountered),
            lineage: &mut lineage,
        };

        let row = "AN1\tSA1\tsnv\t1\t10\t10\tA\tA/A\tA/T\tA\tT";
        let errors = fixture.process(FileType::SsmP, &format!("h\n{row}\n{row}\n"), &mut accumulators);
        assert!(errors.is_empty());
        assert_eq!(encountered.len(), 1);
    }

    #[test]
    fn short_row_is_malformed() {
        let fixture = Fixture::new();
        let layout = RowLayout::new(FileType::Specimen, &fixture.dictionary).unwrap();
        let processor = FileProcessor::new(&layout, &fixture.interner, &fixture.missing, 10_000, 1_000_000);
        let mut specimens = PrimaryKeySet::new();
        let mut lineage = DonorLineage::new();
        let mut accumulators = Accumulators {
            primary_keys: Some(&mut specimens),
            referenced: None,
            encountered: None,
            lineage: &mut lineage,
        };

        let result = processor.process(
            "specimen.txt",
            Cursor::new(b"h\nDO1\n".to_vec()),
            &mut accumulators,
            &mut Reporter::in_memory(),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(ValidatorError::MalformedRow { line: 2, .. })));
    }
}
