//! Donor-level deletion exemptions.
//!
//! A submitter withdrawing data for a donor lists it in the deletion
//! manifest: a header line, then `donor_id<TAB>markers` rows where markers
//! are comma-separated feature types or `all`. Parent keys owned by an
//! exempted donor are left out of the surjectivity requirement.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::BufRead;

use vouch_types::{DataType, ErrorType};

use crate::error::ValidatorError;
use crate::reader::LineReader;
use crate::report::{Reporter, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExemptionMarker {
    /// Every relation of the donor, clinical included.
    All,
    Feature(DataType),
    /// An unrecognized marker. Never exempts anything.
    Error,
}

impl ExemptionMarker {
    /// Parses one marker after whitespace has been stripped.
    pub fn parse(token: &str) -> Self {
        let token = token.to_ascii_lowercase();
        if token == "all" {
            return ExemptionMarker::All;
        }
        match token.parse::<DataType>() {
            Ok(data_type) if data_type.is_feature() => ExemptionMarker::Feature(data_type),
            _ => ExemptionMarker::Error,
        }
    }
}

impl fmt::Display for ExemptionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExemptionMarker::All => f.write_str("all"),
            ExemptionMarker::Feature(data_type) => write!(f, "{data_type}"),
            ExemptionMarker::Error => f.write_str("error"),
        }
    }
}

/// Parsed deletion manifest: donor id to exemption markers.
#[derive(Debug, Clone, Default)]
pub struct DeletionManifest {
    donors: HashMap<Box<[u8]>, BTreeSet<ExemptionMarker>>,
}

impl DeletionManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a manifest, reporting every unusable row or marker as
    /// `INVALID_DELETION_MARKER` instead of failing.
    pub fn parse(
        input: impl BufRead,
        file_name: &str,
        reporter: &mut Reporter,
    ) -> Result<Self, ValidatorError> {
        let mut manifest = Self::new();
        let mut lines = LineReader::new(input);

        while let Some(line) = lines.next_line().map_err(|e| ValidatorError::io(file_name, e))? {
            if line.number == 1 || line.is_blank() {
                continue;
            }
            let fields: Vec<&[u8]> = line.fields().collect();
            let [donor, markers] = fields.as_slice() else {
                reporter.report(
                    ValidationError::new(ErrorType::InvalidDeletionMarker, None, file_name)
                        .at_line(line.number)
                        .with_value(vec![String::from_utf8_lossy(line.content).into_owned()]),
                )?;
                continue;
            };

            let markers = String::from_utf8_lossy(markers);
            let normalized: String = markers.chars().filter(|c| !c.is_whitespace()).collect();
            let parsed: BTreeSet<ExemptionMarker> = normalized
                .split(',')
                .filter(|token| !token.is_empty())
                .map(ExemptionMarker::parse)
                .collect();

            if parsed.is_empty() || parsed.contains(&ExemptionMarker::Error) {
                reporter.report(
                    ValidationError::new(ErrorType::InvalidDeletionMarker, None, file_name)
                        .at_line(line.number)
                        .with_value(vec![
                            String::from_utf8_lossy(donor).into_owned(),
                            markers.into_owned(),
                        ]),
                )?;
            }

            manifest
                .donors
                .entry(Box::from(*donor))
                .or_default()
                .extend(parsed);
        }

        tracing::info!(donors = manifest.len(), "parsed deletion manifest");
        Ok(manifest)
    }

    pub fn insert(&mut self, donor: &str, marker: ExemptionMarker) {
        self.donors
            .entry(Box::from(donor.as_bytes()))
            .or_default()
            .insert(marker);
    }

    /// Whether `donor` is exempted from the surjectivity requirement of
    /// relations belonging to `data_type`.
    ///
    /// `all` is absolute. A feature marker covers only its own feature;
    /// clinical relations are exempted by `all` alone.
    pub fn is_exempt(&self, donor: &[u8], data_type: DataType) -> bool {
        self.donors.get(donor).is_some_and(|markers| {
            markers.contains(&ExemptionMarker::All)
                || (data_type.is_feature() && markers.contains(&ExemptionMarker::Feature(data_type)))
        })
    }

    pub fn markers(&self, donor: &str) -> Option<&BTreeSet<ExemptionMarker>> {
        self.donors.get(donor.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.donors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.donors.is_empty()
    }
}
