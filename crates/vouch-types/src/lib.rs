//! # vouch-types: Core types for `Vouch`
//!
//! This crate contains the shared vocabulary of the validation engine:
//! - Identity types ([`ReleaseName`], [`ProjectKey`])
//! - Schema identity ([`DataType`], [`FileType`])
//! - Per-file-type row processing policy ([`RowPolicy`], [`PrimaryKeyPolicy`])
//! - Error classification ([`ErrorType`], [`ErrorKind`])
//! - Lifecycle states ([`SubmissionState`], [`ReleaseState`], [`DataTypeState`])
//! - Run results ([`ValidationOutcome`], [`SubmissionReport`])

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Identity types
// ============================================================================

/// Name of a release (e.g. `release1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReleaseName(String);

impl ReleaseName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReleaseName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ReleaseName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Key of a submitting project (e.g. `PACA-CA`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectKey(String);

impl ProjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProjectKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Returned when a name does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name '{}'", self.0)
    }
}

impl std::error::Error for UnknownName {}

// ============================================================================
// Data types
// ============================================================================

/// A group of file types validated together.
///
/// `Clinical` covers the donor/specimen/sample core every feature type hangs
/// off; the others are the feature (experimental) data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Clinical,
    Ssm,
    Cnsm,
    Stsm,
    Sgv,
    Mirna,
    Meth,
    Exp,
    Pexp,
    Jcn,
}

impl DataType {
    /// Every data type, clinical first.
    pub const ALL: [DataType; 10] = [
        DataType::Clinical,
        DataType::Ssm,
        DataType::Cnsm,
        DataType::Stsm,
        DataType::Sgv,
        DataType::Mirna,
        DataType::Meth,
        DataType::Exp,
        DataType::Pexp,
        DataType::Jcn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Clinical => "clinical",
            DataType::Ssm => "ssm",
            DataType::Cnsm => "cnsm",
            DataType::Stsm => "stsm",
            DataType::Sgv => "sgv",
            DataType::Mirna => "mirna",
            DataType::Meth => "meth",
            DataType::Exp => "exp",
            DataType::Pexp => "pexp",
            DataType::Jcn => "jcn",
        }
    }

    pub fn is_feature(self) -> bool {
        self != DataType::Clinical
    }

    /// File types of this data type, in processing order.
    pub fn file_types(self) -> impl Iterator<Item = FileType> {
        FileType::ALL
            .into_iter()
            .filter(move |file_type| file_type.data_type() == self)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        DataType::ALL
            .into_iter()
            .find(|data_type| data_type.as_str() == lowered)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

// ============================================================================
// File types
// ============================================================================

/// Schema identity of one kind of submitted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    Donor,
    Specimen,
    Sample,

    SsmM,
    SsmP,

    CnsmM,
    CnsmP,
    CnsmS,

    StsmM,
    StsmP,
    StsmS,

    SgvM,
    SgvP,

    MirnaM,
    MirnaP,
    MirnaS,

    MethM,
    MethP,
    MethS,

    ExpM,
    ExpG,

    PexpM,
    PexpP,

    JcnM,
    JcnP,
}

/// How the primary key of a row is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKeyPolicy {
    /// The file type declares a primary key; each row's key must be unique.
    Checked,
    /// The file type carries no primary key.
    Absent,
}

/// Static description of which checks apply to rows of a file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPolicy {
    pub primary_key: PrimaryKeyPolicy,
    pub foreign_key: bool,
    /// Rows may carry an optional secondary foreign key.
    pub secondary_foreign_key: bool,
    /// Foreign keys seen are recorded for the parent's surjectivity pass.
    pub records_encountered: bool,
}

impl RowPolicy {
    const PARENT: RowPolicy = RowPolicy {
        primary_key: PrimaryKeyPolicy::Checked,
        foreign_key: false,
        secondary_foreign_key: false,
        records_encountered: false,
    };

    const CLINICAL_CHILD: RowPolicy = RowPolicy {
        primary_key: PrimaryKeyPolicy::Checked,
        foreign_key: true,
        secondary_foreign_key: false,
        records_encountered: true,
    };

    const META: RowPolicy = RowPolicy {
        primary_key: PrimaryKeyPolicy::Checked,
        foreign_key: true,
        secondary_foreign_key: true,
        records_encountered: false,
    };

    const LEAF_PRIMARY: RowPolicy = RowPolicy {
        primary_key: PrimaryKeyPolicy::Absent,
        foreign_key: true,
        secondary_foreign_key: false,
        records_encountered: true,
    };

    const KEYED_PRIMARY: RowPolicy = RowPolicy {
        primary_key: PrimaryKeyPolicy::Checked,
        foreign_key: true,
        secondary_foreign_key: false,
        records_encountered: true,
    };

    const LEAF_SECONDARY: RowPolicy = RowPolicy {
        primary_key: PrimaryKeyPolicy::Absent,
        foreign_key: true,
        secondary_foreign_key: false,
        records_encountered: false,
    };

    const KEYED_SECONDARY: RowPolicy = RowPolicy {
        primary_key: PrimaryKeyPolicy::Checked,
        foreign_key: true,
        secondary_foreign_key: false,
        records_encountered: false,
    };

    pub fn checks_uniqueness(&self) -> bool {
        self.primary_key == PrimaryKeyPolicy::Checked
    }
}

impl FileType {
    /// Every file type, in referential processing order (parents first).
    pub const ALL: [FileType; 25] = [
        FileType::Donor,
        FileType::Specimen,
        FileType::Sample,
        FileType::SsmM,
        FileType::SsmP,
        FileType::CnsmM,
        FileType::CnsmP,
        FileType::CnsmS,
        FileType::StsmM,
        FileType::StsmP,
        FileType::StsmS,
        FileType::SgvM,
        FileType::SgvP,
        FileType::MirnaM,
        FileType::MirnaP,
        FileType::MirnaS,
        FileType::MethM,
        FileType::MethP,
        FileType::MethS,
        FileType::ExpM,
        FileType::ExpG,
        FileType::PexpM,
        FileType::PexpP,
        FileType::JcnM,
        FileType::JcnP,
    ];

    /// Lowercase name, also the stem of the file name (`ssm_p.txt`).
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Donor => "donor",
            FileType::Specimen => "specimen",
            FileType::Sample => "sample",
            FileType::SsmM => "ssm_m",
            FileType::SsmP => "ssm_p",
            FileType::CnsmM => "cnsm_m",
            FileType::CnsmP => "cnsm_p",
            FileType::CnsmS => "cnsm_s",
            FileType::StsmM => "stsm_m",
            FileType::StsmP => "stsm_p",
            FileType::StsmS => "stsm_s",
            FileType::SgvM => "sgv_m",
            FileType::SgvP => "sgv_p",
            FileType::MirnaM => "mirna_m",
            FileType::MirnaP => "mirna_p",
            FileType::MirnaS => "mirna_s",
            FileType::MethM => "meth_m",
            FileType::MethP => "meth_p",
            FileType::MethS => "meth_s",
            FileType::ExpM => "exp_m",
            FileType::ExpG => "exp_g",
            FileType::PexpM => "pexp_m",
            FileType::PexpP => "pexp_p",
            FileType::JcnM => "jcn_m",
            FileType::JcnP => "jcn_p",
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            FileType::Donor | FileType::Specimen | FileType::Sample => DataType::Clinical,
            FileType::SsmM | FileType::SsmP => DataType::Ssm,
            FileType::CnsmM | FileType::CnsmP | FileType::CnsmS => DataType::Cnsm,
            FileType::StsmM | FileType::StsmP | FileType::StsmS => DataType::Stsm,
            FileType::SgvM | FileType::SgvP => DataType::Sgv,
            FileType::MirnaM | FileType::MirnaP | FileType::MirnaS => DataType::Mirna,
            FileType::MethM | FileType::MethP | FileType::MethS => DataType::Meth,
            FileType::ExpM | FileType::ExpG => DataType::Exp,
            FileType::PexpM | FileType::PexpP => DataType::Pexp,
            FileType::JcnM | FileType::JcnP => DataType::Jcn,
        }
    }

    /// Position in the referential processing order.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn is_meta(self) -> bool {
        matches!(
            self,
            FileType::SsmM
                | FileType::CnsmM
                | FileType::StsmM
                | FileType::SgvM
                | FileType::MirnaM
                | FileType::MethM
                | FileType::ExpM
                | FileType::PexpM
                | FileType::JcnM
        )
    }

    /// The meta file type of this file's data type, if it is a feature type.
    pub fn meta_type(self) -> Option<FileType> {
        self.data_type().file_types().find(|t| t.is_meta())
    }

    /// The file type this type's foreign key points at.
    pub fn referenced_type(self) -> Option<FileType> {
        match self {
            FileType::Donor => None,
            FileType::Specimen => Some(FileType::Donor),
            FileType::Sample => Some(FileType::Specimen),
            FileType::CnsmS => Some(FileType::CnsmP),
            FileType::StsmS => Some(FileType::StsmP),
            FileType::MethS => Some(FileType::MethP),
            // mirna_p carries no primary key, sequences hang off the meta file
            FileType::MirnaS => Some(FileType::MirnaM),
            other if other.is_meta() => Some(FileType::Sample),
            other => other.meta_type(),
        }
    }

    pub fn policy(self) -> RowPolicy {
        match self {
            FileType::Donor => RowPolicy::PARENT,
            FileType::Specimen | FileType::Sample => RowPolicy::CLINICAL_CHILD,
            FileType::SsmP
            | FileType::SgvP
            | FileType::MirnaP
            | FileType::ExpG
            | FileType::PexpP
            | FileType::JcnP => RowPolicy::LEAF_PRIMARY,
            FileType::CnsmP | FileType::StsmP | FileType::MethP => RowPolicy::KEYED_PRIMARY,
            FileType::CnsmS | FileType::StsmS | FileType::MethS => RowPolicy::LEAF_SECONDARY,
            FileType::MirnaS => RowPolicy::KEYED_SECONDARY,
            _ => RowPolicy::META,
        }
    }

    /// The file type whose foreign keys must cover this type's primary keys.
    pub fn surjection_child(self) -> Option<FileType> {
        FileType::ALL.into_iter().find(|child| {
            child.referenced_type() == Some(self) && child.policy().records_encountered
        })
    }

    /// Resolves a file name (`ssm_p.txt.gz`, `Donor.tsv`) to its file type.
    ///
    /// The stem before the first `.` is matched case-insensitively.
    pub fn from_file_name(file_name: &str) -> Option<FileType> {
        let stem = file_name.split('.').next()?;
        stem.parse().ok()
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        FileType::ALL
            .into_iter()
            .find(|file_type| file_type.as_str() == lowered)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

// ============================================================================
// Errors reported against submissions
// ============================================================================

/// Type of a reported validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Uniqueness,
    PrimaryRelation,
    SecondaryRelation,
    Surjection,
    FileHeader,
    ColumnCount,
    LineTerminatorMissing,
    MissingReferencedFile,
    InvalidDeletionMarker,
    ThresholdExceeded,
}

/// Coarse classification of an [`ErrorType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Uniqueness,
    PrimaryRelation,
    SecondaryRelation,
    Surjection,
    Structural,
    Masking,
}

impl ErrorType {
    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorType::Uniqueness => ErrorKind::Uniqueness,
            ErrorType::PrimaryRelation => ErrorKind::PrimaryRelation,
            ErrorType::SecondaryRelation => ErrorKind::SecondaryRelation,
            ErrorType::Surjection | ErrorType::InvalidDeletionMarker => ErrorKind::Surjection,
            ErrorType::FileHeader
            | ErrorType::ColumnCount
            | ErrorType::LineTerminatorMissing
            | ErrorType::MissingReferencedFile => ErrorKind::Structural,
            ErrorType::ThresholdExceeded => ErrorKind::Masking,
        }
    }

    /// Structural errors after which integrity checking is pointless.
    pub fn halts_pipeline(self) -> bool {
        self.kind() == ErrorKind::Structural && self != ErrorType::LineTerminatorMissing
    }
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorType::Uniqueness => "UNIQUENESS",
            ErrorType::PrimaryRelation => "PRIMARY_RELATION",
            ErrorType::SecondaryRelation => "SECONDARY_RELATION",
            ErrorType::Surjection => "SURJECTION",
            ErrorType::FileHeader => "FILE_HEADER",
            ErrorType::ColumnCount => "COLUMN_COUNT",
            ErrorType::LineTerminatorMissing => "LINE_TERMINATOR_MISSING",
            ErrorType::MissingReferencedFile => "MISSING_REFERENCED_FILE",
            ErrorType::InvalidDeletionMarker => "INVALID_DELETION_MARKER",
            ErrorType::ThresholdExceeded => "THRESHOLD_EXCEEDED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Lifecycle states
// ============================================================================

/// State of a submission within its release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    NotValidated,
    Queued,
    Validating,
    Valid,
    Invalid,
    Error,
    SignedOff,
}

impl SubmissionState {
    /// States from which a validation may be requested.
    pub fn can_queue(self) -> bool {
        matches!(
            self,
            SubmissionState::NotValidated
                | SubmissionState::Valid
                | SubmissionState::Invalid
                | SubmissionState::Error
        )
    }

    /// States in which submitted files may not be modified.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            SubmissionState::Valid | SubmissionState::Invalid | SubmissionState::SignedOff
        )
    }

    /// A validation is pending or running.
    pub fn is_busy(self) -> bool {
        matches!(self, SubmissionState::Queued | SubmissionState::Validating)
    }
}

impl Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::NotValidated => "NOT_VALIDATED",
            SubmissionState::Queued => "QUEUED",
            SubmissionState::Validating => "VALIDATING",
            SubmissionState::Valid => "VALID",
            SubmissionState::Invalid => "INVALID",
            SubmissionState::Error => "ERROR",
            SubmissionState::SignedOff => "SIGNED_OFF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseState {
    Opened,
    Completed,
}

/// Validation state of one data type within a submission report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataTypeState {
    #[default]
    NotValidated,
    Validating,
    Valid,
    Invalid,
    Error,
}

impl Display for DataTypeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataTypeState::NotValidated => "NOT_VALIDATED",
            DataTypeState::Validating => "VALIDATING",
            DataTypeState::Valid => "VALID",
            DataTypeState::Invalid => "INVALID",
            DataTypeState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Result of one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    /// The engine failed; needs operator attention.
    Error,
    /// The run was interrupted before reaching a verdict.
    Cancelled,
}

impl ValidationOutcome {
    pub fn data_type_state(self) -> DataTypeState {
        match self {
            ValidationOutcome::Valid => DataTypeState::Valid,
            ValidationOutcome::Invalid => DataTypeState::Invalid,
            ValidationOutcome::Error => DataTypeState::Error,
            ValidationOutcome::Cancelled => DataTypeState::NotValidated,
        }
    }
}

impl Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationOutcome::Valid => "VALID",
            ValidationOutcome::Invalid => "INVALID",
            ValidationOutcome::Error => "ERROR",
            ValidationOutcome::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Submission report
// ============================================================================

/// Per data type summary: state plus error counts per file and error type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataTypeReport {
    pub state: DataTypeState,
    pub file_errors: BTreeMap<String, BTreeMap<ErrorType, u64>>,
}

impl DataTypeReport {
    pub fn error_count(&self) -> u64 {
        self.file_errors
            .values()
            .flat_map(BTreeMap::values)
            .sum()
    }
}

/// Pointer to the detailed output of the last run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub errors_path: Option<String>,
    pub error_count: u64,
}

/// Summary report kept alongside a submission's state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub data_types: BTreeMap<DataType, DataTypeReport>,
    pub last_run: Option<RunSummary>,
}

impl SubmissionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything known about the given data types.
    pub fn reset(&mut self, data_types: &BTreeSet<DataType>) {
        for data_type in data_types {
            self.data_types.remove(data_type);
        }
        self.last_run = None;
    }

    /// Sets the state of the given data types, creating entries as needed.
    pub fn mark(&mut self, data_types: &BTreeSet<DataType>, state: DataTypeState) {
        for data_type in data_types {
            self.data_types.entry(*data_type).or_default().state = state;
        }
    }

    /// Overwrites entries with those of a newer run.
    pub fn merge(&mut self, run: SubmissionReport) {
        self.data_types.extend(run.data_types);
        if run.last_run.is_some() {
            self.last_run = run.last_run;
        }
    }

    pub fn record_error(&mut self, data_type: DataType, file_name: &str, error_type: ErrorType) {
        *self
            .data_types
            .entry(data_type)
            .or_default()
            .file_errors
            .entry(file_name.to_string())
            .or_default()
            .entry(error_type)
            .or_default() += 1;
    }

    pub fn error_count(&self) -> u64 {
        self.data_types.values().map(DataTypeReport::error_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data_types.is_empty() && self.last_run.is_none()
    }
}
