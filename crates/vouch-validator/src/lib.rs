//! # vouch-validator: The submission validation pipeline
//!
//! Everything that reads submitted files lives here:
//!
//! - [`Key`] and the weak-reference [`Interner`] that keeps millions of
//!   repeated identifiers cheap
//! - [`FileChecker`]: header, column count and line terminator checks
//! - [`IntegrityEngine`]: uniqueness, foreign key and surjectivity checks over
//!   the fixed file type order
//! - [`DeletionManifest`]: donor-level exemptions from surjectivity
//! - [`Normalizer`]: duplicate removal and allele masking of SSM observations
//! - [`Reporter`]: the append-only error sink
//! - [`Pipeline`]: the stages above, in order
//!
//! # Example
//!
//! ```no_run
//! use vouch_config::VouchConfig;
//! use vouch_types::DataType;
//! use vouch_validator::{CancellationToken, Pipeline, Reporter, ValidationRequest};
//!
//! let pipeline = Pipeline::from_config(&VouchConfig::default());
//! let request = ValidationRequest::new("data/submissions/release1/PACA-CA", [DataType::Ssm]);
//! let mut reporter = Reporter::in_memory();
//!
//! let result = pipeline.run(&request, &mut reporter, &CancellationToken::new()).unwrap();
//! println!("{:?}: {} errors", result.outcome, reporter.error_count());
//! ```

pub mod cancel;
pub mod checker;
pub mod deletion;
pub mod dictionary;
pub mod error;
pub mod integrity;
pub mod interner;
pub mod key;
pub mod normalize;
pub mod pipeline;
pub mod reader;
pub mod report;
pub mod source;
pub mod submission;

pub use cancel::CancellationToken;
pub use checker::FileChecker;
pub use deletion::{DeletionManifest, ExemptionMarker};
pub use dictionary::{Dictionary, FileSchema};
pub use error::{NormalizationError, ValidatorError};
pub use integrity::{IntegrityEngine, IntegrityStats};
pub use interner::{Component, Interner};
pub use key::Key;
pub use normalize::{Counters, Marking, NormalizationSummary, Normalizer};
pub use pipeline::{Pipeline, PipelineResult, ValidationRequest};
pub use report::{Reporter, ValidationError};
pub use submission::SubmissionFiles;
