//! # Vouch
//!
//! Validation engine for genomic data submissions.
//!
//! Projects submit tab-delimited files per release. Vouch checks their
//! structure, verifies referential integrity across the clinical core and
//! the feature data types, normalizes simple somatic mutations and keeps
//! each submission's lifecycle state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Engine                            │
//! │  ┌──────────┐   ┌────────────┐   ┌───────────────────────┐   │
//! │  │ Control  │ → │  Kernel    │ → │ Workers (bounded)     │   │
//! │  │ surface  │   │ (pure FSM) │   │ structural → integrity│   │
//! │  └──────────┘   └────────────┘   │ → normalization       │   │
//! │                                  └───────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`Engine`]: lifecycle control surface and worker pool
//! - [`SubmissionRunner`]: what a worker runs for an admitted submission;
//!   [`PipelineRunner`] runs the full validator

mod engine;
mod error;
mod runner;


pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use runner::{ERRORS_FILE, PipelineRunner, RunContext, RunOutput, SUMMARY_FILE, SubmissionRunner};

// Re-export the vocabulary callers need to drive the engine
pub use vouch_kernel::{Command, KernelError, State, Submission};
pub use vouch_types::{DataType, ProjectKey, ReleaseName, SubmissionReport, SubmissionState, ValidationOutcome};
