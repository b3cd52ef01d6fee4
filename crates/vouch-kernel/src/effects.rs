//! Effects produced by the kernel.
//!
//! Effects represent side effects that the engine must execute after
//! a command is applied. The kernel is pure - it produces effects but
//! never executes them directly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vouch_types::{DataType, ProjectKey, ReleaseName, SubmissionState};

/// An effect to be executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    // ========================================================================
    // Release Effects
    // ========================================================================
    ReleaseOpened { release: ReleaseName },

    ReleaseCompleted {
        release: ReleaseName,
        next: ReleaseName,
    },

    SubmissionsDeleted {
        release: ReleaseName,
        projects: Vec<ProjectKey>,
    },

    // ========================================================================
    // Submission Effects
    // ========================================================================
    /// A submission moved between states. `from` is `None` on creation.
    SubmissionStateChanged {
        release: ReleaseName,
        project: ProjectKey,
        from: Option<SubmissionState>,
        to: SubmissionState,
    },

    /// A submission joined the validation queue; wake a worker.
    ValidationQueued {
        release: ReleaseName,
        project: ProjectKey,
        data_types: BTreeSet<DataType>,
    },

    /// A worker may begin validating these data types.
    ValidationStarted {
        release: ReleaseName,
        project: ProjectKey,
        data_types: BTreeSet<DataType>,
    },

    /// Trip the cancellation signal of a running validation.
    CancelValidation {
        release: ReleaseName,
        project: ProjectKey,
    },
}
