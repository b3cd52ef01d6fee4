//! Commands accepted by the kernel.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vouch_types::{DataType, ProjectKey, ReleaseName, SubmissionReport, ValidationOutcome};

/// A lifecycle request for the kernel to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    // ========================================================================
    // Release Commands
    // ========================================================================
    /// Opens the first release. Only one release may be open at a time.
    OpenRelease { release: ReleaseName },

    /// Completes the open release and promotes its submissions into `next`.
    CompleteRelease {
        release: ReleaseName,
        next: ReleaseName,
    },

    /// Removes every submission of a completed release that was not signed off.
    DeleteUnsignedSubmissions { release: ReleaseName },

    // ========================================================================
    // Submission Commands
    // ========================================================================
    AddSubmission {
        release: ReleaseName,
        project: ProjectKey,
    },

    /// Requests validation of the given data types for every listed project.
    ///
    /// All-or-nothing: if any project may not be queued, nothing is queued.
    Queue {
        release: ReleaseName,
        projects: Vec<ProjectKey>,
        data_types: BTreeSet<DataType>,
    },

    /// Admits the head of the queue to validation.
    StartValidation {
        release: ReleaseName,
        project: ProjectKey,
    },

    /// Records the result of a validation run.
    FinishValidation {
        release: ReleaseName,
        project: ProjectKey,
        outcome: ValidationOutcome,
        report: SubmissionReport,
    },

    Cancel {
        release: ReleaseName,
        project: ProjectKey,
    },

    SignOff {
        release: ReleaseName,
        projects: Vec<ProjectKey>,
    },

    /// Discards any validation result and returns to `NOT_VALIDATED`.
    Reset {
        release: ReleaseName,
        project: ProjectKey,
    },

    /// Files of the given data types were uploaded, replaced or deleted.
    FilesChanged {
        release: ReleaseName,
        project: ProjectKey,
        data_types: BTreeSet<DataType>,
    },
}

impl Command {
    pub fn open_release(release: impl Into<ReleaseName>) -> Self {
        Command::OpenRelease {
            release: release.into(),
        }
    }

    pub fn complete_release(release: impl Into<ReleaseName>, next: impl Into<ReleaseName>) -> Self {
        Command::CompleteRelease {
            release: release.into(),
            next: next.into(),
        }
    }

    pub fn add_submission(release: impl Into<ReleaseName>, project: impl Into<ProjectKey>) -> Self {
        Command::AddSubmission {
            release: release.into(),
            project: project.into(),
        }
    }

    pub fn queue(
        release: impl Into<ReleaseName>,
        projects: impl IntoIterator<Item = impl Into<ProjectKey>>,
        data_types: impl IntoIterator<Item = DataType>,
    ) -> Self {
        Command::Queue {
            release: release.into(),
            projects: projects.into_iter().map(Into::into).collect(),
            data_types: data_types.into_iter().collect(),
        }
    }

    pub fn start_validation(
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
    ) -> Self {
        Command::StartValidation {
            release: release.into(),
            project: project.into(),
        }
    }

    pub fn finish_validation(
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
        outcome: ValidationOutcome,
        report: SubmissionReport,
    ) -> Self {
        Command::FinishValidation {
            release: release.into(),
            project: project.into(),
            outcome,
            report,
        }
    }

    pub fn cancel(release: impl Into<ReleaseName>, project: impl Into<ProjectKey>) -> Self {
        Command::Cancel {
            release: release.into(),
            project: project.into(),
        }
    }

    pub fn sign_off(
        release: impl Into<ReleaseName>,
        projects: impl IntoIterator<Item = impl Into<ProjectKey>>,
    ) -> Self {
        Command::SignOff {
            release: release.into(),
            projects: projects.into_iter().map(Into::into).collect(),
        }
    }

    pub fn reset(release: impl Into<ReleaseName>, project: impl Into<ProjectKey>) -> Self {
        Command::Reset {
            release: release.into(),
            project: project.into(),
        }
    }

    pub fn files_changed(
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
        data_types: impl IntoIterator<Item = DataType>,
    ) -> Self {
        Command::FilesChanged {
            release: release.into(),
            project: project.into(),
            data_types: data_types.into_iter().collect(),
        }
    }

    pub fn delete_unsigned(release: impl Into<ReleaseName>) -> Self {
        Command::DeleteUnsignedSubmissions {
            release: release.into(),
        }
    }

    /// Short operation name used in transition errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::OpenRelease { .. } => "open_release",
            Command::CompleteRelease { .. } => "complete_release",
            Command::DeleteUnsignedSubmissions { .. } => "delete_unsigned_submissions",
            Command::AddSubmission { .. } => "add_submission",
            Command::Queue { .. } => "queue",
            Command::StartValidation { .. } => "start_validation",
            Command::FinishValidation { .. } => "finish_validation",
            Command::Cancel { .. } => "cancel",
            Command::SignOff { .. } => "sign_off",
            Command::Reset { .. } => "reset",
            Command::FilesChanged { .. } => "files_changed",
        }
    }
}
