//! Kernel state management.
//!
//! The kernel tracks every release, the FIFO validation queue of the open
//! release and the state and report of each submission. State transitions
//! are done by taking ownership and returning a new state (builder pattern).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use vouch_types::{
    DataType, DataTypeState, ProjectKey, ReleaseName, ReleaseState, SubmissionReport,
    SubmissionState,
};

// ============================================================================
// Submissions
// ============================================================================

/// One project's files for one release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub project: ProjectKey,
    pub release: ReleaseName,
    pub state: SubmissionState,
    pub report: SubmissionReport,
    /// Data types of the pending or running validation.
    pub active_data_types: BTreeSet<DataType>,
}

impl Submission {
    pub fn new(project: ProjectKey, release: ReleaseName) -> Self {
        Self {
            project,
            release,
            state: SubmissionState::NotValidated,
            report: SubmissionReport::new(),
            active_data_types: BTreeSet::new(),
        }
    }

    /// Re-creates this submission in the namespace of the next release.
    ///
    /// Signed off and valid submissions keep their report and come out
    /// `VALID`; everything else starts over.
    pub fn promote(&self, next: &ReleaseName) -> Self {
        let mut promoted = Submission::new(self.project.clone(), next.clone());
        if matches!(
            self.state,
            SubmissionState::SignedOff | SubmissionState::Valid
        ) {
            promoted.state = SubmissionState::Valid;
            promoted.report = self.report.clone();
        }
        promoted
    }
}

/// An entry of the validation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedValidation {
    pub project: ProjectKey,
    pub data_types: BTreeSet<DataType>,
}

// ============================================================================
// Releases
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub name: ReleaseName,
    pub state: ReleaseState,
    pub queue: VecDeque<QueuedValidation>,
    pub submissions: BTreeMap<ProjectKey, Submission>,
}

impl Release {
    pub fn new(name: ReleaseName) -> Self {
        Self {
            name,
            state: ReleaseState::Opened,
            queue: VecDeque::new(),
            submissions: BTreeMap::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == ReleaseState::Completed
    }

    /// True while any submission is queued or validating.
    pub fn is_busy(&self) -> bool {
        self.submissions.values().any(|s| s.state.is_busy())
    }

    pub fn queue_head(&self) -> Option<&QueuedValidation> {
        self.queue.front()
    }
}

// ============================================================================
// Kernel State
// ============================================================================

/// The kernel's in-memory state.
///
/// State uses a builder pattern - methods take ownership of `self`, mutate,
/// and return `self`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct State {
    releases: BTreeMap<ReleaseName, Release>,
    open_release: Option<ReleaseName>,
}

impl State {
    /// Creates a new empty state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_release(&self, name: &ReleaseName) -> Option<&Release> {
        self.releases.get(name)
    }

    pub fn release_exists(&self, name: &ReleaseName) -> bool {
        self.releases.contains_key(name)
    }

    /// Name of the single release currently open, if any.
    pub fn open_release(&self) -> Option<&ReleaseName> {
        self.open_release.as_ref()
    }

    pub fn get_submission(&self, release: &ReleaseName, project: &ProjectKey) -> Option<&Submission> {
        self.releases.get(release)?.submissions.get(project)
    }

    /// State of a submission, the `GetState` query of the control surface.
    pub fn submission_state(
        &self,
        release: &ReleaseName,
        project: &ProjectKey,
    ) -> Option<SubmissionState> {
        self.get_submission(release, project).map(|s| s.state)
    }

    /// Head of the open release's validation queue.
    pub fn next_queued(&self) -> Option<(&ReleaseName, &QueuedValidation)> {
        let name = self.open_release.as_ref()?;
        let head = self.releases.get(name)?.queue_head()?;
        Some((name, head))
    }

    pub fn submission_count(&self) -> usize {
        self.releases.values().map(|r| r.submissions.len()).sum()
    }

    pub fn releases(&self) -> impl Iterator<Item = &Release> {
        self.releases.values()
    }

    // ========================================================================
    // Builders (kernel internal)
    // ========================================================================

    pub(crate) fn with_opened_release(mut self, name: ReleaseName, release: Release) -> Self {
        self.releases.insert(name.clone(), release);
        self.open_release = Some(name);
        self
    }

    pub(crate) fn with_completed_release(mut self, name: &ReleaseName) -> Self {
        if let Some(release) = self.releases.get_mut(name) {
            release.state = ReleaseState::Completed;
            release.queue.clear();
        }
        if self.open_release.as_ref() == Some(name) {
            self.open_release = None;
        }
        self
    }

    pub(crate) fn with_submission(mut self, submission: Submission) -> Self {
        if let Some(release) = self.releases.get_mut(&submission.release) {
            release
                .submissions
                .insert(submission.project.clone(), submission);
        }
        self
    }

    /// Applies `update` to a submission; a no-op if it doesn't exist.
    pub(crate) fn with_updated_submission(
        mut self,
        release: &ReleaseName,
        project: &ProjectKey,
        update: impl FnOnce(&mut Submission),
    ) -> Self {
        if let Some(submission) = self
            .releases
            .get_mut(release)
            .and_then(|r| r.submissions.get_mut(project))
        {
            update(submission);
        }
        self
    }

    pub(crate) fn with_enqueued(mut self, release: &ReleaseName, entry: QueuedValidation) -> Self {
        if let Some(release) = self.releases.get_mut(release) {
            release.queue.push_back(entry);
        }
        self
    }

    pub(crate) fn with_dequeued(mut self, release: &ReleaseName, project: &ProjectKey) -> Self {
        if let Some(release) = self.releases.get_mut(release) {
            release.queue.retain(|entry| &entry.project != project);
        }
        self
    }

    pub(crate) fn with_removed_submissions(
        mut self,
        release: &ReleaseName,
        projects: &[ProjectKey],
    ) -> Self {
        if let Some(release) = self.releases.get_mut(release) {
            for project in projects {
                release.submissions.remove(project);
            }
        }
        self
    }
}

/// Moves a submission to a new state and keeps its report consistent.
pub(crate) fn transition(
    submission: &mut Submission,
    to: SubmissionState,
    data_type_state: Option<DataTypeState>,
) {
    submission.state = to;
    if let Some(data_type_state) = data_type_state {
        submission
            .report
            .mark(&submission.active_data_types, data_type_state);
    }
}
