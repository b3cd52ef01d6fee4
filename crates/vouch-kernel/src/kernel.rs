//! The kernel - pure functional core of `Vouch`.
//!
//! The kernel applies commands to produce new state and effects. It is
//! completely pure: no IO, no clocks, no randomness. A command whose
//! precondition fails returns an error and the caller keeps its old state.
//!
//! # Example
//!
//! ```ignore
//! let (state, effects) = apply_committed(state, Command::sign_off("release1", ["PACA-CA"]))?;
//! // Engine executes effects...
//! ```

use std::collections::BTreeSet;

use vouch_types::{
    DataType, DataTypeState, ProjectKey, ReleaseName, SubmissionReport, SubmissionState,
    ValidationOutcome,
};

use crate::command::Command;
use crate::effects::Effect;
use crate::state::{QueuedValidation, Release, State, Submission, transition};

/// Applies a command to the state, producing new state and effects.
///
/// Takes ownership of state, returns new state.
pub fn apply_committed(state: State, cmd: Command) -> Result<(State, Vec<Effect>), KernelError> {
    let operation = cmd.name();
    let mut effects = Vec::new();

    match cmd {
        // ====================================================================
        // Release Commands
        // ====================================================================
        Command::OpenRelease { release } => {
            // Precondition: at most one release is open at a time
            if let Some(open) = state.open_release() {
                return Err(KernelError::ReleaseAlreadyOpened(open.clone()));
            }
            if state.release_exists(&release) {
                return Err(KernelError::ReleaseAlreadyExists(release));
            }

            effects.push(Effect::ReleaseOpened {
                release: release.clone(),
            });
            let new_state = state.with_opened_release(release.clone(), Release::new(release));

            Ok((new_state, effects))
        }

        Command::CompleteRelease { release, next } => {
            let current = opened_release(&state, &release)?;

            // Precondition: no validation pending or running
            if current.is_busy() {
                return Err(KernelError::ReleaseBusy(release));
            }
            if state.release_exists(&next) {
                return Err(KernelError::ReleaseAlreadyExists(next));
            }

            let mut next_release = Release::new(next.clone());
            for submission in current.submissions.values() {
                let promoted = submission.promote(&next);
                effects.push(Effect::SubmissionStateChanged {
                    release: next.clone(),
                    project: promoted.project.clone(),
                    from: None,
                    to: promoted.state,
                });
                next_release
                    .submissions
                    .insert(promoted.project.clone(), promoted);
            }

            effects.push(Effect::ReleaseCompleted {
                release: release.clone(),
                next: next.clone(),
            });
            effects.push(Effect::ReleaseOpened {
                release: next.clone(),
            });

            let new_state = state
                .with_completed_release(&release)
                .with_opened_release(next.clone(), next_release);

            // Postcondition: exactly one open release, the new one
            debug_assert_eq!(new_state.open_release(), Some(&next));

            Ok((new_state, effects))
        }

        Command::DeleteUnsignedSubmissions { release } => {
            let target = state
                .get_release(&release)
                .ok_or_else(|| KernelError::ReleaseNotFound(release.clone()))?;

            // Precondition: only finalized releases are cleaned up
            if !target.is_completed() {
                return Err(KernelError::ReleaseNotCompleted(release));
            }

            let projects: Vec<ProjectKey> = target
                .submissions
                .values()
                .filter(|s| s.state != SubmissionState::SignedOff)
                .map(|s| s.project.clone())
                .collect();

            let new_state = state.with_removed_submissions(&release, &projects);
            effects.push(Effect::SubmissionsDeleted { release, projects });

            Ok((new_state, effects))
        }

        // ====================================================================
        // Submission Commands
        // ====================================================================
        Command::AddSubmission { release, project } => {
            let target = opened_release(&state, &release)?;
            if target.submissions.contains_key(&project) {
                return Err(KernelError::SubmissionAlreadyExists { release, project });
            }

            effects.push(Effect::SubmissionStateChanged {
                release: release.clone(),
                project: project.clone(),
                from: None,
                to: SubmissionState::NotValidated,
            });
            let new_state = state.with_submission(Submission::new(project, release));

            Ok((new_state, effects))
        }

        Command::Queue {
            release,
            projects,
            mut data_types,
        } => {
            if projects.is_empty() || data_types.is_empty() {
                return Err(KernelError::EmptyRequest(operation));
            }
            // Feature types reference the clinical core, so it is always validated
            data_types.insert(DataType::Clinical);

            let target = opened_release(&state, &release)?;
            let projects = dedup(projects);
            let mut previous = Vec::with_capacity(projects.len());
            for project in &projects {
                let submission = find_submission(target, project)?;
                if !submission.state.can_queue() {
                    return Err(invalid_transition(submission, operation));
                }
                previous.push(submission.state);
            }

            let mut new_state = state;
            for (project, from) in projects.into_iter().zip(previous) {
                new_state = new_state
                    .with_updated_submission(&release, &project, |s| {
                        s.report.reset(&data_types);
                        s.active_data_types.clone_from(&data_types);
                        transition(s, SubmissionState::Queued, Some(DataTypeState::NotValidated));
                    })
                    .with_enqueued(
                        &release,
                        QueuedValidation {
                            project: project.clone(),
                            data_types: data_types.clone(),
                        },
                    );

                effects.push(Effect::SubmissionStateChanged {
                    release: release.clone(),
                    project: project.clone(),
                    from: Some(from),
                    to: SubmissionState::Queued,
                });
                effects.push(Effect::ValidationQueued {
                    release: release.clone(),
                    project,
                    data_types: data_types.clone(),
                });
            }

            Ok((new_state, effects))
        }

        Command::StartValidation { release, project } => {
            let target = opened_release(&state, &release)?;
            let submission = find_submission(target, &project)?;
            if submission.state != SubmissionState::Queued {
                return Err(invalid_transition(submission, operation));
            }

            // Precondition: admission is first-in-first-validated
            let data_types = match target.queue_head() {
                Some(head) if head.project == project => head.data_types.clone(),
                _ => return Err(KernelError::NotAtQueueHead { release, project }),
            };

            let new_state = state
                .with_dequeued(&release, &project)
                .with_updated_submission(&release, &project, |s| {
                    transition(s, SubmissionState::Validating, Some(DataTypeState::Validating));
                });

            effects.push(Effect::SubmissionStateChanged {
                release: release.clone(),
                project: project.clone(),
                from: Some(SubmissionState::Queued),
                to: SubmissionState::Validating,
            });
            effects.push(Effect::ValidationStarted {
                release,
                project,
                data_types,
            });

            Ok((new_state, effects))
        }

        Command::FinishValidation {
            release,
            project,
            outcome,
            report,
        } => {
            let target = opened_release(&state, &release)?;
            let submission = find_submission(target, &project)?;
            if submission.state != SubmissionState::Validating {
                return Err(invalid_transition(submission, operation));
            }

            let to = finished_state(outcome);
            let new_state = state.with_updated_submission(&release, &project, |s| {
                if outcome == ValidationOutcome::Cancelled {
                    // No partial report is published for an interrupted run
                    s.report.reset(&s.active_data_types);
                } else {
                    s.report.merge(report);
                }
                transition(s, to, Some(outcome.data_type_state()));
                s.active_data_types.clear();
            });

            effects.push(Effect::SubmissionStateChanged {
                release,
                project,
                from: Some(SubmissionState::Validating),
                to,
            });

            Ok((new_state, effects))
        }

        Command::Cancel { release, project } => {
            let target = opened_release(&state, &release)?;
            let submission = find_submission(target, &project)?;

            match submission.state {
                SubmissionState::Queued => {
                    let new_state = state.with_dequeued(&release, &project).with_updated_submission(
                        &release,
                        &project,
                        |s| {
                            transition(
                                s,
                                SubmissionState::NotValidated,
                                Some(DataTypeState::NotValidated),
                            );
                            s.active_data_types.clear();
                        },
                    );
                    effects.push(Effect::SubmissionStateChanged {
                        release,
                        project,
                        from: Some(SubmissionState::Queued),
                        to: SubmissionState::NotValidated,
                    });
                    Ok((new_state, effects))
                }
                // The run observes the signal and finishes as cancelled
                SubmissionState::Validating => {
                    effects.push(Effect::CancelValidation { release, project });
                    Ok((state, effects))
                }
                _ => Err(invalid_transition(submission, operation)),
            }
        }

        Command::SignOff { release, projects } => {
            if projects.is_empty() {
                return Err(KernelError::EmptyRequest(operation));
            }

            let target = opened_release(&state, &release)?;
            let projects = dedup(projects);
            for project in &projects {
                let submission = find_submission(target, project)?;
                if submission.state != SubmissionState::Valid {
                    return Err(invalid_transition(submission, operation));
                }
            }

            let mut new_state = state;
            for project in projects {
                new_state = new_state.with_updated_submission(&release, &project, |s| {
                    transition(s, SubmissionState::SignedOff, None);
                });
                effects.push(Effect::SubmissionStateChanged {
                    release: release.clone(),
                    project,
                    from: Some(SubmissionState::Valid),
                    to: SubmissionState::SignedOff,
                });
            }

            Ok((new_state, effects))
        }

        Command::Reset { release, project } => {
            let target = opened_release(&state, &release)?;
            let submission = find_submission(target, &project)?;
            if !submission.state.can_queue() {
                return Err(invalid_transition(submission, operation));
            }

            let from = submission.state;
            let new_state = state.with_updated_submission(&release, &project, |s| {
                s.report = SubmissionReport::new();
                transition(s, SubmissionState::NotValidated, None);
            });
            effects.push(Effect::SubmissionStateChanged {
                release,
                project,
                from: Some(from),
                to: SubmissionState::NotValidated,
            });

            Ok((new_state, effects))
        }

        Command::FilesChanged {
            release,
            project,
            data_types,
        } => {
            if data_types.is_empty() {
                return Err(KernelError::EmptyRequest(operation));
            }

            let target = opened_release(&state, &release)?;
            let submission = find_submission(target, &project)?;

            // Precondition: files are frozen while read-only or busy
            if !matches!(
                submission.state,
                SubmissionState::NotValidated | SubmissionState::Error
            ) {
                return Err(invalid_transition(submission, operation));
            }

            let from = submission.state;
            let new_state = state.with_updated_submission(&release, &project, |s| {
                s.report.reset(&data_types);
                transition(s, SubmissionState::NotValidated, None);
            });
            if from != SubmissionState::NotValidated {
                effects.push(Effect::SubmissionStateChanged {
                    release,
                    project,
                    from: Some(from),
                    to: SubmissionState::NotValidated,
                });
            }

            Ok((new_state, effects))
        }
    }
}

fn opened_release<'a>(state: &'a State, name: &ReleaseName) -> Result<&'a Release, KernelError> {
    let release = state
        .get_release(name)
        .ok_or_else(|| KernelError::ReleaseNotFound(name.clone()))?;
    if release.is_completed() {
        return Err(KernelError::ReleaseCompleted(name.clone()));
    }
    Ok(release)
}

fn find_submission<'a>(
    release: &'a Release,
    project: &ProjectKey,
) -> Result<&'a Submission, KernelError> {
    release
        .submissions
        .get(project)
        .ok_or_else(|| KernelError::SubmissionNotFound {
            release: release.name.clone(),
            project: project.clone(),
        })
}

fn invalid_transition(submission: &Submission, operation: &'static str) -> KernelError {
    KernelError::InvalidTransition {
        project: submission.project.clone(),
        state: submission.state,
        operation,
    }
}

fn finished_state(outcome: ValidationOutcome) -> SubmissionState {
    match outcome {
        ValidationOutcome::Valid => SubmissionState::Valid,
        ValidationOutcome::Invalid => SubmissionState::Invalid,
        ValidationOutcome::Error => SubmissionState::Error,
        ValidationOutcome::Cancelled => SubmissionState::NotValidated,
    }
}

fn dedup(projects: Vec<ProjectKey>) -> Vec<ProjectKey> {
    let mut seen = BTreeSet::new();
    projects
        .into_iter()
        .filter(|project| seen.insert(project.clone()))
        .collect()
}

/// Errors that can occur when applying commands to the kernel.
///
/// Every variant is a precondition violation: the command was not legal in
/// the current state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    // Release errors
    #[error("release '{0}' not found")]
    ReleaseNotFound(ReleaseName),

    #[error("release '{0}' already exists")]
    ReleaseAlreadyExists(ReleaseName),

    #[error("release '{0}' is already open")]
    ReleaseAlreadyOpened(ReleaseName),

    #[error("release '{0}' is completed and read-only")]
    ReleaseCompleted(ReleaseName),

    #[error("release '{0}' is not completed")]
    ReleaseNotCompleted(ReleaseName),

    #[error("release '{0}' has queued or validating submissions")]
    ReleaseBusy(ReleaseName),

    // Submission errors
    #[error("submission '{project}' not found in release '{release}'")]
    SubmissionNotFound {
        release: ReleaseName,
        project: ProjectKey,
    },

    #[error("submission '{project}' already exists in release '{release}'")]
    SubmissionAlreadyExists {
        release: ReleaseName,
        project: ProjectKey,
    },

    #[error("cannot {operation} submission '{project}' in state {state}")]
    InvalidTransition {
        project: ProjectKey,
        state: SubmissionState,
        operation: &'static str,
    },

    #[error("submission '{project}' is not at the head of the queue of release '{release}'")]
    NotAtQueueHead {
        release: ReleaseName,
        project: ProjectKey,
    },

    // General errors
    #[error("{0} requires at least one project and data type")]
    EmptyRequest(&'static str),
}
