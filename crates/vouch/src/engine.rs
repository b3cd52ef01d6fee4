//! The engine: kernel state behind a single lock plus a bounded worker pool.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;
use vouch_config::EngineConfig;
use vouch_kernel::{Command, Effect, Release, State, Submission, apply_committed};
use vouch_types::{
    DataType, ProjectKey, ReleaseName, SubmissionReport, SubmissionState, ValidationOutcome,
};
use vouch_validator::CancellationToken;

use crate::error::{EngineError, EngineResult};
use crate::runner::{RunContext, SubmissionRunner};

type RunKey = (ReleaseName, ProjectKey);

/// State guarded by the engine lock.
#[derive(Default)]
struct EngineInner {
    /// Kernel state machine.
    kernel: State,

    /// Cancellation tokens of the validations currently running.
    running: HashMap<RunKey, CancellationToken>,

    shutting_down: bool,
}

impl EngineInner {
    /// Applies a command to the kernel and executes the resulting effects.
    fn apply(&mut self, command: Command, signals: &Signals) -> EngineResult<()> {
        let (new_state, effects) = apply_committed(self.kernel.clone(), command)?;
        self.kernel = new_state;
        self.execute_effects(effects, signals);
        Ok(())
    }

    /// Executes effects produced by the kernel.
    fn execute_effects(&mut self, effects: Vec<Effect>, signals: &Signals) {
        for effect in effects {
            match effect {
                Effect::ReleaseOpened { release } => {
                    tracing::info!(%release, "release opened");
                }
                Effect::ReleaseCompleted { release, next } => {
                    tracing::info!(%release, %next, "release completed");
                }
                Effect::SubmissionsDeleted { release, projects } => {
                    tracing::info!(%release, deleted = projects.len(), "unsigned submissions deleted");
                }
                Effect::SubmissionStateChanged {
                    release,
                    project,
                    from,
                    to,
                } => {
                    tracing::debug!(%release, %project, ?from, ?to, "submission state changed");
                    if !to.is_busy() {
                        signals.settled.notify_all();
                    }
                }
                Effect::ValidationQueued {
                    release,
                    project,
                    data_types,
                } => {
                    tracing::debug!(%release, %project, ?data_types, "validation queued");
                    signals.queued.notify_all();
                }
                Effect::ValidationStarted {
                    release,
                    project,
                    data_types,
                } => {
                    tracing::debug!(%release, %project, ?data_types, "validation admitted");
                }
                Effect::CancelValidation { release, project } => {
                    match self.running.get(&(release.clone(), project.clone())) {
                        Some(token) => {
                            token.cancel();
                            tracing::info!(%release, %project, "cancellation requested");
                        }
                        None => {
                            tracing::warn!(%release, %project, "no running validation to cancel");
                        }
                    }
                }
            }
        }
    }
}

/// Wakeups shared by workers and waiters.
#[derive(Default)]
struct Signals {
    /// Something was queued, or the engine is shutting down.
    queued: Condvar,
    /// A submission left the QUEUED or VALIDATING state.
    settled: Condvar,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<EngineInner>,
    signals: Signals,
}

impl Shared {
    fn lock(&self) -> EngineResult<MutexGuard<'_, EngineInner>> {
        self.inner
            .lock()
            .map_err(|_| EngineError::internal("lock poisoned"))
    }

    /// Blocks until the head of the open release's queue can be admitted.
    ///
    /// Returns `None` once the engine shuts down.
    fn next_job(&self) -> Option<(RunContext, CancellationToken)> {
        let mut inner = self.lock().ok()?;
        loop {
            if inner.shutting_down {
                return None;
            }

            let head = inner.kernel.next_queued().map(|(release, head)| {
                (release.clone(), head.project.clone(), head.data_types.clone())
            });
            if let Some((release, project, data_types)) = head {
                let command = Command::start_validation(release.clone(), project.clone());
                match inner.apply(command, &self.signals) {
                    Ok(()) => {
                        let token = CancellationToken::new();
                        inner
                            .running
                            .insert((release.clone(), project.clone()), token.clone());
                        let context = RunContext {
                            release,
                            project,
                            data_types,
                            run_id: Uuid::new_v4().to_string(),
                        };
                        return Some((context, token));
                    }
                    Err(e) => {
                        tracing::error!(%release, %project, error = %e, "failed to admit queued validation");
                    }
                }
            }

            inner = self.signals.queued.wait(inner).ok()?;
        }
    }

    /// Records the end of a run and forgets its cancellation token.
    fn finish(&self, context: &RunContext, outcome: ValidationOutcome, report: SubmissionReport) -> EngineResult<()> {
        let mut inner = self.lock()?;
        inner
            .running
            .remove(&(context.release.clone(), context.project.clone()));
        let command = Command::finish_validation(
            context.release.clone(),
            context.project.clone(),
            outcome,
            report,
        );
        inner.apply(command, &self.signals)
    }
}

fn worker_loop(id: usize, shared: &Shared, runner: &dyn SubmissionRunner) {
    tracing::debug!(worker = id, "worker started");

    while let Some((context, token)) = shared.next_job() {
        let started = Utc::now();
        tracing::info!(
            worker = id,
            release = %context.release,
            project = %context.project,
            run_id = %context.run_id,
            "validation started"
        );

        let (outcome, report) = match runner.run(&context, &token) {
            Ok(output) => (output.outcome, output.report),
            Err(e) => {
                tracing::error!(
                    worker = id,
                    release = %context.release,
                    project = %context.project,
                    run_id = %context.run_id,
                    error = %e,
                    "validation failed"
                );
                (ValidationOutcome::Error, SubmissionReport::new())
            }
        };

        let elapsed = Utc::now() - started;
        tracing::info!(
            worker = id,
            release = %context.release,
            project = %context.project,
            ?outcome,
            elapsed_ms = elapsed.num_milliseconds(),
            "validation finished"
        );

        if let Err(e) = shared.finish(&context, outcome, report) {
            tracing::error!(worker = id, run_id = %context.run_id, error = %e, "failed to record validation result");
        }
    }

    tracing::debug!(worker = id, "worker stopped");
}

/// The validation engine.
///
/// All lifecycle transitions go through one lock, so conflicting requests on
/// the same submission are serialized. At most `max_simultaneous` validations
/// run at once; further queued submissions wait in FIFO order.
///
/// # Example
///
/// ```no_run
/// use vouch::{Engine, PipelineRunner};
/// use vouch_config::VouchConfig;
/// use vouch_types::DataType;
///
/// let config = VouchConfig::load()?;
/// let engine = Engine::start(&config.engine, PipelineRunner::from_config(&config))?;
///
/// engine.open_release("release1")?;
/// engine.add_submission("release1", "PACA-CA")?;
/// engine.queue("release1", ["PACA-CA"], [DataType::Ssm])?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Engine {
    shared: Arc<Shared>,
    workers: Vec<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Starts an engine with `max_simultaneous` worker threads.
    pub fn start(config: &EngineConfig, runner: impl SubmissionRunner) -> EngineResult<Self> {
        Self::start_with_state(config, runner, State::new())
    }

    /// Starts an engine over existing kernel state.
    pub fn start_with_state(
        config: &EngineConfig,
        runner: impl SubmissionRunner,
        state: State,
    ) -> EngineResult<Self> {
        let shared = Arc::new(Shared::default());
        shared.lock()?.kernel = state;

        let runner: Arc<dyn SubmissionRunner> = Arc::new(runner);
        let worker_count = config.max_simultaneous.max(1);
        let mut engine = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
        };

        for id in 0..worker_count {
            let shared = Arc::clone(&engine.shared);
            let runner = Arc::clone(&runner);
            let handle = thread::Builder::new()
                .name(format!("vouch-worker-{id}"))
                .spawn(move || worker_loop(id, &shared, runner.as_ref()))
                .map_err(|source| EngineError::Spawn { id, source })?;
            engine.workers.push(Some(handle));
        }

        tracing::info!(workers = worker_count, "engine started");
        Ok(engine)
    }

    /// Submits a command to the state machine.
    pub fn submit(&self, command: Command) -> EngineResult<()> {
        let operation = command.name();
        let mut inner = self.shared.lock()?;
        inner.apply(command, &self.shared.signals).inspect_err(|e| {
            tracing::debug!(operation, error = %e, "command rejected");
        })
    }

    // ========================================================================
    // Control surface
    // ========================================================================

    pub fn open_release(&self, release: impl Into<ReleaseName>) -> EngineResult<()> {
        self.submit(Command::open_release(release))
    }

    /// Completes `release` and opens `next`, promoting every submission.
    pub fn complete_release(
        &self,
        release: impl Into<ReleaseName>,
        next: impl Into<ReleaseName>,
    ) -> EngineResult<()> {
        self.submit(Command::complete_release(release, next))
    }

    pub fn delete_unsigned(&self, release: impl Into<ReleaseName>) -> EngineResult<()> {
        self.submit(Command::delete_unsigned(release))
    }

    pub fn add_submission(
        &self,
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
    ) -> EngineResult<()> {
        self.submit(Command::add_submission(release, project))
    }

    /// Queues the given projects for validation of `data_types`.
    pub fn queue(
        &self,
        release: impl Into<ReleaseName>,
        projects: impl IntoIterator<Item = impl Into<ProjectKey>>,
        data_types: impl IntoIterator<Item = DataType>,
    ) -> EngineResult<()> {
        let command = Command::queue(release, projects, data_types);
        let mut inner = self.shared.lock()?;
        if inner.shutting_down {
            return Err(EngineError::Shutdown);
        }
        inner.apply(command, &self.shared.signals)
    }

    /// Dequeues a QUEUED submission or interrupts a VALIDATING one.
    pub fn cancel(
        &self,
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
    ) -> EngineResult<()> {
        self.submit(Command::cancel(release, project))
    }

    pub fn sign_off(
        &self,
        release: impl Into<ReleaseName>,
        projects: impl IntoIterator<Item = impl Into<ProjectKey>>,
    ) -> EngineResult<()> {
        self.submit(Command::sign_off(release, projects))
    }

    pub fn reset(
        &self,
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
    ) -> EngineResult<()> {
        self.submit(Command::reset(release, project))
    }

    /// Notifies the engine that files of `data_types` were uploaded or removed.
    pub fn files_changed(
        &self,
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
        data_types: impl IntoIterator<Item = DataType>,
    ) -> EngineResult<()> {
        self.submit(Command::files_changed(release, project, data_types))
    }

    /// State of a submission, `None` when it does not exist.
    pub fn get_state(
        &self,
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
    ) -> EngineResult<Option<SubmissionState>> {
        let inner = self.shared.lock()?;
        Ok(inner
            .kernel
            .submission_state(&release.into(), &project.into()))
    }

    pub fn submission(
        &self,
        release: impl Into<ReleaseName>,
        project: impl Into<ProjectKey>,
    ) -> EngineResult<Option<Submission>> {
        let inner = self.shared.lock()?;
        Ok(inner
            .kernel
            .get_submission(&release.into(), &project.into())
            .cloned())
    }

    /// Snapshot of the kernel state.
    pub fn state(&self) -> EngineResult<State> {
        Ok(self.shared.lock()?.kernel.clone())
    }

    /// Projects currently being validated.
    pub fn running(&self) -> EngineResult<BTreeSet<RunKey>> {
        Ok(self.shared.lock()?.running.keys().cloned().collect())
    }

    /// Blocks until no submission is queued or validating, or `timeout`
    /// elapses. Returns whether the engine went idle.
    pub fn wait_idle(&self, timeout: Duration) -> EngineResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.lock()?;
        loop {
            if !inner.kernel.releases().any(Release::is_busy) {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let (guard, _) = self
                .shared
                .signals
                .settled
                .wait_timeout(inner, remaining)
                .map_err(|_| EngineError::internal("lock poisoned"))?;
            inner = guard;
        }
    }

    /// Stops the workers and joins them.
    ///
    /// Idle workers exit at once; a running validation is finished first.
    /// Calling this more than once is a no-op.
    pub fn shutdown(&mut self) {
        match self.shared.lock() {
            Ok(mut inner) => inner.shutting_down = true,
            Err(e) => tracing::error!(error = %e, "shutting down with poisoned state"),
        }
        self.shared.signals.queued.notify_all();

        for (id, handle) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = handle.take() {
                if handle.join().is_err() {
                    tracing::error!(worker = id, "worker panicked");
                }
            }
        }
        tracing::debug!("engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
