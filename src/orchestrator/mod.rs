// src/orchestrator/mod.rs

//! The orchestrator: turns tasks into jobs and routes them.
//!
//! Submitting creates one job per task, takes the write lock on each task's
//! outputs and classifies the job as blocked (some input is not ready for
//! reading) or pending (pushed to the run queue). The orchestrator then
//! reacts to job status changes through a hook registered on every job:
//!
//! - `Completed` / `Skipped`: sweep the blocked list and promote jobs whose
//!   inputs became readable.
//! - `Failed`: abandon every blocked job downstream of the failed one in
//!   the same submission.
//!
//! Every mutation of the blocked list and the run queue happens under the
//! orchestration lock ([`JobQueues::lock`]).

mod subsequent;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::JobConfig;
use crate::dag::TaskGraph;
use crate::dispatch::{
    Dispatcher, DispatcherFactory, JobQueues, build_dispatcher, release_output_locks,
};
use crate::errors::Result;
use crate::job::{
    InMemoryJobRepository, Job, JobCallback, JobId, JobRepository, Status, SubmitId,
};
use crate::submission::SubmissionStatus;
use crate::task::Task;

pub use subsequent::find_subsequent_jobs;

/// Interval at which `submit(.., wait)` checks for completion.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Per-call options for [`Orchestrator::submit`] and
/// [`Orchestrator::submit_task`].
#[derive(Clone, Default)]
pub struct SubmitOptions {
    /// Invoked on every status transition of every created job, after the
    /// orchestrator's own hook. Some transitions happen while the
    /// orchestration lock is held, so callbacks must not call back into the
    /// orchestrator.
    pub callbacks: Vec<JobCallback>,
    /// Run even if the outputs are up to date.
    pub force: bool,
    /// Block until every created job is finished (asynchronous modes only).
    pub wait: bool,
    /// Give up waiting after this long. Jobs keep running.
    pub timeout: Option<Duration>,
    /// Reuse an existing submission id instead of generating one.
    pub submit_id: Option<SubmitId>,
    /// Owner of the submission. Defaults to the graph's entity id, or the
    /// task id for a single task.
    pub submit_entity_id: Option<String>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(mut self, callback: JobCallback) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn submit_id(mut self, submit_id: SubmitId) -> Self {
        self.submit_id = Some(submit_id);
        self
    }

    pub fn submit_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.submit_entity_id = Some(entity_id.into());
        self
    }
}

impl fmt::Debug for SubmitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitOptions")
            .field("callbacks", &self.callbacks.len())
            .field("force", &self.force)
            .field("wait", &self.wait)
            .field("timeout", &self.timeout)
            .field("submit_id", &self.submit_id)
            .field("submit_entity_id", &self.submit_entity_id)
            .finish()
    }
}

/// Builds an [`Orchestrator`] and its dispatcher.
pub struct OrchestratorBuilder {
    config: JobConfig,
    repository: Option<Arc<dyn JobRepository>>,
    factories: HashMap<String, DispatcherFactory>,
}

impl OrchestratorBuilder {
    pub fn new(config: JobConfig) -> Self {
        Self {
            config,
            repository: None,
            factories: HashMap::new(),
        }
    }

    /// Persist jobs through `repository` instead of an in-memory one.
    pub fn repository(mut self, repository: Arc<dyn JobRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Use `factory` whenever the configured mode is named `name`.
    pub fn register_dispatcher(
        mut self,
        name: impl Into<String>,
        factory: DispatcherFactory,
    ) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Fails with a configuration error if the mode is unknown or invalid.
    pub fn build(self) -> Result<Orchestrator> {
        let queues = Arc::new(JobQueues::new());
        let repository: Arc<dyn JobRepository> = match self.repository {
            Some(repository) => repository,
            None => Arc::new(InMemoryJobRepository::new()),
        };

        let dispatcher = build_dispatcher(
            &self.config,
            Arc::clone(&queues),
            Arc::clone(&repository),
            &self.factories,
        )?;

        let config = self.config;
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let status_hook: JobCallback = Arc::new(move |job: &Job| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_status_change(job);
                }
            });

            Inner {
                config,
                queues,
                dispatcher,
                repository,
                status_hook,
            }
        });

        info!(mode = %inner.config.mode, "orchestrator created");
        Ok(Orchestrator { inner })
    }
}

/// Entry point for submitting and canceling work.
///
/// Cheap to clone; clones share the same queues and dispatcher. The
/// dispatcher is stopped when the last clone is dropped.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: JobConfig,
    queues: Arc<JobQueues>,
    dispatcher: Arc<dyn Dispatcher>,
    repository: Arc<dyn JobRepository>,
    status_hook: JobCallback,
}

impl Orchestrator {
    pub fn builder(config: JobConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Orchestrator with the built-in dispatchers and an in-memory repository.
    pub fn new(config: JobConfig) -> Result<Self> {
        OrchestratorBuilder::new(config).build()
    }

    pub fn config(&self) -> &JobConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.inner.dispatcher
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.inner.repository
    }

    /// Start the dispatcher. Idempotent.
    pub fn start(&self) -> Result<()> {
        Arc::clone(&self.inner.dispatcher).start(false)
    }

    /// Tear down and recreate the dispatcher's workers.
    pub fn restart(&self) -> Result<()> {
        Arc::clone(&self.inner.dispatcher).start(true)
    }

    pub fn stop(&self, wait: bool, timeout: Option<Duration>) {
        self.inner.dispatcher.stop(wait, timeout);
    }

    pub fn is_running(&self) -> bool {
        self.inner.dispatcher.is_running()
    }

    /// Submit every task of `graph`, wave by wave, as one submission.
    pub fn submit(&self, graph: &TaskGraph, options: SubmitOptions) -> Vec<Arc<Job>> {
        let submit_id = options.submit_id.clone().unwrap_or_else(SubmitId::generate);
        let entity_id = options
            .submit_entity_id
            .clone()
            .unwrap_or_else(|| graph.entity_id().to_string());

        let jobs: Vec<Arc<Job>> = {
            let mut blocked = self.inner.queues.lock();
            graph
                .waves()
                .iter()
                .flatten()
                .map(|task| {
                    self.inner.create_and_classify(
                        &mut blocked,
                        Arc::clone(task),
                        &submit_id,
                        &entity_id,
                        &options,
                    )
                })
                .collect()
        };

        info!(
            submit_id = %submit_id,
            entity = %entity_id,
            jobs = jobs.len(),
            "submission created"
        );

        self.after_submit(&jobs, &options);
        jobs
    }

    /// Submit a single task as its own submission (or as part of
    /// `options.submit_id` when given).
    pub fn submit_task(&self, task: Arc<Task>, options: SubmitOptions) -> Arc<Job> {
        let submit_id = options.submit_id.clone().unwrap_or_else(SubmitId::generate);
        let entity_id = options
            .submit_entity_id
            .clone()
            .unwrap_or_else(|| task.id().to_string());

        let job = {
            let mut blocked = self.inner.queues.lock();
            self.inner
                .create_and_classify(&mut blocked, task, &submit_id, &entity_id, &options)
        };

        self.after_submit(std::slice::from_ref(&job), &options);
        job
    }

    /// Cancel `job` and abandon the blocked jobs of its submission that
    /// depend on it.
    ///
    /// Finished jobs and jobs already handed to a worker are left alone;
    /// both cases are only logged.
    pub fn cancel_job(&self, job: &Job) {
        match job.status() {
            Status::Canceled
            | Status::Abandoned
            | Status::Failed
            | Status::Completed
            | Status::Skipped => {
                info!(
                    job = %job.id(),
                    status = %job.status(),
                    "job is already finished and cannot be canceled"
                );
            }
            _ => {
                let mut blocked = self.inner.queues.lock();
                let subsequent = find_subsequent_jobs(
                    &blocked,
                    job.submit_id(),
                    job.task().output_ids(),
                );
                self.inner.cancel_jobs(&mut blocked, job, &subsequent);
            }
        }
    }

    /// Every job known to the repository.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.inner.repository.all()
    }

    pub fn job(&self, id: &JobId) -> Option<Arc<Job>> {
        self.inner.repository.get(id)
    }

    pub fn blocked_jobs(&self) -> Vec<Arc<Job>> {
        self.inner.queues.lock().clone()
    }

    pub fn pending_job_ids(&self) -> Vec<JobId> {
        self.inner.queues.run_queue().job_ids()
    }

    /// Aggregated status of every job created under `submit_id`.
    pub fn submission_status(&self, submit_id: &SubmitId) -> SubmissionStatus {
        let jobs: Vec<Arc<Job>> = self
            .jobs()
            .into_iter()
            .filter(|job| job.submit_id() == submit_id)
            .collect();
        SubmissionStatus::from_jobs(&jobs)
    }

    fn after_submit(&self, jobs: &[Arc<Job>], options: &SubmitOptions) {
        let dispatcher = &self.inner.dispatcher;
        if dispatcher.is_synchronous() {
            dispatcher.run_all_pending();
        } else if options.wait {
            wait_for_jobs(jobs, options.timeout);
        }
    }
}

/// Poll until every job is finished or `timeout` elapses.
fn wait_for_jobs(jobs: &[Arc<Job>], timeout: Option<Duration>) {
    let started = Instant::now();
    loop {
        if jobs.iter().all(|job| job.is_finished()) {
            debug!(jobs = jobs.len(), "all waited-for jobs finished");
            return;
        }
        if timeout.is_some_and(|t| started.elapsed() >= t) {
            let unfinished = jobs.iter().filter(|job| !job.is_finished()).count();
            warn!(unfinished, "timed out waiting for jobs; they keep running");
            return;
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn inputs_not_ready(task: &Task) -> bool {
    task.inputs().iter().any(|dn| !dn.is_ready_for_reading())
}

impl Inner {
    fn create_and_classify(
        &self,
        blocked: &mut Vec<Arc<Job>>,
        task: Arc<Task>,
        submit_id: &SubmitId,
        entity_id: &str,
        options: &SubmitOptions,
    ) -> Arc<Job> {
        for output in task.outputs() {
            output.lock_edit();
        }

        let mut callbacks = Vec::with_capacity(options.callbacks.len() + 1);
        callbacks.push(Arc::clone(&self.status_hook));
        callbacks.extend(options.callbacks.iter().cloned());

        let job = self.repository.create(
            task,
            callbacks,
            submit_id.clone(),
            entity_id.to_string(),
            options.force,
        );

        if inputs_not_ready(job.task()) {
            blocked.push(Arc::clone(&job));
            job.blocked();
            debug!(job = %job.id(), task = %job.task().id(), "job blocked on its inputs");
        } else {
            job.pending();
            self.queues.run_queue().push(Arc::clone(&job));
        }

        self.persist(&job);
        job
    }

    fn on_status_change(&self, job: &Job) {
        match job.status() {
            Status::Completed | Status::Skipped => self.unblock_jobs(),
            Status::Failed => self.fail_subsequent_jobs(job),
            _ => {}
        }
    }

    /// Promote every blocked job whose inputs are now readable.
    fn unblock_jobs(&self) {
        let mut blocked = self.queues.lock();

        let ready: Vec<Arc<Job>> = blocked
            .iter()
            .filter(|job| !inputs_not_ready(job.task()))
            .cloned()
            .collect();

        for job in ready {
            let Some(pos) = blocked.iter().position(|b| b.id() == job.id()) else {
                debug!(job = %job.id(), "job already left the blocked list");
                continue;
            };
            blocked.remove(pos);

            if job.pending() {
                debug!(job = %job.id(), task = %job.task().id(), "job unblocked");
                self.queues.run_queue().push(job);
            } else {
                debug!(job = %job.id(), status = %job.status(), "unblocked job is no longer blocked");
            }
        }
    }

    fn fail_subsequent_jobs(&self, failed: &Job) {
        let mut blocked = self.queues.lock();

        let subsequent =
            find_subsequent_jobs(&blocked, failed.submit_id(), failed.task().output_ids());
        for job in &subsequent {
            if job.abandoned() {
                release_output_locks(job);
                self.persist(job);
            }
            self.remove_from_queues(&mut blocked, job.id());
        }
        self.remove_from_queues(&mut blocked, failed.id());

        if !subsequent.is_empty() {
            warn!(
                job = %failed.id(),
                abandoned = subsequent.len(),
                "job failed; abandoning downstream jobs"
            );
        }
    }

    fn cancel_jobs(&self, blocked: &mut Vec<Arc<Job>>, target: &Job, subsequent: &[Arc<Job>]) {
        let targets = std::iter::once((target, true))
            .chain(subsequent.iter().map(|job| (job.as_ref(), false)));

        for (job, is_target) in targets {
            if self.dispatcher.is_dispatched(job.id()) {
                info!(job = %job.id(), "job is running and cannot be canceled");
                continue;
            }

            self.remove_from_queues(blocked, job.id());

            let transitioned = if is_target {
                job.canceled()
            } else {
                job.abandoned()
            };

            if transitioned {
                release_output_locks(job);
                self.persist(job);
                info!(
                    job = %job.id(),
                    status = %job.status(),
                    "job removed from the queues"
                );
            } else {
                debug!(job = %job.id(), status = %job.status(), "job could not be canceled");
            }
        }
    }

    fn remove_from_queues(&self, blocked: &mut Vec<Arc<Job>>, id: &JobId) {
        blocked.retain(|job| job.id() != id);
        self.queues.run_queue().remove(id);
    }

    fn persist(&self, job: &Job) {
        if let Err(err) = self.repository.set(job) {
            warn!(job = %job.id(), error = %err, "failed to persist job state");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispatcher.stop(false, None);
    }
}
