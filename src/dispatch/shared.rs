// src/dispatch/shared.rs

//! Worker accounting, in-flight registry and status bookkeeping shared by
//! every dispatcher backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::dispatch::queue::JobQueues;
use crate::errors::TaskError;
use crate::job::{Job, JobId, JobRepository};
use crate::task::Task;

/// Handle on a job handed to a worker.
pub type ExecutionHandle = tokio::task::JoinHandle<()>;

const IN_FLIGHT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct DispatcherCore {
    queues: Arc<JobQueues>,
    repository: Arc<dyn JobRepository>,
    nb_of_workers: usize,
    available_workers: AtomicUsize,
    in_flight: Mutex<HashMap<JobId, ExecutionHandle>>,
    stop_requested: AtomicBool,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
}

impl DispatcherCore {
    pub fn new(
        queues: Arc<JobQueues>,
        repository: Arc<dyn JobRepository>,
        nb_of_workers: usize,
    ) -> Self {
        Self {
            queues,
            repository,
            nb_of_workers,
            available_workers: AtomicUsize::new(nb_of_workers),
            in_flight: Mutex::new(HashMap::new()),
            stop_requested: AtomicBool::new(false),
            loop_thread: Mutex::new(None),
        }
    }

    pub fn queues(&self) -> &Arc<JobQueues> {
        &self.queues
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    pub fn nb_of_workers(&self) -> usize {
        self.nb_of_workers
    }

    pub fn available_workers(&self) -> usize {
        self.available_workers.load(Ordering::SeqCst)
    }

    pub fn can_execute(&self) -> bool {
        self.available_workers() > 0
    }

    /// Claim a worker slot. Returns `false` if none was free.
    pub fn acquire_worker(&self) -> bool {
        self.available_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn release_worker(&self) {
        let max = self.nb_of_workers;
        let _ = self
            .available_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            });
    }

    pub(crate) fn reset_workers(&self) {
        self.available_workers
            .store(self.nb_of_workers, Ordering::SeqCst);
    }

    /// Lock the in-flight registry.
    ///
    /// Backends hold this guard while handing a job to a worker so the
    /// completion path cannot unregister it before it is registered.
    pub fn in_flight(&self) -> MutexGuard<'_, HashMap<JobId, ExecutionHandle>> {
        self.in_flight.lock()
    }

    pub fn unregister(&self, id: &JobId) -> Option<ExecutionHandle> {
        self.in_flight.lock().remove(id)
    }

    pub fn is_dispatched(&self, id: &JobId) -> bool {
        self.in_flight.lock().contains_key(id)
    }

    pub fn dispatched_ids(&self) -> Vec<JobId> {
        self.in_flight.lock().keys().cloned().collect()
    }

    /// Forget every in-flight execution, e.g. when the worker pool is torn
    /// down underneath them.
    pub(crate) fn clear_in_flight(&self) {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.is_empty() {
            warn!(
                abandoned = in_flight.len(),
                "forgetting in-flight executions of the previous worker pool"
            );
        }
        in_flight.clear();
    }

    /// Block until nothing is in flight or `timeout` elapses.
    pub(crate) fn wait_for_in_flight(&self, timeout: Option<Duration>) -> bool {
        let started = Instant::now();
        loop {
            if self.in_flight.lock().is_empty() {
                return true;
            }
            if timeout.is_some_and(|t| started.elapsed() >= t) {
                return false;
            }
            thread::sleep(IN_FLIGHT_POLL_INTERVAL);
        }
    }

    /// Whether `task` has to run, or its cached outputs can be reused.
    ///
    /// A task can be skipped only if it is skippable, has outputs, all of
    /// them are valid, and no input was edited after the oldest output.
    pub fn needs_to_run(task: &Task) -> bool {
        if !task.is_skippable() || task.outputs().is_empty() {
            return true;
        }
        if !task.outputs().iter().all(|dn| dn.is_valid()) {
            return true;
        }
        if task.inputs().is_empty() {
            return false;
        }

        let latest_input = task
            .inputs()
            .iter()
            .filter_map(|dn| dn.last_edit_date())
            .max();
        let oldest_output = task
            .outputs()
            .iter()
            .filter_map(|dn| dn.last_edit_date())
            .min();

        match (latest_input, oldest_output) {
            (Some(input), Some(output)) => input > output,
            (None, _) => false,
            (Some(_), None) => true,
        }
    }

    /// Apply the terminal status of an execution and persist it.
    pub fn update_job_status(&self, job: &Job, outcome: Result<(), TaskError>) {
        match outcome {
            Ok(()) => {
                for output in job.task().outputs() {
                    output.track_edit(job.id());
                }
                release_output_locks(job);
                if job.completed() {
                    info!(job = %job.id(), task = %job.task().id(), "job completed");
                }
            }
            Err(err) => {
                error!(
                    job = %job.id(),
                    task = %job.task().id(),
                    error = %err,
                    "job failed"
                );
                // Failing first lets the failure cascade abandon downstream
                // jobs before they can observe the released locks.
                job.failed(err.to_string());
                release_output_locks(job);
            }
        }
        self.persist(job);
    }

    /// Reuse the cached outputs of `job` instead of running it.
    pub fn skip(&self, job: &Job) {
        release_output_locks(job);
        if job.skipped() {
            info!(job = %job.id(), task = %job.task().id(), "job skipped: outputs are up to date");
        }
        self.persist(job);
    }

    pub fn persist(&self, job: &Job) {
        if let Err(err) = self.repository.set(job) {
            warn!(job = %job.id(), error = %err, "failed to persist job state");
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_loop_thread(&self, handle: JoinHandle<()>) {
        *self.loop_thread.lock() = Some(handle);
    }

    pub fn is_loop_running(&self) -> bool {
        !self.is_stop_requested()
            && self
                .loop_thread
                .lock()
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// Ask the dispatch loop to exit and join it.
    pub(crate) fn stop_loop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);

        let Some(handle) = self.loop_thread.lock().take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            // Stopped from a callback running on the loop itself; it exits
            // on its next iteration.
            debug!("stop requested from the dispatch loop thread; not joining");
            return;
        }

        if handle.join().is_err() {
            warn!("dispatch loop thread panicked");
        }
    }
}

/// Release the write lock on every output of `job`.
pub fn release_output_locks(job: &Job) {
    for output in job.task().outputs() {
        output.unlock_edit();
    }
}
