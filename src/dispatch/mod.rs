// src/dispatch/mod.rs

//! Job dispatching.
//!
//! The orchestrator decides *whether* a job may run; a [`Dispatcher`]
//! decides *how*. Every backend shares a [`DispatcherCore`] (worker slots,
//! in-flight registry, skip logic, status updates) and implements a single
//! execution primitive, [`Dispatcher::dispatch`].
//!
//! - [`queue`] holds the run queue and the orchestration lock.
//! - [`shared`] holds the worker/status bookkeeping common to all backends.
//! - [`development`] runs jobs inline on the submitting thread.
//! - [`standalone`] runs jobs on a bounded worker pool fed by a background
//!   dispatch loop.
//! - [`factory`] selects a backend from the execution mode and lets
//!   embedders plug in their own.

pub mod development;
pub mod factory;
pub mod queue;
pub mod shared;
pub mod standalone;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::Result;
use crate::job::{Job, JobId};

pub use development::DevelopmentDispatcher;
pub use factory::{DispatcherContext, DispatcherFactory, build_dispatcher};
pub use queue::{JobQueues, RunQueue};
pub use shared::{DispatcherCore, ExecutionHandle, release_output_locks};
pub use standalone::StandaloneDispatcher;

/// How long the dispatch loop waits on an empty queue, or sleeps when no
/// worker is free, before checking the stop flag again.
pub const DISPATCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A backend executing runnable jobs.
pub trait Dispatcher: Send + Sync + 'static {
    fn core(&self) -> &DispatcherCore;

    /// Hand a `Running` job to the backend.
    ///
    /// Implementations must eventually call
    /// [`DispatcherCore::update_job_status`] exactly once for the job.
    fn dispatch(&self, job: Arc<Job>);

    /// Start processing the run queue. With `force_restart`, tear down and
    /// recreate any worker resources first.
    fn start(self: Arc<Self>, force_restart: bool) -> Result<()>;

    /// Stop processing. With `wait`, give in-flight jobs up to `timeout` to
    /// finish first.
    fn stop(&self, wait: bool, timeout: Option<Duration>);

    fn is_running(&self) -> bool;

    /// Drain the run queue on the calling thread. Only synchronous backends
    /// do anything here.
    fn run_all_pending(&self) {}

    /// Whether jobs run on the submitting thread.
    fn is_synchronous(&self) -> bool {
        false
    }

    fn is_dispatched(&self, id: &JobId) -> bool {
        self.core().is_dispatched(id)
    }

    /// Run `job` or skip it when its cached outputs are up to date.
    fn execute_job(&self, job: Arc<Job>) {
        if !job.is_pending() {
            info!(
                job = %job.id(),
                status = %job.status(),
                "job is no longer pending; not executing it"
            );
            return;
        }

        if job.force() {
            info!(job = %job.id(), task = %job.task().id(), "job is forced to run");
        } else if !DispatcherCore::needs_to_run(job.task()) {
            self.core().skip(&job);
            return;
        }

        if job.running() {
            self.dispatch(job);
        } else {
            debug!(job = %job.id(), "job changed state before it could start");
        }
    }
}

/// Start the background dispatch loop for `dispatcher` on its own thread.
pub(crate) fn spawn_dispatch_loop(dispatcher: Arc<dyn Dispatcher>) -> Result<()> {
    let looped = Arc::clone(&dispatcher);
    let handle = thread::Builder::new()
        .name("jobflow-dispatcher".to_string())
        .spawn(move || run_dispatch_loop(looped))?;

    dispatcher.core().set_loop_thread(handle);
    Ok(())
}

fn run_dispatch_loop(dispatcher: Arc<dyn Dispatcher>) {
    let core = dispatcher.core();
    info!(workers = core.nb_of_workers(), "dispatch loop started");

    while !core.is_stop_requested() {
        if core.can_execute() {
            if let Some(job) = core.queues().run_queue().pop_timeout(DISPATCH_POLL_INTERVAL) {
                dispatcher.execute_job(job);
            }
        } else {
            thread::sleep(DISPATCH_POLL_INTERVAL);
        }
    }

    info!("dispatch loop stopped");
}
