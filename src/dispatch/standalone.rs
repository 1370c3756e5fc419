// src/dispatch/standalone.rs

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, DispatcherCore, JobQueues, spawn_dispatch_loop};
use crate::errors::{JobflowError, Result, TaskError};
use crate::job::{Job, JobRepository};

/// Bounded worker-pool backend.
///
/// A background loop pops runnable jobs while a worker slot is free and
/// hands them to a dedicated multi-thread Tokio runtime, where each task
/// function runs on a blocking thread. At most `max_nb_of_workers` jobs are
/// ever in flight.
pub struct StandaloneDispatcher {
    core: Arc<DispatcherCore>,
    pool: Mutex<Option<Runtime>>,
}

impl StandaloneDispatcher {
    pub fn new(
        queues: Arc<JobQueues>,
        repository: Arc<dyn JobRepository>,
        max_nb_of_workers: usize,
    ) -> Self {
        Self {
            core: Arc::new(DispatcherCore::new(queues, repository, max_nb_of_workers)),
            pool: Mutex::new(None),
        }
    }

    fn build_pool(&self) -> Result<Runtime> {
        let workers = self.core.nb_of_workers();
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("jobflow-worker")
            .enable_all()
            .build()?;
        debug!(workers, "worker pool created");
        Ok(runtime)
    }

    fn shutdown_pool(&self) {
        if let Some(pool) = self.pool.lock().take() {
            // Dropping a runtime blocks, which is not allowed from inside a
            // runtime; background shutdown is safe everywhere.
            pool.shutdown_background();
            debug!("worker pool shut down");
        }
    }
}

impl Dispatcher for StandaloneDispatcher {
    fn core(&self) -> &DispatcherCore {
        &self.core
    }

    fn dispatch(&self, job: Arc<Job>) {
        let pool = self.pool.lock();
        let Some(runtime) = pool.as_ref() else {
            warn!(job = %job.id(), "worker pool is not running; failing job");
            self.core.update_job_status(
                &job,
                Err(TaskError::Panicked("worker pool is not running".to_string())),
            );
            return;
        };

        if !self.core.acquire_worker() {
            // The loop only dispatches when a slot is free.
            warn!(job = %job.id(), "dispatching without a free worker slot");
        }

        let mut in_flight = self.core.in_flight();
        let core = Arc::clone(&self.core);
        let running = Arc::clone(&job);

        let handle = runtime.spawn(async move {
            let worker_job = Arc::clone(&running);
            let outcome = tokio::task::spawn_blocking(move || {
                worker_job.task().execute(worker_job.id())
            })
            .await
            .unwrap_or_else(|join_err| Err(TaskError::Panicked(join_err.to_string())));

            core.unregister(running.id());
            core.update_job_status(&running, outcome);
            core.release_worker();
        });

        debug!(job = %job.id(), task = %job.task().id(), "job handed to worker pool");
        in_flight.insert(job.id().clone(), handle);
    }

    fn start(self: Arc<Self>, force_restart: bool) -> Result<()> {
        if self.is_running() {
            if !force_restart {
                debug!("standalone dispatcher already running");
                return Ok(());
            }
            info!("restarting standalone dispatcher");
            self.core.stop_loop();
        }

        {
            let mut pool = self.pool.lock();
            if force_restart || pool.is_none() {
                if let Some(old) = pool.take() {
                    old.shutdown_background();
                }
                *pool = Some(self.build_pool()?);
                self.core.clear_in_flight();
                self.core.reset_workers();
            }
        }

        self.core.clear_stop();
        let workers = self.core.nb_of_workers();
        spawn_dispatch_loop(self)
            .map_err(|e| JobflowError::Dispatcher(format!("starting dispatch loop: {e}")))?;
        info!(workers, "standalone dispatcher started");
        Ok(())
    }

    fn stop(&self, wait: bool, timeout: Option<Duration>) {
        self.core.stop_loop();

        if wait && !self.core.wait_for_in_flight(timeout) {
            warn!(
                in_flight = self.core.dispatched_ids().len(),
                "jobs still running when the worker pool was shut down"
            );
        }

        self.shutdown_pool();
        info!("standalone dispatcher stopped");
    }

    fn is_running(&self) -> bool {
        self.core.is_loop_running()
    }
}
