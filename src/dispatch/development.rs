// src/dispatch/development.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::dispatch::{Dispatcher, DispatcherCore, JobQueues};
use crate::errors::Result;
use crate::job::{Job, JobRepository};

/// Synchronous backend: jobs run one at a time on the thread that drains the
/// queue, which is the submitting thread.
///
/// There is no background loop and no notion of a busy worker; the single
/// worker slot is never taken.
pub struct DevelopmentDispatcher {
    core: DispatcherCore,
}

impl DevelopmentDispatcher {
    pub fn new(queues: Arc<JobQueues>, repository: Arc<dyn JobRepository>) -> Self {
        Self {
            core: DispatcherCore::new(queues, repository, 1),
        }
    }
}

impl Dispatcher for DevelopmentDispatcher {
    fn core(&self) -> &DispatcherCore {
        &self.core
    }

    fn dispatch(&self, job: Arc<Job>) {
        debug!(job = %job.id(), task = %job.task().id(), "executing job inline");
        let outcome = job.task().execute(job.id());
        self.core.update_job_status(&job, outcome);
    }

    fn start(self: Arc<Self>, _force_restart: bool) -> Result<()> {
        Ok(())
    }

    fn stop(&self, _wait: bool, _timeout: Option<Duration>) {}

    fn is_running(&self) -> bool {
        true
    }

    fn run_all_pending(&self) {
        let queues = self.core.queues();
        loop {
            let next = {
                let _guard = queues.lock();
                queues.run_queue().try_pop()
            };
            match next {
                Some(job) => self.execute_job(job),
                None => break,
            }
        }
    }

    fn is_synchronous(&self) -> bool {
        true
    }
}
