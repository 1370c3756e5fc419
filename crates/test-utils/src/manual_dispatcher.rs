use std::collections::HashMap;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};

use jobflow::config::JobConfig;
use jobflow::dispatch::{Dispatcher, DispatcherContext, DispatcherCore, DispatcherFactory};
use jobflow::errors::{Result, TaskError};
use jobflow::job::{Job, JobId};
use jobflow::orchestrator::Orchestrator;

/// Mode name the manual dispatcher is registered under.
pub const MANUAL_MODE: &str = "manual";

/// A dispatcher driven step by step from the test.
///
/// [`pump`](Self::pump) moves queued jobs to `Running` and parks them in the
/// in-flight registry; [`complete`](Self::complete) and
/// [`fail`](Self::fail) finish them. Nothing happens in the background, so
/// every intermediate state can be asserted on.
pub struct ManualDispatcher {
    core: DispatcherCore,
    runtime: Runtime,
    parked: Mutex<HashMap<JobId, Arc<Job>>>,
}

impl ManualDispatcher {
    pub fn new(ctx: DispatcherContext) -> Result<Self> {
        // Only used to mint in-flight handles; never driven.
        let runtime = Builder::new_current_thread().build()?;
        Ok(Self {
            core: DispatcherCore::new(ctx.queues, ctx.repository, ctx.config.max_nb_of_workers),
            runtime,
            parked: Mutex::new(HashMap::new()),
        })
    }

    /// Factory storing the dispatcher it builds in `slot`.
    pub fn factory(slot: Arc<Mutex<Option<Arc<ManualDispatcher>>>>) -> DispatcherFactory {
        Arc::new(move |ctx: DispatcherContext| -> Result<Arc<dyn Dispatcher>> {
            let dispatcher = Arc::new(ManualDispatcher::new(ctx)?);
            *slot.lock() = Some(Arc::clone(&dispatcher));
            Ok(dispatcher as Arc<dyn Dispatcher>)
        })
    }

    /// Execute every queued job. Returns how many were popped.
    pub fn pump(&self) -> usize {
        let queues = Arc::clone(self.core.queues());
        let mut popped = 0;
        loop {
            let next = {
                let _guard = queues.lock();
                queues.run_queue().try_pop()
            };
            match next {
                Some(job) => {
                    popped += 1;
                    self.execute_job(job);
                }
                None => return popped,
            }
        }
    }

    pub fn parked_ids(&self) -> Vec<JobId> {
        self.parked.lock().keys().cloned().collect()
    }

    pub fn complete(&self, id: &JobId) -> bool {
        self.finish(id, Ok(()))
    }

    pub fn fail(&self, id: &JobId, message: &str) -> bool {
        self.finish(id, Err(TaskError::Failed(message.to_string())))
    }

    /// Finish a parked job with `outcome`. Returns `false` if it was not
    /// parked.
    pub fn finish(&self, id: &JobId, outcome: std::result::Result<(), TaskError>) -> bool {
        let Some(job) = self.parked.lock().remove(id) else {
            return false;
        };
        if let Some(handle) = self.core.unregister(id) {
            handle.abort();
        }
        self.core.update_job_status(&job, outcome);
        true
    }
}

impl Dispatcher for ManualDispatcher {
    fn core(&self) -> &DispatcherCore {
        &self.core
    }

    fn dispatch(&self, job: Arc<Job>) {
        let handle = self.runtime.spawn(future::pending::<()>());
        self.core.in_flight().insert(job.id().clone(), handle);
        self.parked.lock().insert(job.id().clone(), job);
    }

    fn start(self: Arc<Self>, _force_restart: bool) -> Result<()> {
        Ok(())
    }

    fn stop(&self, _wait: bool, _timeout: Option<Duration>) {}

    fn is_running(&self) -> bool {
        true
    }
}

/// An orchestrator backed by a [`ManualDispatcher`], plus the dispatcher.
pub fn manual_orchestrator() -> (Orchestrator, Arc<ManualDispatcher>) {
    let slot = Arc::new(Mutex::new(None));
    let orchestrator = Orchestrator::builder(JobConfig::external(MANUAL_MODE))
        .register_dispatcher(MANUAL_MODE, ManualDispatcher::factory(Arc::clone(&slot)))
        .build()
        .expect("manual dispatcher should build");
    let dispatcher = slot
        .lock()
        .take()
        .expect("factory should have stored the dispatcher");
    (orchestrator, dispatcher)
}
