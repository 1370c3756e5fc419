// src/dispatch/queue.rs

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::job::{Job, JobId};

/// Thread-safe FIFO of jobs that are `Pending` and waiting for a worker.
///
/// The dispatch loop pops with a timeout so it can notice a stop request;
/// the orchestrator pushes and removes jobs while holding the orchestration
/// lock (see [`JobQueues::lock`]).
#[derive(Debug, Default)]
pub struct RunQueue {
    jobs: Mutex<VecDeque<Arc<Job>>>,
    available: Condvar,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: Arc<Job>) {
        debug!(job = %job.id(), "job enqueued for dispatch");
        self.jobs.lock().push_back(job);
        self.available.notify_one();
    }

    /// Pop the oldest job, waiting at most `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Arc<Job>> {
        let deadline = Instant::now() + timeout;
        let mut jobs = self.jobs.lock();

        while jobs.is_empty() {
            if self.available.wait_until(&mut jobs, deadline).timed_out() {
                break;
            }
        }

        jobs.pop_front()
    }

    pub fn try_pop(&self) -> Option<Arc<Job>> {
        self.jobs.lock().pop_front()
    }

    /// Remove a job that has not been dispatched yet.
    ///
    /// Returns `false` if it was not queued (already popped or never pushed).
    pub fn remove(&self, id: &JobId) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.iter().position(|job| job.id() == id) {
            Some(pos) => {
                jobs.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.lock().iter().map(|job| job.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

/// State shared by the orchestrator and its dispatcher.
///
/// The blocked list lives behind the orchestration lock; every mutation of
/// either collection that classifies, unblocks or removes jobs happens while
/// that lock is held. The run queue has its own internal lock so the dispatch
/// loop can pop without taking the orchestration lock.
#[derive(Debug, Default)]
pub struct JobQueues {
    blocked: Mutex<Vec<Arc<Job>>>,
    run_queue: RunQueue,
}

impl JobQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the orchestration lock, yielding the blocked list.
    pub fn lock(&self) -> MutexGuard<'_, Vec<Arc<Job>>> {
        self.blocked.lock()
    }

    pub fn run_queue(&self) -> &RunQueue {
        &self.run_queue
    }
}
