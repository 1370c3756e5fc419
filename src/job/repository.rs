// src/job/repository.rs

//! Persistence seam for jobs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::job::{Job, JobCallback, JobId, Status, SubmitId};
use crate::task::Task;

/// Creates jobs and persists their state.
///
/// The orchestrator asks the repository to materialise every job it submits,
/// and the dispatcher calls [`JobRepository::set`] after each terminal
/// transition.
pub trait JobRepository: Send + Sync {
    fn create(
        &self,
        task: Arc<Task>,
        callbacks: Vec<JobCallback>,
        submit_id: SubmitId,
        submit_entity_id: String,
        force: bool,
    ) -> Arc<Job>;

    /// Persist the current state of `job`.
    fn set(&self, job: &Job) -> Result<()>;

    fn get(&self, id: &JobId) -> Option<Arc<Job>>;

    fn all(&self) -> Vec<Arc<Job>>;
}

/// Serialisable view of a job as last persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub task_id: String,
    pub submit_id: SubmitId,
    pub submit_entity_id: String,
    pub status: Status,
    pub force: bool,
    pub creation_date: DateTime<Utc>,
    pub stacktrace: Vec<String>,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id().clone(),
            task_id: job.task().id().to_string(),
            submit_id: job.submit_id().clone(),
            submit_entity_id: job.submit_entity_id().to_string(),
            status: job.status(),
            force: job.force(),
            creation_date: job.creation_date(),
            stacktrace: job.stacktrace(),
        }
    }
}

#[derive(Default)]
struct Entries {
    /// Insertion order, so `all()` returns jobs in creation order.
    order: Vec<JobId>,
    jobs: HashMap<JobId, Arc<Job>>,
    snapshots: HashMap<JobId, JobSnapshot>,
}

/// Keeps jobs in memory for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryJobRepository {
    entries: Mutex<Entries>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last persisted state of a job, if it was ever `set`.
    pub fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        self.entries.lock().snapshots.get(id).cloned()
    }
}

impl JobRepository for InMemoryJobRepository {
    fn create(
        &self,
        task: Arc<Task>,
        callbacks: Vec<JobCallback>,
        submit_id: SubmitId,
        submit_entity_id: String,
        force: bool,
    ) -> Arc<Job> {
        let id = JobId::generate(task.id().as_str());
        let job = Arc::new(Job::new(
            id.clone(),
            task,
            submit_id,
            submit_entity_id,
            force,
            callbacks,
        ));

        let mut entries = self.entries.lock();
        entries.snapshots.insert(id.clone(), JobSnapshot::from(job.as_ref()));
        entries.order.push(id.clone());
        entries.jobs.insert(id, Arc::clone(&job));
        job
    }

    fn set(&self, job: &Job) -> Result<()> {
        let snapshot = JobSnapshot::from(job);
        self.entries
            .lock()
            .snapshots
            .insert(job.id().clone(), snapshot);
        Ok(())
    }

    fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.entries.lock().jobs.get(id).cloned()
    }

    fn all(&self) -> Vec<Arc<Job>> {
        let entries = self.entries.lock();
        entries
            .order
            .iter()
            .filter_map(|id| entries.jobs.get(id).cloned())
            .collect()
    }
}
