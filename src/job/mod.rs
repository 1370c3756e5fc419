// src/job/mod.rs

//! Jobs: one execution attempt of one task within one submission.
//!
//! - [`status`] holds the [`Status`] state machine.
//! - [`repository`] is the persistence seam ([`JobRepository`]) plus an
//!   in-memory implementation.
//!
//! A [`Job`] is shared as `Arc<Job>` between the orchestrator's queues, the
//! dispatcher and callers. Its identity and task are immutable; only the
//! status and stack trace change, always through the transition methods so
//! that the registered callbacks observe every change.

pub mod repository;
pub mod status;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::task::Task;

pub use repository::{InMemoryJobRepository, JobRepository, JobSnapshot};
pub use status::Status;

/// Callback invoked synchronously on every status transition of a job.
pub type JobCallback = Arc<dyn Fn(&Job) + Send + Sync>;

/// Unique identifier of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id for a job running `task_id`.
    pub fn generate(task_id: &str) -> Self {
        JobId(format!("JOB_{}_{}", task_id, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Correlation key shared by every job produced by one submit call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmitId(String);

impl SubmitId {
    pub fn generate() -> Self {
        SubmitId(format!("SUBMISSION_{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubmitId {
    fn from(s: &str) -> Self {
        SubmitId(s.to_string())
    }
}

impl fmt::Display for SubmitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

pub struct Job {
    id: JobId,
    task: Arc<Task>,
    submit_id: SubmitId,
    submit_entity_id: String,
    force: bool,
    creation_date: DateTime<Utc>,
    status: Mutex<Status>,
    stacktrace: Mutex<Vec<String>>,
    callbacks: Vec<JobCallback>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("task", &self.task.id())
            .field("submit_id", &self.submit_id)
            .field("submit_entity_id", &self.submit_entity_id)
            .field("force", &self.force)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Create a job in the `Submitted` state.
    ///
    /// This is normally called by a [`JobRepository`], which owns identity
    /// assignment.
    pub fn new(
        id: JobId,
        task: Arc<Task>,
        submit_id: SubmitId,
        submit_entity_id: String,
        force: bool,
        callbacks: Vec<JobCallback>,
    ) -> Self {
        Self {
            id,
            task,
            submit_id,
            submit_entity_id,
            force,
            creation_date: Utc::now(),
            status: Mutex::new(Status::Submitted),
            stacktrace: Mutex::new(Vec::new()),
            callbacks,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    pub fn submit_id(&self) -> &SubmitId {
        &self.submit_id
    }

    pub fn submit_entity_id(&self) -> &str {
        &self.submit_entity_id
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub fn status(&self) -> Status {
        *self.status.lock()
    }

    /// Error messages captured from failed executions.
    pub fn stacktrace(&self) -> Vec<String> {
        self.stacktrace.lock().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_blocked(&self) -> bool {
        self.status() == Status::Blocked
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Status::Completed
    }

    pub fn is_skipped(&self) -> bool {
        self.status() == Status::Skipped
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    pub fn is_canceled(&self) -> bool {
        self.status() == Status::Canceled
    }

    pub fn is_abandoned(&self) -> bool {
        self.status() == Status::Abandoned
    }

    pub fn blocked(&self) -> bool {
        self.transition(Status::Blocked)
    }

    pub fn pending(&self) -> bool {
        self.transition(Status::Pending)
    }

    pub fn running(&self) -> bool {
        self.transition(Status::Running)
    }

    pub fn completed(&self) -> bool {
        self.transition(Status::Completed)
    }

    pub fn skipped(&self) -> bool {
        self.transition(Status::Skipped)
    }

    pub fn canceled(&self) -> bool {
        self.transition(Status::Canceled)
    }

    pub fn abandoned(&self) -> bool {
        self.transition(Status::Abandoned)
    }

    /// Mark the job failed, recording `reason` in its stack trace.
    pub fn failed(&self, reason: impl Into<String>) -> bool {
        // Recorded before the transition so callbacks see the reason.
        self.stacktrace.lock().push(reason.into());
        self.transition(Status::Failed)
    }

    /// Move to `next` if the state machine allows it, then run the callbacks.
    ///
    /// Returns `false` (and leaves the job untouched) for an illegal
    /// transition, which is how concurrent cancellation races surface.
    fn transition(&self, next: Status) -> bool {
        {
            let mut status = self.status.lock();
            if !status.can_transition_to(next) {
                debug!(
                    job = %self.id,
                    from = %*status,
                    to = %next,
                    "refusing illegal status transition"
                );
                return false;
            }
            *status = next;
        }

        debug!(job = %self.id, status = %next, "job status changed");

        for callback in &self.callbacks {
            callback(self);
        }
        true
    }
}
