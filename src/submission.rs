// src/submission.rs

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::job::{Job, Status};

/// Overall state of a submission, derived from the states of its jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Submitted,
    Undefined,
    Blocked,
    Pending,
    Running,
    Canceled,
    Failed,
    Completed,
}

impl SubmissionStatus {
    /// Failure wins over cancellation, which wins over any job still in
    /// progress. A submission is complete only once every job completed or
    /// was skipped.
    pub fn from_jobs(jobs: &[Arc<Job>]) -> Self {
        if jobs.is_empty() {
            return SubmissionStatus::Undefined;
        }

        let statuses: Vec<Status> = jobs.iter().map(|job| job.status()).collect();
        let any = |wanted: &[Status]| statuses.iter().any(|s| wanted.contains(s));

        if any(&[Status::Failed]) {
            SubmissionStatus::Failed
        } else if any(&[Status::Canceled, Status::Abandoned]) {
            SubmissionStatus::Canceled
        } else if any(&[Status::Running]) {
            SubmissionStatus::Running
        } else if any(&[Status::Pending]) {
            SubmissionStatus::Pending
        } else if any(&[Status::Blocked]) {
            SubmissionStatus::Blocked
        } else if statuses
            .iter()
            .all(|s| matches!(s, Status::Completed | Status::Skipped))
        {
            SubmissionStatus::Completed
        } else {
            SubmissionStatus::Submitted
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Completed | SubmissionStatus::Failed | SubmissionStatus::Canceled
        )
    }

    /// Whether the submission ended without producing all its outputs.
    pub fn is_unsuccessful(self) -> bool {
        matches!(self, SubmissionStatus::Failed | SubmissionStatus::Canceled)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Undefined => "UNDEFINED",
            SubmissionStatus::Blocked => "BLOCKED",
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Running => "RUNNING",
            SubmissionStatus::Canceled => "CANCELED",
            SubmissionStatus::Failed => "FAILED",
            SubmissionStatus::Completed => "COMPLETED",
        };
        f.pad(s)
    }
}
