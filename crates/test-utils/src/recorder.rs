use std::sync::Arc;

use parking_lot::Mutex;

use jobflow::job::{Job, JobCallback, JobId, Status};

/// One observed status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub job_id: JobId,
    pub task_id: String,
    pub status: Status,
}

/// Collects every status transition of the jobs it is registered on.
#[derive(Clone, Default)]
pub struct Recorder {
    transitions: Arc<Mutex<Vec<Transition>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> JobCallback {
        let transitions = Arc::clone(&self.transitions);
        Arc::new(move |job: &Job| {
            transitions.lock().push(Transition {
                job_id: job.id().clone(),
                task_id: job.task().id().to_string(),
                status: job.status(),
            });
        })
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions.lock().clone()
    }

    /// Statuses `job_id` went through, in order.
    pub fn statuses_of(&self, job_id: &JobId) -> Vec<Status> {
        self.transitions
            .lock()
            .iter()
            .filter(|t| &t.job_id == job_id)
            .map(|t| t.status)
            .collect()
    }

    /// Task ids in the order their jobs reached `status`.
    pub fn tasks_reaching(&self, status: Status) -> Vec<String> {
        self.transitions
            .lock()
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.task_id.clone())
            .collect()
    }
}
