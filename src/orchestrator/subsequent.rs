// src/orchestrator/subsequent.rs

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::job::{Job, JobId, SubmitId};

/// Blocked jobs of `submit_id` that transitively read any of `output_ids`.
///
/// Breadth-first over an index from input data node id to the blocked jobs
/// reading it: every job found contributes its own outputs to the next
/// layer, and the search ends once no new data node id shows up. Jobs that
/// are not `Blocked` (queued, running, finished) are never returned.
///
/// The result is in discovery order and contains no duplicates.
pub fn find_subsequent_jobs<I, S>(
    blocked: &[Arc<Job>],
    submit_id: &SubmitId,
    output_ids: I,
) -> Vec<Arc<Job>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut readers: HashMap<&str, Vec<&Arc<Job>>> = HashMap::new();
    for job in blocked
        .iter()
        .filter(|job| job.submit_id() == submit_id && job.is_blocked())
    {
        for input in job.task().inputs() {
            readers.entry(input.config_id()).or_default().push(job);
        }
    }

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<String> = VecDeque::new();
    for id in output_ids {
        let id = id.into();
        if seen_ids.insert(id.clone()) {
            frontier.push_back(id);
        }
    }

    let mut found: HashSet<JobId> = HashSet::new();
    let mut subsequent = Vec::new();

    while let Some(data_node_id) = frontier.pop_front() {
        let Some(jobs) = readers.get(data_node_id.as_str()) else {
            continue;
        };

        for &job in jobs {
            if !found.insert(job.id().clone()) {
                continue;
            }
            subsequent.push(Arc::clone(job));

            for output in job.task().outputs() {
                if seen_ids.insert(output.config_id().to_string()) {
                    frontier.push_back(output.config_id().to_string());
                }
            }
        }
    }

    subsequent
}
