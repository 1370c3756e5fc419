use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use jobflow::config::JobConfig;
use jobflow::dag::TaskGraph;
use jobflow::dispatch::Dispatcher;
use jobflow::job::{Job, Status};
use jobflow::orchestrator::{Orchestrator, SubmitOptions};
use jobflow::task::Task;
use jobflow_test_utils::{TaskBuilder, manual_orchestrator, node, source};

/// Shape of one generated task: the indices of the earlier tasks it reads
/// from, and whether its function fails.
#[derive(Debug, Clone)]
struct TaskShape {
    parents: Vec<usize>,
    fails: bool,
}

// Acyclic by construction: task N only reads outputs of tasks 0..N-1.
fn workflow_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<TaskShape>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            (
                proptest::collection::vec(any::<usize>(), 0..3),
                proptest::bool::weighted(0.25),
            ),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (potential, fails))| {
                    let parents: HashSet<usize> = if i == 0 {
                        HashSet::new()
                    } else {
                        potential.into_iter().map(|p| p % i).collect()
                    };
                    let mut parents: Vec<usize> = parents.into_iter().collect();
                    parents.sort_unstable();
                    TaskShape { parents, fails }
                })
                .collect()
        })
    })
}

fn build_graph(shapes: &[TaskShape]) -> TaskGraph {
    let raw = source("raw");
    let outputs: Vec<_> = (0..shapes.len()).map(|i| node(&format!("out_{i}"))).collect();

    let tasks: Vec<Arc<Task>> = shapes
        .iter()
        .enumerate()
        .map(|(i, shape)| {
            let mut builder = TaskBuilder::new(&format!("task_{i}")).output(&outputs[i]);
            if shape.parents.is_empty() {
                builder = builder.input(&raw);
            }
            for &p in &shape.parents {
                builder = builder.input(&outputs[p]);
            }
            if shape.fails {
                builder = builder.fails("scripted failure");
            }
            builder.build()
        })
        .collect();

    TaskGraph::from_tasks("generated", tasks).unwrap()
}

/// Whether any transitive producer of task `i` fails.
fn has_failing_ancestor(shapes: &[TaskShape], i: usize) -> bool {
    let mut stack: Vec<usize> = shapes[i].parents.clone();
    let mut seen = HashSet::new();
    while let Some(p) = stack.pop() {
        if !seen.insert(p) {
            continue;
        }
        if shapes[p].fails {
            return true;
        }
        stack.extend(shapes[p].parents.iter().copied());
    }
    false
}

fn job_of<'a>(jobs: &'a [Arc<Job>], i: usize) -> &'a Arc<Job> {
    let name = format!("task_{i}");
    jobs.iter()
        .find(|j| j.task().id().as_str() == name)
        .unwrap()
}

fn assert_queues_drained(orchestrator: &Orchestrator) {
    assert!(orchestrator.blocked_jobs().is_empty());
    assert!(orchestrator.pending_job_ids().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn development_mode_reaches_the_expected_terminal_states(shapes in workflow_strategy(8)) {
        let orchestrator = Orchestrator::new(JobConfig::development()).unwrap();
        let jobs = orchestrator.submit(&build_graph(&shapes), SubmitOptions::new());

        for i in 0..shapes.len() {
            let expected = if has_failing_ancestor(&shapes, i) {
                Status::Abandoned
            } else if shapes[i].fails {
                Status::Failed
            } else {
                Status::Completed
            };
            prop_assert_eq!(job_of(&jobs, i).status(), expected, "task_{}", i);
        }
        assert_queues_drained(&orchestrator);
    }

    #[test]
    fn every_job_ends_terminal_after_a_cancel(
        shapes in workflow_strategy(8),
        target in any::<usize>(),
        rounds_before_cancel in 0usize..4,
    ) {
        let (orchestrator, dispatcher) = manual_orchestrator();
        let jobs = orchestrator.submit(&build_graph(&shapes), SubmitOptions::new());
        let target = Arc::clone(&jobs[target % jobs.len()]);

        let mut canceled = false;
        for round in 0..100 {
            if round == rounds_before_cancel {
                orchestrator.cancel_job(&target);
                canceled = true;
            }

            let popped = dispatcher.pump();
            let parked = dispatcher.parked_ids();
            for id in &parked {
                dispatcher.complete(id);
            }

            if canceled && popped == 0 && parked.is_empty() {
                break;
            }
        }

        for job in &jobs {
            prop_assert!(job.is_finished(), "{} left in {}", job.task().id(), job.status());
        }
        prop_assert!(dispatcher.core().dispatched_ids().is_empty());
        assert_queues_drained(&orchestrator);
    }
}
