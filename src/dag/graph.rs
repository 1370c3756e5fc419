// src/dag/graph.rs

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{JobflowError, Result};
use crate::task::Task;

/// A submittable set of tasks, partitioned into sequential waves.
///
/// Tasks in the same wave have no dependency on each other; every task in
/// wave `n` reads at least one data node written by a task in wave `n - 1`
/// (or has no producer at all and sits in wave 0).
#[derive(Debug, Clone)]
pub struct TaskGraph {
    entity_id: String,
    waves: Vec<Vec<Arc<Task>>>,
}

impl TaskGraph {
    /// Link tasks producer -> consumer through shared data node config ids
    /// and layer them into waves.
    ///
    /// Fails with [`JobflowError::DagCycle`] if a task (transitively)
    /// consumes its own output.
    pub fn from_tasks(entity_id: impl Into<String>, tasks: Vec<Arc<Task>>) -> Result<Self> {
        let graph = dependency_graph(&tasks);

        let order = toposort(&graph, None).map_err(|cycle| {
            let task = &tasks[cycle.node_id()];
            JobflowError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                task.id()
            ))
        })?;

        let mut wave_of = vec![0usize; tasks.len()];
        for node in order {
            wave_of[node] = graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|pred| wave_of[pred] + 1)
                .max()
                .unwrap_or(0);
        }

        let nb_waves = wave_of.iter().copied().max().map_or(0, |w| w + 1);
        let mut waves: Vec<Vec<Arc<Task>>> = vec![Vec::new(); nb_waves];
        for (idx, task) in tasks.into_iter().enumerate() {
            waves[wave_of[idx]].push(task);
        }

        Ok(Self {
            entity_id: entity_id.into(),
            waves,
        })
    }

    /// Use waves computed by the caller as-is.
    pub fn from_waves(entity_id: impl Into<String>, waves: Vec<Vec<Arc<Task>>>) -> Self {
        Self {
            entity_id: entity_id.into(),
            waves,
        }
    }

    /// A graph made of a single task, owned by that task.
    pub fn single(task: Arc<Task>) -> Self {
        Self {
            entity_id: task.id().to_string(),
            waves: vec![vec![task]],
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn waves(&self) -> &[Vec<Arc<Task>>] {
        &self.waves
    }

    /// All tasks, wave by wave.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.waves.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Graph over task indices with an edge from each producer of a data node
/// to each task reading it.
fn dependency_graph(tasks: &[Arc<Task>]) -> DiGraphMap<usize, ()> {
    let mut producers: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, task) in tasks.iter().enumerate() {
        for output in task.outputs() {
            producers.entry(output.config_id()).or_default().push(idx);
        }
    }

    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for idx in 0..tasks.len() {
        graph.add_node(idx);
    }
    for (idx, task) in tasks.iter().enumerate() {
        for input in task.inputs() {
            for &producer in producers.get(input.config_id()).into_iter().flatten() {
                graph.add_edge(producer, idx, ());
            }
        }
    }
    graph
}
