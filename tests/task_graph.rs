// tests/task_graph.rs

use std::sync::Arc;

use jobflow::dag::TaskGraph;
use jobflow::errors::JobflowError;
use jobflow::task::Task;
use jobflow_test_utils::{TaskBuilder, node, source};

fn wave_names(graph: &TaskGraph) -> Vec<Vec<String>> {
    graph
        .waves()
        .iter()
        .map(|wave| {
            let mut names: Vec<String> = wave.iter().map(|t| t.id().to_string()).collect();
            names.sort();
            names
        })
        .collect()
}

#[test]
fn independent_tasks_share_the_first_wave() {
    let a = node("a");
    let b = node("b");
    let graph = TaskGraph::from_tasks(
        "g",
        vec![
            TaskBuilder::new("x").output(&a).build(),
            TaskBuilder::new("y").output(&b).build(),
        ],
    )
    .unwrap();

    assert_eq!(wave_names(&graph), vec![vec!["x", "y"]]);
    assert_eq!(graph.len(), 2);
}

#[test]
fn wave_is_one_past_the_deepest_producer() {
    let raw = source("raw");
    let a = node("a");
    let b = node("b");
    let c = node("c");
    let d = node("d");

    // a <- raw; b <- a; c <- raw; d <- b + c
    let tasks: Vec<Arc<Task>> = vec![
        TaskBuilder::new("join").input(&b).input(&c).output(&d).build(),
        TaskBuilder::new("first").input(&raw).output(&a).build(),
        TaskBuilder::new("second").input(&a).output(&b).build(),
        TaskBuilder::new("side").input(&raw).output(&c).build(),
    ];
    let graph = TaskGraph::from_tasks("g", tasks).unwrap();

    assert_eq!(
        wave_names(&graph),
        vec![
            vec!["first".to_string(), "side".to_string()],
            vec!["second".to_string()],
            vec!["join".to_string()],
        ]
    );
    assert_eq!(graph.entity_id(), "g");
}

#[test]
fn cycle_is_rejected() {
    let a = node("a");
    let b = node("b");
    let result = TaskGraph::from_tasks(
        "g",
        vec![
            TaskBuilder::new("ping").input(&b).output(&a).build(),
            TaskBuilder::new("pong").input(&a).output(&b).build(),
        ],
    );

    match result {
        Err(JobflowError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("ping") || msg.contains("pong"));
        }
        other => panic!("expected DagCycle, got {other:?}"),
    }
}

#[test]
fn task_reading_its_own_output_is_a_cycle() {
    let a = node("a");
    let result = TaskGraph::from_tasks(
        "g",
        vec![TaskBuilder::new("loop").input(&a).output(&a).build()],
    );
    assert!(matches!(result, Err(JobflowError::DagCycle(_))));
}

#[test]
fn single_task_graph_is_owned_by_the_task() {
    let graph = TaskGraph::single(TaskBuilder::new("solo").output(&node("o")).build());
    assert_eq!(graph.entity_id(), "solo");
    assert_eq!(wave_names(&graph), vec![vec!["solo"]]);
    assert!(!graph.is_empty());
}

#[test]
fn empty_graph_has_no_waves() {
    let graph = TaskGraph::from_tasks("g", Vec::new()).unwrap();
    assert!(graph.is_empty());
    assert!(graph.waves().is_empty());
}

#[test]
fn precomputed_waves_are_kept_as_given() {
    let raw = source("raw");
    let a = node("a");
    let b = node("b");
    let graph = TaskGraph::from_waves(
        "manual",
        vec![
            vec![TaskBuilder::new("first").input(&raw).output(&a).build()],
            vec![TaskBuilder::new("second").input(&a).output(&b).build()],
        ],
    );

    assert_eq!(graph.entity_id(), "manual");
    assert_eq!(wave_names(&graph), vec![vec!["first"], vec!["second"]]);
    let order: Vec<String> = graph.tasks().map(|t| t.id().to_string()).collect();
    assert_eq!(order, vec!["first", "second"]);
}
