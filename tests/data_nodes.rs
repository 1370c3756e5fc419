// tests/data_nodes.rs

use std::fs;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::tempdir;

use jobflow::data::{DataNode, FileDataNode, InMemoryDataNode};
use jobflow::dispatch::DispatcherCore;
use jobflow::job::JobId;
use jobflow_test_utils::{TaskBuilder, node, source};

#[test]
fn unwritten_node_is_neither_valid_nor_ready() {
    let dn = InMemoryDataNode::new("empty");
    assert!(!dn.is_valid());
    assert!(!dn.is_ready_for_reading());
    assert!(dn.last_edit_date().is_none());
}

#[test]
fn edit_lock_hides_node_from_readers() {
    let dn = InMemoryDataNode::with_value("raw", json!([1, 2, 3]));
    assert!(dn.is_ready_for_reading());

    dn.lock_edit();
    assert!(!dn.is_ready_for_reading());
    assert!(dn.is_valid(), "locking does not invalidate cached content");

    dn.unlock_edit();
    assert!(dn.is_ready_for_reading());
}

#[test]
fn tracked_edits_record_the_writing_job() {
    let dn = InMemoryDataNode::new("out");
    let job_id = JobId::from("JOB_t_1");

    dn.track_edit(&job_id);

    let edits = dn.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].job_id.as_ref(), Some(&job_id));
    assert!(dn.is_valid());
    assert!(dn.is_ready_for_reading());
}

#[test]
fn validity_period_expires_old_content() {
    let dn = InMemoryDataNode::new("cache").with_validity_period(Duration::minutes(5));
    dn.write_at(json!("stale"), Utc::now() - Duration::hours(1));
    assert!(!dn.is_valid());

    dn.write(json!("fresh"));
    assert!(dn.is_valid());
    assert_eq!(dn.read(), Some(json!("fresh")));
}

#[test]
fn validity_period_past_the_calendar_never_expires() {
    let dn = InMemoryDataNode::with_value("archive", json!(1))
        .with_validity_period(Duration::seconds(9_000_000_000_000));
    assert!(dn.is_valid());

    let task = TaskBuilder::new("t")
        .output(&Arc::new(dn))
        .skippable(true)
        .build();
    assert!(!DispatcherCore::needs_to_run(&task));
}

#[test]
fn file_node_follows_the_file_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let dn = FileDataNode::new("data", &path);

    assert!(!dn.is_valid());
    assert!(!dn.is_ready_for_reading());

    fs::write(&path, "a,b\n1,2\n").unwrap();
    assert!(dn.is_valid());
    assert!(dn.is_ready_for_reading());
    assert!(dn.last_edit_date().is_some());

    dn.lock_edit();
    assert!(!dn.is_ready_for_reading());
    dn.unlock_edit();

    fs::remove_file(&path).unwrap();
    assert!(!dn.is_valid());
}

#[test]
fn task_without_outputs_always_runs() {
    let input = source("in");
    let task = TaskBuilder::new("t").input(&input).skippable(true).build();
    assert!(DispatcherCore::needs_to_run(&task));
}

#[test]
fn non_skippable_task_always_runs() {
    let out = source("out");
    let task = TaskBuilder::new("t").output(&out).build();
    assert!(DispatcherCore::needs_to_run(&task));
}

#[test]
fn invalid_output_forces_a_run() {
    let out = node("out");
    let task = TaskBuilder::new("t").output(&out).skippable(true).build();
    assert!(DispatcherCore::needs_to_run(&task));
}

#[test]
fn valid_outputs_without_inputs_never_run() {
    let out = source("out");
    let task = TaskBuilder::new("t").output(&out).skippable(true).build();
    assert!(!DispatcherCore::needs_to_run(&task));
}

#[test]
fn input_newer_than_output_triggers_a_run() {
    let input = Arc::new(InMemoryDataNode::new("in"));
    let out = Arc::new(InMemoryDataNode::new("out"));
    let now = Utc::now();

    out.write_at(json!(1), now - Duration::minutes(10));
    input.write_at(json!(1), now - Duration::minutes(20));

    let task = TaskBuilder::new("t")
        .input(&input)
        .output(&out)
        .skippable(true)
        .build();
    assert!(!DispatcherCore::needs_to_run(&task));

    input.write_at(json!(2), now - Duration::minutes(5));
    assert!(DispatcherCore::needs_to_run(&task));
}

#[test]
fn oldest_output_is_compared_against_newest_input() {
    let input = Arc::new(InMemoryDataNode::new("in"));
    let fresh = Arc::new(InMemoryDataNode::new("fresh"));
    let old = Arc::new(InMemoryDataNode::new("old"));
    let now = Utc::now();

    input.write_at(json!(1), now - Duration::minutes(10));
    fresh.write_at(json!(1), now - Duration::minutes(1));
    old.write_at(json!(1), now - Duration::minutes(30));

    let task = TaskBuilder::new("t")
        .input(&input)
        .output(&fresh)
        .output(&old)
        .skippable(true)
        .build();
    assert!(DispatcherCore::needs_to_run(&task));
}
