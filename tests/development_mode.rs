// tests/development_mode.rs

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use jobflow::config::JobConfig;
use jobflow::dag::TaskGraph;
use jobflow::data::DataNode;
use jobflow::job::{InMemoryJobRepository, JobRepository, Status};
use jobflow::orchestrator::{Orchestrator, SubmitOptions};
use jobflow::submission::SubmissionStatus;
use jobflow_test_utils::{Recorder, TaskBuilder, init_tracing, node, source};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn second_submission_of_up_to_date_task_is_skipped() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    let runs = Arc::new(AtomicUsize::new(0));

    let raw = source("raw");
    let intermediate = node("intermediate");
    let first = TaskBuilder::new("first")
        .input(&raw)
        .output(&intermediate)
        .skippable(true)
        .count_runs(&runs)
        .build();

    let job1 = orchestrator.submit_task(Arc::clone(&first), SubmitOptions::new());
    assert_eq!(job1.status(), Status::Completed);
    assert!(intermediate.is_ready_for_reading());

    let job2 = orchestrator.submit_task(first, SubmitOptions::new());
    assert_eq!(job2.status(), Status::Skipped);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(
        intermediate.is_ready_for_reading(),
        "skipping releases the output lock"
    );
    Ok(())
}

#[test]
fn force_runs_an_up_to_date_task() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    let runs = Arc::new(AtomicUsize::new(0));

    let raw = source("raw");
    let intermediate = node("intermediate");
    let first = TaskBuilder::new("first")
        .input(&raw)
        .output(&intermediate)
        .skippable(true)
        .count_runs(&runs)
        .build();

    orchestrator.submit_task(Arc::clone(&first), SubmitOptions::new());
    let forced = orchestrator.submit_task(first, SubmitOptions::new().force(true));

    assert_eq!(forced.status(), Status::Completed);
    assert!(forced.force());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn chain_runs_in_dependency_order_on_the_caller_thread() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    let order = Arc::new(Mutex::new(Vec::new()));

    let raw = source("raw");
    let clean = node("clean");
    let report = node("report");
    let summary = node("summary");

    // Deliberately listed out of order.
    let tasks = vec![
        TaskBuilder::new("summarize")
            .input(&report)
            .output(&summary)
            .record_order(&order)
            .build(),
        TaskBuilder::new("report")
            .input(&clean)
            .output(&report)
            .record_order(&order)
            .build(),
        TaskBuilder::new("clean")
            .input(&raw)
            .output(&clean)
            .record_order(&order)
            .build(),
    ];
    let graph = TaskGraph::from_tasks("pipeline", tasks)?;

    let jobs = orchestrator.submit(&graph, SubmitOptions::new());

    assert_eq!(*order.lock(), vec!["clean", "report", "summarize"]);
    assert!(jobs.iter().all(|j| j.status() == Status::Completed));
    assert!(orchestrator.blocked_jobs().is_empty());
    assert!(orchestrator.pending_job_ids().is_empty());

    let submit_id = jobs[0].submit_id().clone();
    assert!(jobs.iter().all(|j| j.submit_id() == &submit_id));
    assert!(jobs.iter().all(|j| j.submit_entity_id() == "pipeline"));
    assert_eq!(
        orchestrator.submission_status(&submit_id),
        SubmissionStatus::Completed
    );
    Ok(())
}

#[test]
fn downstream_job_is_blocked_then_pending_then_completed() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    let recorder = Recorder::new();

    let raw = source("raw");
    let mid = node("mid");
    let out = node("out");
    let graph = TaskGraph::from_tasks(
        "p",
        vec![
            TaskBuilder::new("t1").input(&raw).output(&mid).build(),
            TaskBuilder::new("t2").input(&mid).output(&out).build(),
        ],
    )?;

    let jobs = orchestrator.submit(&graph, SubmitOptions::new().callback(recorder.callback()));
    let t2 = jobs.iter().find(|j| j.task().id().as_str() == "t2").unwrap();

    assert_eq!(
        recorder.statuses_of(t2.id()),
        vec![
            Status::Blocked,
            Status::Pending,
            Status::Running,
            Status::Completed
        ]
    );
    Ok(())
}

#[test]
fn failure_abandons_downstream_jobs() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    let runs = Arc::new(AtomicUsize::new(0));

    let raw = source("raw");
    let mid = node("mid");
    let out = node("out");
    let side = node("side");
    let graph = TaskGraph::from_tasks(
        "p",
        vec![
            TaskBuilder::new("extract")
                .input(&raw)
                .output(&mid)
                .fails("source unreachable")
                .build(),
            TaskBuilder::new("transform")
                .input(&mid)
                .output(&out)
                .count_runs(&runs)
                .build(),
            TaskBuilder::new("independent")
                .input(&raw)
                .output(&side)
                .build(),
        ],
    )?;

    let jobs = orchestrator.submit(&graph, SubmitOptions::new());
    let status_of = |name: &str| {
        jobs.iter()
            .find(|j| j.task().id().as_str() == name)
            .map(|j| j.status())
    };

    assert_eq!(status_of("extract"), Some(Status::Failed));
    assert_eq!(status_of("transform"), Some(Status::Abandoned));
    assert_eq!(status_of("independent"), Some(Status::Completed));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let failed = jobs.iter().find(|j| j.is_failed()).unwrap();
    assert!(failed.stacktrace()[0].contains("source unreachable"));
    assert_eq!(
        SubmissionStatus::from_jobs(&jobs),
        SubmissionStatus::Failed
    );
    Ok(())
}

#[test]
fn panicking_task_fails_its_job() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;

    let out = node("out");
    let task = TaskBuilder::new("boom").output(&out).panics("kaboom").build();
    let job = orchestrator.submit_task(task, SubmitOptions::new());

    assert_eq!(job.status(), Status::Failed);
    assert!(job.stacktrace()[0].contains("kaboom"));
    assert!(!out.is_ready_for_reading());
    Ok(())
}

#[test]
fn terminal_states_are_persisted() -> TestResult {
    init_tracing();
    let repository = Arc::new(InMemoryJobRepository::new());
    let orchestrator = Orchestrator::builder(JobConfig::development())
        .repository(Arc::clone(&repository) as Arc<dyn JobRepository>)
        .build()?;

    let out = node("out");
    let task = TaskBuilder::new("t").output(&out).build();
    let job = orchestrator.submit_task(task, SubmitOptions::new().submit_entity_id("scenario-1"));

    let snapshot = repository.snapshot(job.id()).unwrap();
    assert_eq!(snapshot.status, Status::Completed);
    assert_eq!(snapshot.submit_entity_id, "scenario-1");
    assert_eq!(snapshot.task_id, "t");
    assert_eq!(orchestrator.jobs().len(), 1);
    assert!(orchestrator.job(job.id()).is_some());
    Ok(())
}

#[test]
fn development_dispatcher_is_always_running() -> TestResult {
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    assert!(orchestrator.is_running());
    orchestrator.start()?;
    orchestrator.stop(true, None);
    assert!(orchestrator.is_running());
    assert!(orchestrator.dispatcher().is_synchronous());
    Ok(())
}

#[test]
fn huge_validity_period_skips_instead_of_panicking() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    let archive = Arc::new(
        jobflow::data::InMemoryDataNode::with_value("archive", serde_json::json!(1))
            .with_validity_period(chrono::Duration::seconds(9_000_000_000_000)),
    );
    let task = TaskBuilder::new("archive").output(&archive).skippable(true).build();

    let job = orchestrator.submit_task(task, SubmitOptions::new());

    assert_eq!(job.status(), Status::Skipped);
    assert!(archive.is_ready_for_reading());
    Ok(())
}

#[test]
fn caller_supplied_waves_are_submitted_in_order() -> TestResult {
    init_tracing();
    let orchestrator = Orchestrator::new(JobConfig::development())?;
    let order = Arc::new(Mutex::new(Vec::new()));
    let raw = source("raw");
    let mid = node("mid");

    let graph = TaskGraph::from_waves(
        "waves",
        vec![
            vec![TaskBuilder::new("produce").input(&raw).output(&mid).record_order(&order).build()],
            vec![TaskBuilder::new("consume").input(&mid).record_order(&order).build()],
        ],
    );
    let jobs = orchestrator.submit(&graph, SubmitOptions::new());

    assert_eq!(*order.lock(), vec!["produce", "consume"]);
    assert!(jobs.iter().all(|j| j.status() == Status::Completed));
    assert!(jobs.iter().all(|j| j.submit_entity_id() == "waves"));
    Ok(())
}
