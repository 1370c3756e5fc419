// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod data;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod submission;
pub mod task;
pub mod types;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::TaskGraph;
use crate::data::FileDataNode;
use crate::errors::JobflowError;
use crate::exec::{CommandSpec, command_task};
use crate::job::{Job, JobSnapshot};
use crate::orchestrator::{Orchestrator, SubmitOptions};
use crate::submission::SubmissionStatus;
use crate::task::Task;

pub use crate::config::JobConfig;
pub use crate::orchestrator::OrchestratorBuilder;
pub use crate::types::ExecutionMode;

/// How long `run` lets in-flight jobs finish when shutting the workers down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// High-level entry point used by `main.rs`.
///
/// Loads the workflow, builds one file data node per `[data_node]` and one
/// shell task per `[task]`, submits them as a single submission and waits
/// for it. Returns the final status of the submission; for `--dry-run`
/// nothing runs and the status is `Undefined`.
pub fn run(args: CliArgs) -> Result<SubmissionStatus> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading workflow '{}'", config_path.display()))?;

    let tasks = build_tasks(&cfg)?;
    let graph = select_graph(&config_path, tasks, args.task.as_deref())?;

    if args.dry_run {
        print_dry_run(&cfg, &graph);
        return Ok(SubmissionStatus::Undefined);
    }

    ensure_sources_exist(&graph)?;

    let orchestrator = Orchestrator::new(cfg.config.clone())?;
    orchestrator.start()?;

    let mut options = SubmitOptions::new().force(args.force).wait(true);
    if let Some(secs) = args.timeout {
        options = options.timeout(Duration::from_secs(secs));
    }

    let jobs = orchestrator.submit(&graph, options);
    let status = SubmissionStatus::from_jobs(&jobs);
    info!(status = %status, jobs = jobs.len(), "submission finished");

    if args.json {
        print_json_summary(&jobs, status)?;
    } else {
        print_summary(&jobs, status);
    }

    orchestrator.stop(status.is_finished(), Some(SHUTDOWN_GRACE));
    Ok(status)
}

/// One file data node per `[data_node.<id>]` section, keyed by id.
fn build_data_nodes(cfg: &ConfigFile) -> Result<BTreeMap<String, Arc<FileDataNode>>> {
    let mut nodes = BTreeMap::new();
    for (id, dn) in cfg.data_node.iter() {
        let mut node = FileDataNode::new(id.as_str(), dn.path.clone());
        if let Some(secs) = dn.validity_secs {
            let period = chrono::Duration::from_std(Duration::from_secs(secs))
                .with_context(|| format!("validity_secs of data node '{id}' is too large"))?;
            node = node.with_validity_period(period);
        }
        nodes.insert(id.clone(), Arc::new(node));
    }
    Ok(nodes)
}

fn build_tasks(cfg: &ConfigFile) -> Result<Vec<Arc<Task>>> {
    let nodes = build_data_nodes(cfg)?;
    let resolve = |ids: &[String]| -> Result<Vec<Arc<FileDataNode>>, JobflowError> {
        ids.iter()
            .map(|id| {
                nodes
                    .get(id)
                    .cloned()
                    .ok_or_else(|| JobflowError::DataNodeNotFound(id.clone()))
            })
            .collect()
    };

    let mut tasks = Vec::with_capacity(cfg.task.len());
    for (name, tc) in cfg.task.iter() {
        let spec = CommandSpec {
            task_id: name.clone(),
            cmd: tc.cmd.clone(),
            inputs: resolve(&tc.inputs)?,
            outputs: resolve(&tc.outputs)?,
            skippable: tc.skippable,
        };
        tasks.push(Arc::new(command_task(spec)));
    }
    Ok(tasks)
}

/// The whole workflow, or just `only` when `--task` is given.
fn select_graph(
    config_path: &Path,
    tasks: Vec<Arc<Task>>,
    only: Option<&str>,
) -> Result<TaskGraph> {
    if let Some(name) = only {
        let task = tasks
            .into_iter()
            .find(|t| t.id().as_str() == name)
            .ok_or_else(|| JobflowError::TaskNotFound(name.to_string()))?;
        return Ok(TaskGraph::single(task));
    }

    let entity_id = config_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow".to_string());
    Ok(TaskGraph::from_tasks(entity_id, tasks)?)
}

/// Inputs no submitted task writes must already be on disk, otherwise their
/// readers would stay blocked forever.
fn ensure_sources_exist(graph: &TaskGraph) -> Result<()> {
    let produced: HashSet<&str> = graph
        .tasks()
        .flat_map(|task| task.outputs().iter().map(|dn| dn.config_id()))
        .collect();

    for task in graph.tasks() {
        for input in task.inputs() {
            if !produced.contains(input.config_id()) && input.last_edit_date().is_none() {
                return Err(JobflowError::DataNodeNotFound(format!(
                    "'{}' is read by task '{}' but does not exist and no submitted task writes it",
                    input.config_id(),
                    task.id()
                ))
                .into());
            }
        }
    }
    Ok(())
}

fn print_dry_run(cfg: &ConfigFile, graph: &TaskGraph) {
    println!("jobflow dry-run");
    println!("  config.mode = {}", cfg.config.mode);
    println!("  config.max_nb_of_workers = {}", cfg.config.max_nb_of_workers);
    println!();

    println!("data nodes ({}):", cfg.data_node.len());
    for (id, dn) in cfg.data_node.iter() {
        match dn.validity_secs {
            Some(secs) => println!("  - {id}: {} (valid {secs}s)", dn.path.display()),
            None => println!("  - {id}: {}", dn.path.display()),
        }
    }
    println!();

    println!("waves ({}):", graph.waves().len());
    for (idx, wave) in graph.waves().iter().enumerate() {
        println!("  wave {idx}:");
        for task in wave {
            println!("    - {}", task.id());
            if let Some(tc) = cfg.task.get(task.id().as_str()) {
                println!("        cmd: {}", tc.cmd);
                if !tc.inputs.is_empty() {
                    println!("        inputs: {:?}", tc.inputs);
                }
                if !tc.outputs.is_empty() {
                    println!("        outputs: {:?}", tc.outputs);
                }
                if tc.skippable {
                    println!("        skippable: true");
                }
            }
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_summary(jobs: &[Arc<Job>], status: SubmissionStatus) {
    for job in jobs {
        println!("{:<24} {:<10} {}", job.task().id(), job.status(), job.id());
        for line in job.stacktrace() {
            println!("    {line}");
        }
    }
    match jobs.first() {
        Some(job) => println!("submission {}: {status}", job.submit_id()),
        None => println!("submission: {status}"),
    }
}

#[derive(Serialize)]
struct Summary {
    status: SubmissionStatus,
    jobs: Vec<JobSnapshot>,
}

fn print_json_summary(jobs: &[Arc<Job>], status: SubmissionStatus) -> Result<()> {
    let summary = Summary {
        status,
        jobs: jobs.iter().map(|job| JobSnapshot::from(job.as_ref())).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
