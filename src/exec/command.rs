// src/exec/command.rs

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::data::{DataNode, FileDataNode};
use crate::task::{Task, TaskContext};

/// Everything needed to run one `[task.<id>]` as a process.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub task_id: String,
    pub cmd: String,
    pub inputs: Vec<Arc<FileDataNode>>,
    pub outputs: Vec<Arc<FileDataNode>>,
    pub skippable: bool,
}

/// `JOBFLOW_<KIND>_<ID>` with the id upper-cased and every character that
/// is not alphanumeric replaced by `_`.
pub fn env_var_name(kind: &str, config_id: &str) -> String {
    let id: String = config_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("JOBFLOW_{kind}_{id}")
}

/// Build a task running `spec.cmd` with `sh -c` (`cmd /C` on Windows).
///
/// The process sees `JOBFLOW_INPUT_<ID>` and `JOBFLOW_OUTPUT_<ID>` for each
/// data node, plus `JOBFLOW_JOB_ID`. A non-zero exit status, or an output
/// file missing after a successful exit, fails the job.
pub fn command_task(spec: CommandSpec) -> Task {
    let env: Vec<(String, PathBuf)> = spec
        .inputs
        .iter()
        .map(|dn| (env_var_name("INPUT", dn.config_id()), dn.path().to_path_buf()))
        .chain(
            spec.outputs
                .iter()
                .map(|dn| (env_var_name("OUTPUT", dn.config_id()), dn.path().to_path_buf())),
        )
        .collect();
    let output_paths: Vec<PathBuf> = spec
        .outputs
        .iter()
        .map(|dn| dn.path().to_path_buf())
        .collect();

    let cmd = spec.cmd.clone();
    let mut task = Task::new(spec.task_id.as_str(), move |ctx: &TaskContext<'_>| {
        run_command(ctx, &cmd, &env)?;
        for path in &output_paths {
            if !path.exists() {
                bail!("command did not produce output '{}'", path.display());
            }
        }
        Ok(())
    })
    .skippable(spec.skippable);

    for input in spec.inputs {
        task = task.with_input(input);
    }
    for output in spec.outputs {
        task = task.with_output(output);
    }
    task
}

fn run_command(ctx: &TaskContext<'_>, cmd: &str, env: &[(String, PathBuf)]) -> Result<()> {
    let task_id = ctx.task.id();
    info!(task = %task_id, job = %ctx.job_id, cmd = %cmd, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command.env("JOBFLOW_JOB_ID", ctx.job_id.as_str());
    for (name, path) in env {
        command.env(name, path);
    }

    let Output {
        status,
        stdout,
        stderr,
    } = command
        .output()
        .with_context(|| format!("spawning process for task '{task_id}'"))?;

    for line in String::from_utf8_lossy(&stdout).lines() {
        debug!(task = %task_id, "stdout: {}", line);
    }
    for line in String::from_utf8_lossy(&stderr).lines() {
        debug!(task = %task_id, "stderr: {}", line);
    }

    let code = status.code().unwrap_or(-1);
    info!(
        task = %task_id,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if !status.success() {
        bail!("command for task '{task_id}' exited with code {code}");
    }
    Ok(())
}
