// src/task.rs

//! Tasks: named units of work with declared input and output data nodes.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::DataNode;
use crate::errors::TaskError;
use crate::job::JobId;

/// Config id of a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// What a task function sees while it runs.
pub struct TaskContext<'a> {
    pub job_id: &'a JobId,
    pub task: &'a Task,
}

impl TaskContext<'_> {
    pub fn inputs(&self) -> &[Arc<dyn DataNode>] {
        self.task.inputs()
    }

    pub fn outputs(&self) -> &[Arc<dyn DataNode>] {
        self.task.outputs()
    }
}

/// The business function a task runs.
pub type TaskFn = Arc<dyn Fn(&TaskContext<'_>) -> anyhow::Result<()> + Send + Sync>;

pub struct Task {
    id: TaskId,
    inputs: Vec<Arc<dyn DataNode>>,
    outputs: Vec<Arc<dyn DataNode>>,
    skippable: bool,
    function: TaskFn,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("inputs", &self.input_ids())
            .field("outputs", &self.output_ids())
            .field("skippable", &self.skippable)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new<F>(id: impl Into<TaskId>, function: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            skippable: false,
            function: Arc::new(function),
        }
    }

    pub fn with_input(mut self, node: Arc<dyn DataNode>) -> Self {
        self.inputs.push(node);
        self
    }

    pub fn with_output(mut self, node: Arc<dyn DataNode>) -> Self {
        self.outputs.push(node);
        self
    }

    pub fn skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn inputs(&self) -> &[Arc<dyn DataNode>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Arc<dyn DataNode>] {
        &self.outputs
    }

    pub fn is_skippable(&self) -> bool {
        self.skippable
    }

    pub fn input_ids(&self) -> Vec<&str> {
        self.inputs.iter().map(|dn| dn.config_id()).collect()
    }

    pub fn output_ids(&self) -> Vec<&str> {
        self.outputs.iter().map(|dn| dn.config_id()).collect()
    }

    /// Run the task function for `job_id`, turning errors and panics into a
    /// [`TaskError`].
    pub fn execute(&self, job_id: &JobId) -> Result<(), TaskError> {
        let ctx = TaskContext { job_id, task: self };

        match catch_unwind(AssertUnwindSafe(|| (self.function)(&ctx))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskError::Failed(format!("{err:#}"))),
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
