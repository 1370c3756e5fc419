// src/errors.rs

//! Crate-wide error types and aliases.
//!
//! [`JobflowError`] covers everything that can abort startup or a CLI run
//! (configuration, IO, graph construction). [`TaskError`] is the captured
//! outcome of a task function and only ever ends up in a job's `Failed`
//! status; it never crosses the submit/cancel API boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported execution mode: {0}")]
    UnsupportedMode(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Data node not found: {0}")]
    DataNodeNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("Dispatcher error: {0}")]
    Dispatcher(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Why a job's task function did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The function returned an error.
    #[error("task function failed: {0}")]
    Failed(String),

    /// The function panicked (or its worker was torn down).
    #[error("task function panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, JobflowError>;
