// src/config/mod.rs

//! Configuration for jobflow.
//!
//! - [`JobConfig`] is the runtime configuration the orchestrator is built
//!   from (execution mode and worker count).
//! - [`model`] is the TOML workflow file read by the CLI.
//! - [`loader`] reads it from disk; [`validate`] checks it.

pub mod loader;
pub mod model;
pub mod validate;

use serde::Deserialize;

use crate::types::ExecutionMode;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, DataNodeConfig, RawConfigFile, TaskConfig};

/// Runtime configuration of the job system.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Upper bound on concurrently running jobs in standalone mode.
    #[serde(default = "default_max_nb_of_workers")]
    pub max_nb_of_workers: usize,
}

fn default_max_nb_of_workers() -> usize {
    1
}

impl JobConfig {
    pub fn development() -> Self {
        Self::default()
    }

    pub fn standalone(max_nb_of_workers: usize) -> Self {
        Self {
            mode: ExecutionMode::Standalone,
            max_nb_of_workers,
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        Self {
            mode: ExecutionMode::External(name.into()),
            max_nb_of_workers: default_max_nb_of_workers(),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Development,
            max_nb_of_workers: default_max_nb_of_workers(),
        }
    }
}
