// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::JobConfig;

/// Workflow file exactly as read from TOML, before validation.
///
/// ```toml
/// [config]
/// mode = "standalone"
/// max_nb_of_workers = 2
///
/// [data_node.raw]
/// path = "data/raw.csv"
///
/// [data_node.clean]
/// path = "data/clean.csv"
/// validity_secs = 3600
///
/// [task.clean]
/// cmd = "tr a-z A-Z < $JOBFLOW_INPUT_RAW > $JOBFLOW_OUTPUT_CLEAN"
/// inputs = ["raw"]
/// outputs = ["clean"]
/// skippable = true
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: JobConfig,

    #[serde(default)]
    pub data_node: BTreeMap<String, DataNodeConfig>,

    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated workflow file.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, so every
/// reference resolves and the task graph is acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: JobConfig,
    pub data_node: BTreeMap<String, DataNodeConfig>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: JobConfig,
        data_node: BTreeMap<String, DataNodeConfig>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            data_node,
            task,
        }
    }

    /// Name of the task writing `data_node`, if any.
    pub fn producer_of(&self, data_node: &str) -> Option<&str> {
        self.task
            .iter()
            .find(|(_, task)| task.outputs.iter().any(|o| o == data_node))
            .map(|(name, _)| name.as_str())
    }
}

/// `[data_node.<id>]` section: a file on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct DataNodeConfig {
    /// Location of the file, relative to the working directory.
    pub path: PathBuf,

    /// Seconds after its last edit during which the file counts as valid.
    /// Unset means valid forever.
    #[serde(default)]
    pub validity_secs: Option<u64>,
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command to execute.
    pub cmd: String,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    /// Whether the task may be skipped when its outputs are up to date.
    #[serde(default)]
    pub skippable: bool,
}
