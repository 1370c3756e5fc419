// src/config/validate.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{JobflowError, Result};
use crate::types::ExecutionMode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = JobflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.data_node, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_references(cfg)?;
    validate_producers(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(JobflowError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_nb_of_workers == 0 {
        return Err(JobflowError::ConfigError(
            "[config].max_nb_of_workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if let ExecutionMode::External(name) = &cfg.config.mode {
        return Err(JobflowError::ConfigError(format!(
            "[config].mode must be \"development\" or \"standalone\" (got \"{name}\")"
        )));
    }

    Ok(())
}

fn validate_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(JobflowError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }

        for (field, ids) in [("inputs", &task.inputs), ("outputs", &task.outputs)] {
            for id in ids {
                if !cfg.data_node.contains_key(id) {
                    return Err(JobflowError::ConfigError(format!(
                        "task '{name}' has unknown data node '{id}' in `{field}`"
                    )));
                }
            }
        }

        if let Some(id) = task.inputs.iter().find(|id| task.outputs.contains(id)) {
            return Err(JobflowError::ConfigError(format!(
                "task '{name}' cannot read its own output '{id}'"
            )));
        }
    }
    Ok(())
}

fn validate_producers(cfg: &RawConfigFile) -> Result<()> {
    let mut producer: HashMap<&str, &str> = HashMap::new();
    for (name, task) in cfg.task.iter() {
        for output in task.outputs.iter() {
            if let Some(other) = producer.insert(output.as_str(), name.as_str()) {
                return Err(JobflowError::ConfigError(format!(
                    "data node '{output}' is written by both '{other}' and '{name}'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: producer -> consumer of a shared data node.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    let mut producer: HashMap<&str, &str> = HashMap::new();
    for (name, task) in cfg.task.iter() {
        graph.add_node(name.as_str());
        for output in task.outputs.iter() {
            producer.insert(output.as_str(), name.as_str());
        }
    }

    for (name, task) in cfg.task.iter() {
        for input in task.inputs.iter() {
            if let Some(&from) = producer.get(input.as_str()) {
                graph.add_edge(from, name.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(JobflowError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
