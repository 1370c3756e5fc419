// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How the orchestrator executes runnable jobs.
///
/// - `Development`: synchronous, on the submitting thread, one job at a time.
/// - `Standalone`: on a bounded pool of worker threads fed by a background
///   dispatch loop.
/// - `External(name)`: a dispatcher supplied by the embedding application
///   through a factory registered under `name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ExecutionMode {
    Development,
    Standalone,
    External(String),
}

impl ExecutionMode {
    /// Name used in configuration files and dispatcher registries.
    pub fn name(&self) -> &str {
        match self {
            ExecutionMode::Development => "development",
            ExecutionMode::Standalone => "standalone",
            ExecutionMode::External(name) => name,
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Development
    }
}

impl From<String> for ExecutionMode {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "development" => ExecutionMode::Development,
            "standalone" => ExecutionMode::Standalone,
            _ => ExecutionMode::External(s.trim().to_string()),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("execution mode must not be empty".to_string());
        }
        Ok(ExecutionMode::from(s.to_string()))
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
