// src/dispatch/factory.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::JobConfig;
use crate::dispatch::{DevelopmentDispatcher, Dispatcher, JobQueues, StandaloneDispatcher};
use crate::errors::{JobflowError, Result};
use crate::job::JobRepository;
use crate::types::ExecutionMode;

/// Everything a dispatcher needs from the orchestrator that owns it.
#[derive(Clone)]
pub struct DispatcherContext {
    pub queues: Arc<JobQueues>,
    pub repository: Arc<dyn JobRepository>,
    pub config: JobConfig,
}

/// Builds a dispatcher for an execution mode registered by name.
pub type DispatcherFactory =
    Arc<dyn Fn(DispatcherContext) -> Result<Arc<dyn Dispatcher>> + Send + Sync>;

/// Select the dispatcher for `config.mode`.
///
/// Registered factories take precedence over the built-in modes, so an
/// embedder can replace `standalone` as well as add new modes.
pub fn build_dispatcher(
    config: &JobConfig,
    queues: Arc<JobQueues>,
    repository: Arc<dyn JobRepository>,
    factories: &HashMap<String, DispatcherFactory>,
) -> Result<Arc<dyn Dispatcher>> {
    if let Some(factory) = factories.get(config.mode.name()) {
        info!(mode = %config.mode, "building registered dispatcher");
        return factory(DispatcherContext {
            queues,
            repository,
            config: config.clone(),
        });
    }

    let dispatcher: Arc<dyn Dispatcher> = match &config.mode {
        ExecutionMode::Development => Arc::new(DevelopmentDispatcher::new(queues, repository)),
        ExecutionMode::Standalone => {
            if config.max_nb_of_workers == 0 {
                return Err(JobflowError::ConfigError(
                    "standalone mode needs max_nb_of_workers >= 1".to_string(),
                ));
            }
            Arc::new(StandaloneDispatcher::new(
                queues,
                repository,
                config.max_nb_of_workers,
            ))
        }
        ExecutionMode::External(name) => {
            return Err(JobflowError::UnsupportedMode(format!(
                "no dispatcher registered for mode '{name}'"
            )));
        }
    };

    info!(mode = %config.mode, workers = config.max_nb_of_workers, "dispatcher built");
    Ok(dispatcher)
}
