use std::path::PathBuf;
use std::sync::Arc;

use crate::generator::WeeklyPlanGenerator;
use crate::retry::RetryPolicy;
use crate::store::{JsonFileStore, MemoryStore, RetryingPersister};
use crate::templates::BuiltinTemplates;
use crate::{FitnessManager, ManagerConfig, Persister, PlannerError};

const DEFAULT_SAVE_RETRIES: u32 = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// JSON document the planner persists to. `None` keeps everything in memory.
    pub data_path: Option<PathBuf>,
    /// JSON array of events to seed a fresh planner with instead of the built-in event.
    pub seed_path: Option<PathBuf>,
    pub save_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, PlannerError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, PlannerError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let data_path = get("FITNESS_PLANNER_DATA_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let seed_path = get("FITNESS_PLANNER_SEED_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let save_retries = match get("FITNESS_PLANNER_SAVE_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                PlannerError::Config(format!(
                    "FITNESS_PLANNER_SAVE_RETRIES must be a non-negative integer, got {raw:?}"
                ))
            })?,
            None => DEFAULT_SAVE_RETRIES,
        };
        Ok(Self {
            data_path,
            seed_path,
            save_retries,
        })
    }

    /// Wire a manager with the built-in generator and templates, seed it and
    /// restore whatever was persisted.
    pub async fn open_manager(&self) -> Result<FitnessManager, PlannerError> {
        let store: Arc<dyn Persister> = match &self.data_path {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        let persister = Arc::new(RetryingPersister::new(
            store,
            RetryPolicy::with_retries(self.save_retries),
        ));
        let manager_config = match &self.seed_path {
            Some(path) => ManagerConfig::from_seed_file(path).await?,
            None => ManagerConfig::default(),
        };
        let manager = FitnessManager::new(
            manager_config,
            persister,
            Arc::new(WeeklyPlanGenerator),
            Arc::new(BuiltinTemplates::builtin()),
        );
        manager.restore().await?;
        tracing::info!(
            data_path = ?self.data_path,
            save_retries = self.save_retries,
            "fitness manager ready"
        );
        Ok(manager)
    }
}
