use loadflow_core::orchestration::{TaskManager, TaskManagerConfig, TaskRunner};
use serde_json::Value;

use crate::computations::ComputationRegistry;

pub struct AppState {
    pub runner: TaskRunner<Value>,
    pub computations: ComputationRegistry,
}

impl AppState {
    pub fn new(config: TaskManagerConfig, computations: ComputationRegistry) -> Self {
        Self {
            runner: TaskRunner::new(TaskManager::new(config)),
            computations,
        }
    }
}
