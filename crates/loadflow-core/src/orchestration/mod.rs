pub mod task_manager;
pub mod task_runner;
pub mod task_store;

pub use task_manager::{
    DEFAULT_MAX_RUNNING_TASKS, DEFAULT_RETENTION, TaskManager, TaskManagerConfig, TaskSnapshot,
    TaskStatusResponse,
};
pub use task_runner::{TaskHandle, TaskRunner, result_url, status_url};
pub use task_store::TaskStore;

use crate::models::CoreError;

pub type OrchestrationResult<T> = Result<T, CoreError>;
