use thiserror::Error;

use crate::models::{TaskId, TaskStatus};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    AdmissionRejected,
    TaskNotFound,
    ResultNotReady,
    InvalidTransition,
    InvalidInput,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub task: Option<TaskId>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn admission_rejected(max_running_tasks: usize) -> Self {
        Self {
            task: None,
            kind: CoreErrorKind::AdmissionRejected,
            message: format!(
                "could not add task because {max_running_tasks} tasks are already running or about to run"
            ),
        }
    }

    pub fn task_not_found(task_id: TaskId) -> Self {
        Self {
            task: Some(task_id),
            kind: CoreErrorKind::TaskNotFound,
            message: format!("no task with id '{task_id}'"),
        }
    }

    pub fn result_not_ready(task_id: TaskId, status: TaskStatus) -> Self {
        Self {
            task: Some(task_id),
            kind: CoreErrorKind::ResultNotReady,
            message: format!("task '{task_id}' is not finished (status {status})"),
        }
    }

    pub fn invalid_transition(task_id: TaskId, current: TaskStatus, desired: TaskStatus) -> Self {
        Self {
            task: Some(task_id),
            kind: CoreErrorKind::InvalidTransition,
            message: format!("task '{task_id}' cannot transition from '{current}' to '{desired}'"),
        }
    }

    pub(crate) fn poisoned() -> Self {
        Self {
            task: None,
            kind: CoreErrorKind::Internal,
            message: "task store mutex poisoned".to_string(),
        }
    }
}
