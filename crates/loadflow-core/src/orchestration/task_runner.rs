use std::fmt::Display;

use serde::Serialize;
use tokio::runtime::Handle;

use crate::models::{CoreError, CoreErrorKind, Task, TaskFailure, TaskId, TaskOutcome};
use crate::orchestration::{OrchestrationResult, TaskManager};

pub fn status_url(task_id: TaskId) -> String {
    format!("/status/{task_id}")
}

pub fn result_url(task_id: TaskId) -> String {
    format!("/result/{task_id}")
}

/// What a caller gets back from `TaskRunner::submit`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHandle {
    pub id: TaskId,
    pub status_url: String,
    pub result_url: String,
}

impl TaskHandle {
    pub fn for_task(task_id: TaskId) -> Self {
        Self {
            id: task_id,
            status_url: status_url(task_id),
            result_url: result_url(task_id),
        }
    }
}

/// Starts computations off the caller's path and records their outcome.
pub struct TaskRunner<R = serde_json::Value> {
    manager: TaskManager<R>,
}

impl<R> Clone for TaskRunner<R> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<R: Send + 'static> TaskRunner<R> {
    pub fn new(manager: TaskManager<R>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &TaskManager<R> {
        &self.manager
    }

    /// Registers a task for `computation` and starts it in the background.
    ///
    /// Admission is decided before anything is spawned, so a full manager
    /// rejects the call immediately. The computation runs on tokio's blocking
    /// pool; its error or panic becomes the task's failure.
    pub fn submit<F, E>(&self, computation: F) -> OrchestrationResult<TaskHandle>
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        E: Display + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|error| CoreError {
            task: None,
            kind: CoreErrorKind::Internal,
            message: format!("tasks can only be submitted inside a tokio runtime: {error}"),
        })?;
        let task = Task::new();
        let task_id = task.id();
        self.manager.register(task)?;

        let manager = self.manager.clone();
        runtime.spawn(async move {
            let _eviction = EvictionGuard {
                manager: manager.clone(),
                task_id,
            };
            execute(&manager, task_id, computation).await;
        });

        Ok(TaskHandle::for_task(task_id))
    }
}

async fn execute<R, F, E>(manager: &TaskManager<R>, task_id: TaskId, computation: F)
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, E> + Send + 'static,
    E: Display + Send + 'static,
{
    if let Err(error) = manager.start(task_id) {
        tracing::warn!(
            task_id = %task_id,
            kind = ?error.kind,
            message = %error.message,
            "could not start task"
        );
        return;
    }
    tracing::info!(task_id = %task_id, "running task");

    let outcome = match tokio::task::spawn_blocking(computation).await {
        Ok(Ok(result)) => TaskOutcome::Finished(result),
        Ok(Err(error)) => {
            let failure = TaskFailure::from_error(error);
            tracing::warn!(task_id = %task_id, message = %failure.message, "task failed");
            TaskOutcome::Failed(failure)
        }
        Err(join_error) if join_error.is_cancelled() => {
            tracing::info!(task_id = %task_id, "task execution cancelled");
            return;
        }
        Err(join_error) => {
            let failure = TaskFailure::from_panic(join_error.into_panic());
            tracing::warn!(task_id = %task_id, message = %failure.message, "task panicked");
            TaskOutcome::Failed(failure)
        }
    };

    let status = outcome.status();
    match manager.complete(task_id, outcome) {
        Ok(()) => tracing::info!(task_id = %task_id, status = %status, "task completed"),
        Err(error) => tracing::warn!(
            task_id = %task_id,
            kind = ?error.kind,
            message = %error.message,
            "could not record task outcome"
        ),
    }
}

/// Arms the retention countdown when the execution future ends, whether it
/// returned normally or was dropped by cancellation.
struct EvictionGuard<R: Send + 'static> {
    manager: TaskManager<R>,
    task_id: TaskId,
}

impl<R: Send + 'static> Drop for EvictionGuard<R> {
    fn drop(&mut self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let manager = self.manager.clone();
        let task_id = self.task_id;
        handle.spawn(async move { manager.schedule_eviction(task_id).await });
    }
}
