use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::{CoreError, Task, TaskId, TaskOutcome, TaskStatus};
use crate::orchestration::{OrchestrationResult, TaskStore};

pub const DEFAULT_MAX_RUNNING_TASKS: usize = 100;
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TaskManagerConfig {
    /// Upper bound on tasks that are created or running at the same time.
    pub max_running_tasks: usize,
    /// How long a completed task stays fetchable, counted from completion.
    pub retention: Duration,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            max_running_tasks: DEFAULT_MAX_RUNNING_TASKS,
            retention: DEFAULT_RETENTION,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    pub message: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub status: TaskStatus,
    pub failure_message: Option<String>,
    pub age_seconds: u64,
    pub seconds_since_completion: Option<u64>,
    pub marked_for_removal: bool,
}

/// Owner of the task store and the only component that changes its structure.
///
/// Cloning is cheap and every clone shares the same store. All store access,
/// including the status transitions written by `TaskRunner`, goes through one
/// mutex, so admission checks see a consistent running count.
pub struct TaskManager<R = serde_json::Value> {
    inner: Arc<ManagerState<R>>,
}

struct ManagerState<R> {
    config: TaskManagerConfig,
    store: Mutex<TaskStore<R>>,
    completions: Notify,
}

impl<R> Clone for TaskManager<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R> Default for TaskManager<R> {
    fn default() -> Self {
        Self::new(TaskManagerConfig::default())
    }
}

impl<R> TaskManager<R> {
    pub fn new(config: TaskManagerConfig) -> Self {
        Self {
            inner: Arc::new(ManagerState {
                config,
                store: Mutex::new(TaskStore::new()),
                completions: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> TaskManagerConfig {
        self.inner.config
    }

    /// Admits `task` unless `max_running_tasks` tasks are already admitted and
    /// not yet terminal.
    ///
    /// A task holds its slot from admission on, before its execution has
    /// started, so a burst of submissions cannot overshoot the limit.
    pub fn register(&self, task: Task<R>) -> OrchestrationResult<()> {
        let max_running_tasks = self.inner.config.max_running_tasks;
        let mut store = self.lock_store()?;
        let active = store.num_active();
        if active >= max_running_tasks {
            tracing::warn!(
                task_id = %task.id(),
                active,
                max_running_tasks,
                "rejected task because the running limit is reached"
            );
            return Err(CoreError::admission_rejected(max_running_tasks));
        }
        store.insert(task);
        Ok(())
    }

    pub fn status(&self, task_id: TaskId) -> OrchestrationResult<TaskStatusResponse> {
        let store = self.lock_store()?;
        let task = store
            .get(task_id)
            .ok_or_else(|| CoreError::task_not_found(task_id))?;
        Ok(TaskStatusResponse {
            status: task.status(),
            message: task.failure_message().unwrap_or_default().to_string(),
        })
    }

    pub fn snapshot(&self, task_id: TaskId) -> OrchestrationResult<TaskSnapshot> {
        let store = self.lock_store()?;
        let task = store
            .get(task_id)
            .ok_or_else(|| CoreError::task_not_found(task_id))?;
        Ok(TaskSnapshot {
            id: task.id(),
            status: task.status(),
            failure_message: task.failure_message().map(str::to_string),
            age_seconds: task.age_seconds(),
            seconds_since_completion: task.seconds_since_completion(),
            marked_for_removal: task.is_marked_for_removal(),
        })
    }

    /// Hands out the outcome of a terminal task and removes the task.
    ///
    /// A second call for the same id fails with `TaskNotFound`.
    pub fn fetch_result(&self, task_id: TaskId) -> OrchestrationResult<TaskOutcome<R>> {
        let mut store = self.lock_store()?;
        let status = store
            .get(task_id)
            .map(Task::status)
            .ok_or_else(|| CoreError::task_not_found(task_id))?;
        if !status.is_terminal() {
            return Err(CoreError::result_not_ready(task_id, status));
        }

        store
            .remove(task_id)
            .and_then(Task::into_outcome)
            .ok_or_else(|| CoreError::task_not_found(task_id))
    }

    pub fn size(&self) -> OrchestrationResult<usize> {
        Ok(self.lock_store()?.size())
    }

    pub fn num_running(&self) -> OrchestrationResult<usize> {
        Ok(self.lock_store()?.num_running())
    }

    pub fn is_finished(&self, task_id: TaskId) -> OrchestrationResult<bool> {
        Ok(self.lock_store()?.is_finished(task_id))
    }

    /// Removes terminal tasks that completed longer than the retention window ago.
    pub fn sweep(&self) -> OrchestrationResult<usize> {
        let retention_secs = self.inner.config.retention.as_secs();
        let removed = self
            .lock_store()?
            .sweep_completed_longer_than(retention_secs);
        if removed > 0 {
            tracing::info!(removed, retention_secs, "swept expired tasks");
        }
        Ok(removed)
    }

    /// Marks the task, waits out the retention window and then drops it if it
    /// was not fetched in the meantime.
    ///
    /// A task that is not terminal when the window ends stays in the store.
    pub async fn schedule_eviction(&self, task_id: TaskId) {
        let retention = self.inner.config.retention;
        if let Err(error) = self.mark_for_removal(task_id) {
            tracing::warn!(
                task_id = %task_id,
                kind = ?error.kind,
                message = %error.message,
                "could not mark task for removal"
            );
            return;
        }

        tracing::info!(
            task_id = %task_id,
            retention_secs = retention.as_secs(),
            "scheduled task eviction"
        );
        tokio::time::sleep(retention).await;

        match self.evict(task_id) {
            Ok(Eviction::Removed(status)) => {
                tracing::info!(task_id = %task_id, status = %status, "evicted task");
            }
            Ok(Eviction::Kept(status)) => {
                tracing::warn!(
                    task_id = %task_id,
                    status = %status,
                    "kept unfinished task past its eviction"
                );
            }
            Ok(Eviction::Missing) => {
                tracing::debug!(task_id = %task_id, "task already removed before eviction");
            }
            Err(error) => {
                tracing::warn!(
                    task_id = %task_id,
                    kind = ?error.kind,
                    message = %error.message,
                    "failed to evict task"
                );
            }
        }
    }

    /// Resolves once the task reaches `FINISHED` or `FAILED`.
    pub async fn wait_for_terminal(
        &self,
        task_id: TaskId,
        timeout_duration: Duration,
    ) -> OrchestrationResult<TaskStatus> {
        let deadline = Instant::now() + timeout_duration;
        loop {
            let notified = self.inner.completions.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let status = self.current_status(task_id)?;
            if status.is_terminal() {
                return Ok(status);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let status = self.current_status(task_id)?;
                if status.is_terminal() {
                    return Ok(status);
                }
                return Err(CoreError::result_not_ready(task_id, status));
            }
        }
    }

    pub(crate) fn start(&self, task_id: TaskId) -> OrchestrationResult<()> {
        let mut store = self.lock_store()?;
        store
            .get_mut(task_id)
            .ok_or_else(|| CoreError::task_not_found(task_id))?
            .start()
    }

    pub(crate) fn complete(
        &self,
        task_id: TaskId,
        outcome: TaskOutcome<R>,
    ) -> OrchestrationResult<()> {
        let completed = {
            let mut store = self.lock_store()?;
            store
                .get_mut(task_id)
                .ok_or_else(|| CoreError::task_not_found(task_id))?
                .complete(outcome)
        };
        self.inner.completions.notify_waiters();
        completed
    }

    fn current_status(&self, task_id: TaskId) -> OrchestrationResult<TaskStatus> {
        self.lock_store()?
            .get(task_id)
            .map(Task::status)
            .ok_or_else(|| CoreError::task_not_found(task_id))
    }

    fn mark_for_removal(&self, task_id: TaskId) -> OrchestrationResult<()> {
        self.lock_store()?.mark_for_removal(task_id);
        Ok(())
    }

    fn evict(&self, task_id: TaskId) -> OrchestrationResult<Eviction> {
        let mut store = self.lock_store()?;
        if let Some(task) = store.remove_terminal(task_id) {
            return Ok(Eviction::Removed(task.status()));
        }
        Ok(match store.get(task_id) {
            Some(task) => Eviction::Kept(task.status()),
            None => Eviction::Missing,
        })
    }

    fn lock_store(&self) -> OrchestrationResult<MutexGuard<'_, TaskStore<R>>> {
        self.inner.store.lock().map_err(|_| CoreError::poisoned())
    }
}

enum Eviction {
    Removed(TaskStatus),
    Kept(TaskStatus),
    Missing,
}

impl<R: Send + 'static> TaskManager<R> {
    /// Runs `sweep` on every `interval` tick until the returned handle is aborted.
    ///
    /// Panics if `interval` is zero.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = manager.sweep() {
                    tracing::warn!(
                        kind = ?error.kind,
                        message = %error.message,
                        "task sweep failed"
                    );
                }
            }
        })
    }
}
