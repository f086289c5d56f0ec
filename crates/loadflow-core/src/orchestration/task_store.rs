use std::collections::HashMap;

use crate::models::{Task, TaskId, TaskStatus};

/// Registry of live tasks keyed by id.
///
/// The store does no locking of its own; `TaskManager` owns it behind a single
/// mutex so that inserts, removals and counts are linearizable.
#[derive(Debug)]
pub struct TaskStore<R> {
    tasks: HashMap<TaskId, Task<R>>,
}

impl<R> TaskStore<R> {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    pub fn get(&self, task_id: TaskId) -> Option<&Task<R>> {
        self.tasks.get(&task_id)
    }

    pub(crate) fn get_mut(&mut self, task_id: TaskId) -> Option<&mut Task<R>> {
        self.tasks.get_mut(&task_id)
    }

    /// Ids are generated as v4 UUIDs, so an existing entry is never overwritten in practice.
    pub fn insert(&mut self, task: Task<R>) {
        self.tasks.insert(task.id(), task);
    }

    pub fn remove(&mut self, task_id: TaskId) -> Option<Task<R>> {
        self.tasks.remove(&task_id)
    }

    pub fn size(&self) -> usize {
        self.tasks.len()
    }

    pub fn num_running(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Running)
            .count()
    }

    /// Tasks holding an execution slot: everything not yet terminal.
    pub fn num_active(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| !task.status().is_terminal())
            .count()
    }

    pub fn is_finished(&self, task_id: TaskId) -> bool {
        self.get(task_id)
            .is_some_and(|task| task.status() == TaskStatus::Finished)
    }

    /// Drops every task older than `age_seconds` unless it is still running.
    /// Returns the number of removed tasks.
    pub fn sweep_older_than(&mut self, age_seconds: u64) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| {
            task.status() == TaskStatus::Running || task.age_seconds() <= age_seconds
        });
        before - self.tasks.len()
    }

    /// Drops terminal tasks that completed more than `seconds` ago.
    /// Returns the number of removed tasks.
    pub fn sweep_completed_longer_than(&mut self, seconds: u64) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| {
            task.seconds_since_completion()
                .is_none_or(|elapsed| elapsed <= seconds)
        });
        before - self.tasks.len()
    }

    /// Removes the task only if it has reached a terminal status.
    pub fn remove_terminal(&mut self, task_id: TaskId) -> Option<Task<R>> {
        match self.tasks.get(&task_id) {
            Some(task) if task.status().is_terminal() => self.tasks.remove(&task_id),
            _ => None,
        }
    }

    pub fn mark_for_removal(&mut self, task_id: TaskId) {
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.mark_for_removal();
        }
    }
}

impl<R> Default for TaskStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::TaskStore;
    use crate::models::{Task, TaskFailure, TaskId, TaskOutcome};

    fn running() -> Task<u32> {
        let mut task = Task::new();
        task.start().unwrap();
        task
    }

    fn finished(value: u32) -> Task<u32> {
        let mut task = running();
        task.complete(TaskOutcome::Finished(value)).unwrap();
        task
    }

    #[test]
    fn tracks_tasks_by_id_and_status() {
        let mut store = TaskStore::new();
        let created = Task::new();
        let running = running();
        let finished = finished(3);
        let (created_id, running_id, finished_id) = (created.id(), running.id(), finished.id());

        store.insert(created);
        store.insert(running);
        store.insert(finished);

        assert_eq!(store.size(), 3);
        assert_eq!(store.num_running(), 1);
        assert_eq!(store.num_active(), 2);
        assert!(!store.is_finished(created_id));
        assert!(!store.is_finished(running_id));
        assert!(store.is_finished(finished_id));
        assert!(!store.is_finished(TaskId::new()));

        assert!(store.remove(created_id).is_some());
        assert!(store.get(created_id).is_none());
        assert_eq!(store.size(), 2);
    }

    #[test]
    fn removing_or_marking_unknown_ids_is_a_no_op() {
        let mut store: TaskStore<u32> = TaskStore::new();
        store.insert(finished(1));

        assert!(store.remove(TaskId::new()).is_none());
        store.mark_for_removal(TaskId::new());
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn mark_for_removal_flags_existing_task() {
        let mut store = TaskStore::new();
        let task = finished(5);
        let task_id = task.id();
        store.insert(task);

        store.mark_for_removal(task_id);
        assert!(store.get(task_id).unwrap().is_marked_for_removal());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_spares_running_tasks_regardless_of_age() {
        let mut store = TaskStore::new();
        let old_running = running();
        let old_finished = finished(1);
        let mut old_failed = running();
        old_failed
            .complete(TaskOutcome::Failed(TaskFailure::new("diverged")))
            .unwrap();
        let old_created = Task::new();
        let running_id = old_running.id();

        store.insert(old_running);
        store.insert(old_finished);
        store.insert(old_failed);
        store.insert(old_created);

        tokio::time::advance(Duration::from_secs(11)).await;
        let young = finished(2);
        let young_id = young.id();
        store.insert(young);

        assert_eq!(store.sweep_older_than(10), 3);
        assert_eq!(store.size(), 2);
        assert!(store.get(running_id).is_some());
        assert!(store.get(young_id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_tasks_exactly_at_threshold() {
        let mut store = TaskStore::new();
        store.insert(finished(1));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.sweep_older_than(10), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.sweep_older_than(10), 1);
        assert_eq!(store.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_sweep_counts_from_completion_not_creation() {
        let mut store = TaskStore::new();
        let mut long_running = running();
        let long_running_id = long_running.id();
        let created = Task::new();
        let created_id = created.id();

        tokio::time::advance(Duration::from_secs(30)).await;
        long_running.complete(TaskOutcome::Finished(9)).unwrap();
        store.insert(long_running);
        store.insert(created);
        store.insert(running());

        assert_eq!(store.sweep_completed_longer_than(10), 0);
        assert_eq!(store.size(), 3);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.sweep_completed_longer_than(10), 1);
        assert!(store.get(long_running_id).is_none());
        assert!(store.get(created_id).is_some());
        assert_eq!(store.num_running(), 1);
    }

    #[test]
    fn remove_terminal_leaves_unfinished_tasks_in_place() {
        let mut store = TaskStore::new();
        let running = running();
        let done = finished(4);
        let (running_id, done_id) = (running.id(), done.id());
        store.insert(running);
        store.insert(done);

        assert!(store.remove_terminal(running_id).is_none());
        assert!(store.get(running_id).is_some());
        assert!(store.remove_terminal(done_id).is_some());
        assert!(store.remove_terminal(TaskId::new()).is_none());
        assert_eq!(store.size(), 1);
    }
}
