//! TaskStore: the persistence seam the Scheduler reads and writes through.
//! `InMemoryTaskStore` is the one reference implementation this crate ships
//! so the core is runnable and testable without a real database.

use crate::constants::SCRATCHPAD_ITERATION_TAIL_CHARS;
use crate::error::{KaganError, Result};
use crate::models::{ExecutionRun, Task, TaskId, TaskStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// A sparse set of field updates applied atomically to a stored task.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub description: Option<String>,
    pub review_summary: Option<Option<String>>,
    pub checks_passed: Option<bool>,
    pub merge_failed: Option<bool>,
    pub merge_error: Option<Option<String>>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, task_id: TaskId) -> Option<Task>;
    async fn list_by_status(&self, status: TaskStatus) -> Vec<Task>;
    async fn insert(&self, task: Task) -> Result<()>;
    async fn update(&self, task_id: TaskId, patch: TaskPatch) -> Result<()>;
    async fn move_status(&self, task_id: TaskId, new_status: TaskStatus) -> Result<()>;
    async fn delete(&self, task_id: TaskId) -> Result<()>;
    async fn increment_total_iterations(&self, task_id: TaskId) -> Result<u64>;
    async fn get_scratchpad(&self, task_id: TaskId) -> Result<String>;
    async fn update_scratchpad(&self, task_id: TaskId, appended: &str, max_bytes: usize) -> Result<()>;
    async fn record_execution_run(&self, run: ExecutionRun) -> Result<()>;
    async fn list_execution_runs(&self, task_id: TaskId) -> Result<Vec<ExecutionRun>>;
    fn subscribe_status_changes(&self) -> broadcast::Receiver<(TaskId, Option<TaskStatus>, Option<TaskStatus>)>;
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    runs: HashMap<TaskId, Vec<ExecutionRun>>,
}

pub struct InMemoryTaskStore {
    inner: RwLock<Inner>,
    status_changes: broadcast::Sender<(TaskId, Option<TaskStatus>, Option<TaskStatus>)>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        let (status_changes, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(Inner::default()),
            status_changes,
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, task_id: TaskId) -> Option<Task> {
        self.inner.read().await.tasks.get(&task_id).cloned()
    }

    async fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.inner
            .read()
            .await
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    async fn insert(&self, task: Task) -> Result<()> {
        self.inner.write().await.tasks.insert(task.id, task);
        Ok(())
    }

    async fn update(&self, task_id: TaskId, patch: TaskPatch) -> Result<()> {
        let (old_status, new_status) = {
            let mut inner = self.inner.write().await;
            let task = inner
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| KaganError::TaskNotFound(task_id.to_string()))?;

            let old_status = task.status;
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(summary) = patch.review_summary {
                task.review_summary = summary;
            }
            if let Some(checks_passed) = patch.checks_passed {
                task.checks_passed = checks_passed;
            }
            if let Some(merge_failed) = patch.merge_failed {
                task.merge_failed = merge_failed;
            }
            if let Some(merge_error) = patch.merge_error {
                task.merge_error = merge_error;
            }
            task.updated_at = chrono::Utc::now();
            (old_status, task.status)
        };

        if old_status != new_status {
            let _ = self.status_changes.send((task_id, Some(old_status), Some(new_status)));
        }
        Ok(())
    }

    async fn move_status(&self, task_id: TaskId, new_status: TaskStatus) -> Result<()> {
        self.update(
            task_id,
            TaskPatch {
                status: Some(new_status),
                ..Default::default()
            },
        )
        .await
    }

    async fn delete(&self, task_id: TaskId) -> Result<()> {
        let old_status = {
            let mut inner = self.inner.write().await;
            let task = inner
                .tasks
                .remove(&task_id)
                .ok_or_else(|| KaganError::TaskNotFound(task_id.to_string()))?;
            inner.runs.remove(&task_id);
            task.status
        };
        let _ = self.status_changes.send((task_id, Some(old_status), None));
        Ok(())
    }

    async fn increment_total_iterations(&self, task_id: TaskId) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| KaganError::TaskNotFound(task_id.to_string()))?;
        task.total_iterations += 1;
        Ok(task.total_iterations)
    }

    async fn get_scratchpad(&self, task_id: TaskId) -> Result<String> {
        let inner = self.inner.read().await;
        let task = inner
            .tasks
            .get(&task_id)
            .ok_or_else(|| KaganError::TaskNotFound(task_id.to_string()))?;
        Ok(task.scratchpad.clone())
    }

    async fn update_scratchpad(&self, task_id: TaskId, appended: &str, max_bytes: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| KaganError::TaskNotFound(task_id.to_string()))?;

        task.scratchpad.push_str(appended);
        if task.scratchpad.len() > max_bytes {
            let drop_from = task.scratchpad.len() - max_bytes;
            let boundary = (drop_from..task.scratchpad.len())
                .find(|&i| task.scratchpad.is_char_boundary(i))
                .unwrap_or(drop_from);
            task.scratchpad = task.scratchpad[boundary..].to_string();
        }
        Ok(())
    }

    async fn record_execution_run(&self, run: ExecutionRun) -> Result<()> {
        self.inner
            .write()
            .await
            .runs
            .entry(run.task_id)
            .or_default()
            .push(run);
        Ok(())
    }

    async fn list_execution_runs(&self, task_id: TaskId) -> Result<Vec<ExecutionRun>> {
        Ok(self
            .inner
            .read()
            .await
            .runs
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }

    fn subscribe_status_changes(&self) -> broadcast::Receiver<(TaskId, Option<TaskStatus>, Option<TaskStatus>)> {
        self.status_changes.subscribe()
    }
}

/// Builds the iteration banner appended to a task's scratchpad, tailing the
/// response to `SCRATCHPAD_ITERATION_TAIL_CHARS` characters.
pub fn iteration_banner(iteration: u32, response: &str) -> String {
    let tail_start = response
        .char_indices()
        .rev()
        .nth(SCRATCHPAD_ITERATION_TAIL_CHARS.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("\n\n--- Iteration {iteration} ---\n{}", &response[tail_start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    #[tokio::test]
    async fn move_status_notifies_subscribers() {
        let store = InMemoryTaskStore::new();
        let mut rx = store.subscribe_status_changes();
        let task = Task::new("Fix bug".into(), "desc".into(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();

        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();

        let (id, old, new) = rx.recv().await.unwrap();
        assert_eq!(id, task_id);
        assert_eq!(old, Some(TaskStatus::Backlog));
        assert_eq!(new, Some(TaskStatus::InProgress));
    }

    #[tokio::test]
    async fn delete_removes_task_and_notifies_with_none() {
        let store = InMemoryTaskStore::new();
        let mut rx = store.subscribe_status_changes();
        let task = Task::new("Fix bug".into(), "desc".into(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();
        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();
        let _ = rx.recv().await.unwrap();

        store.delete(task_id).await.unwrap();

        let (id, old, new) = rx.recv().await.unwrap();
        assert_eq!(id, task_id);
        assert_eq!(old, Some(TaskStatus::InProgress));
        assert_eq!(new, None);
        assert!(store.get(task_id).await.is_none());
    }

    #[tokio::test]
    async fn delete_unknown_task_errors() {
        let store = InMemoryTaskStore::new();
        assert!(store.delete(TaskId::new()).await.is_err());
    }

    #[tokio::test]
    async fn scratchpad_truncates_to_tail_window() {
        let store = InMemoryTaskStore::new();
        let task = Task::new("Fix bug".into(), "desc".into(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();

        store.update_scratchpad(task_id, &"a".repeat(100), 10).await.unwrap();
        let pad = store.get_scratchpad(task_id).await.unwrap();
        assert_eq!(pad.len(), 10);
    }

    #[tokio::test]
    async fn increment_total_iterations_is_persistent() {
        let store = InMemoryTaskStore::new();
        let task = Task::new("Fix bug".into(), "desc".into(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();

        assert_eq!(store.increment_total_iterations(task_id).await.unwrap(), 1);
        assert_eq!(store.increment_total_iterations(task_id).await.unwrap(), 2);
    }
}
