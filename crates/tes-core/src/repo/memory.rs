use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{Result, TaskError};
use crate::repo::{ListQuery, TaskPage, TaskReadModel, TaskRepository};
use crate::task::{Task, TaskStatus};

/// In-process task store.
///
/// Uses a `tokio::sync::RwLock<HashMap>`; the version comparison and the
/// write happen under one write guard, which is this store's CAS primitive.
#[derive(Debug, Clone, Default)]
pub struct MemoryTaskRepository {
    inner: Arc<RwLock<HashMap<String, Task>>>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored task, payload included.
    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl TaskRepository for MemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<()> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(task.id()) {
            return Err(TaskError::Internal(format!(
                "task {} already exists",
                task.id()
            )));
        }
        guard.insert(task.id().to_owned(), task.clone());
        Ok(())
    }

    async fn get_status(&self, id: &str) -> Result<TaskStatus> {
        self.inner
            .read()
            .await
            .get(id)
            .map(|task| task.status.clone())
            .ok_or_else(|| TaskError::not_found(id))
    }

    async fn update_status(&self, status: &TaskStatus) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let Some(task) = guard.get_mut(&status.id) else {
            return Ok(false);
        };
        if task.status.status_resource_version != status.status_resource_version {
            return Ok(false);
        }
        let mut next = status.clone();
        next.status_resource_version += 1;
        // Creation time is immutable; never take it from the caller.
        next.creation_time = task.status.creation_time;
        task.status = next;
        Ok(true)
    }

    async fn check_id_exist(&self, id: &str) -> Result<bool> {
        Ok(self.inner.read().await.contains_key(id))
    }
}

impl TaskReadModel for MemoryTaskRepository {
    async fn list_status(&self, query: &ListQuery) -> Result<TaskPage> {
        let guard = self.inner.read().await;
        let mut rows: Vec<TaskStatus> = guard
            .values()
            .filter(|task| {
                query
                    .page_token
                    .as_deref()
                    .is_none_or(|token| task.id() > token)
            })
            .filter(|task| query.filter.matches(&task.status, &task.name))
            .map(|task| task.status.clone())
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows.truncate(query.page_size as usize + 1);
        Ok(TaskPage::from_overfetch(rows, query.page_size))
    }
}
