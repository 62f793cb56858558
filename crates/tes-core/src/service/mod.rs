//! Task service: create, query, cancel and status updates.
//!
//! [`TaskService`] owns its collaborators. The repository is the only
//! synchronization point between concurrent callers: every status change is a
//! read, a pure transform and a conditional write, retried while the write
//! loses a version race (see [`retry`]).

mod retry;


use std::collections::HashSet;

use chrono::{SubsecRound, Utc};
use tracing::{debug, error, info, instrument};

use crate::error::{Result, TaskError};
use crate::normalize::Normalizer;
use crate::repo::{ListQuery, TaskPage, TaskReadModel, TaskRepository};
use crate::task::{State, Task, TaskLog, TaskStatus, TaskSubmission, gen_task_id};

use retry::update_with_retry;

/// Ceilings for the service's two retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fresh IDs tried before create gives up with `IdSpaceExhausted`.
    pub max_id_attempts: usize,
    /// Conditional writes tried before cancel/update give up with
    /// `ConflictRetriesExhausted`.
    pub max_update_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_id_attempts: 16,
            max_update_attempts: 64,
        }
    }
}

/// A cluster's status report for one task. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub state: Option<State>,
    pub cluster_id: Option<String>,
    pub logs: Vec<TaskLog>,
}

impl StatusUpdate {
    fn apply(&self, status: TaskStatus) -> Result<TaskStatus> {
        let mut status = status;
        if let Some(state) = self.state {
            status = status.update_state(state)?;
        }
        if let Some(cluster_id) = &self.cluster_id {
            status = status.update_cluster_id(cluster_id)?;
        }
        if !self.logs.is_empty() {
            status = status.update_logs(&self.logs)?;
        }
        Ok(status)
    }
}

pub struct TaskService<R, N> {
    repo: R,
    normalizer: N,
    retry: RetryPolicy,
}

impl<R, N> TaskService<R, N>
where
    R: TaskRepository,
    N: Normalizer,
{
    pub fn new(repo: R, normalizer: N, retry: RetryPolicy) -> Self {
        Self {
            repo,
            normalizer,
            retry,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Accept a submission and return the ID it was stored under.
    #[instrument(skip_all, fields(name = %submission.name))]
    pub async fn create(&self, submission: TaskSubmission) -> Result<String> {
        let id = self.allocate_id().await?;
        let creation_time = Utc::now().trunc_subsecs(0);
        let mut task = Task::from_submission(id, creation_time, submission);
        self.normalizer.normalize(&mut task)?;
        self.repo
            .create(&task)
            .await
            .inspect_err(|e| error!(task_id = %task.id(), error = %e, "failed to store task"))?;
        info!(task_id = %task.id(), "task queued");
        Ok(task.status.id)
    }

    async fn allocate_id(&self) -> Result<String> {
        let attempts = self.retry.max_id_attempts.max(1);
        for attempt in 1..=attempts {
            let id = gen_task_id();
            if !self.repo.check_id_exist(&id).await? {
                return Ok(id);
            }
            debug!(task_id = %id, attempt, "task id already taken");
        }
        Err(TaskError::IdSpaceExhausted { attempts })
    }

    pub async fn status(&self, id: &str) -> Result<TaskStatus> {
        check_id(id)?;
        self.repo.get_status(id).await
    }

    /// Move the task to `CANCELING`. Clusters finish the job by reporting
    /// `CANCELED` through [`TaskService::update`].
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> Result<TaskStatus> {
        check_id(id)?;
        let status = update_with_retry(
            &self.repo,
            id,
            self.retry.max_update_attempts,
            TaskStatus::cancel,
        )
        .await?;
        info!(state = %status.state, "task cancel requested");
        Ok(status)
    }

    /// Apply a status report: state transition, then cluster assignment, then
    /// log merge. All three are validated against the same snapshot and
    /// written together, or not at all.
    #[instrument(skip(self, update), fields(state = ?update.state, cluster_id = ?update.cluster_id))]
    pub async fn update(&self, id: &str, update: StatusUpdate) -> Result<TaskStatus> {
        check_id(id)?;
        validate_report(&update.logs)?;
        let status = update_with_retry(
            &self.repo,
            id,
            self.retry.max_update_attempts,
            |status| update.apply(status),
        )
        .await?;
        debug!(
            state = %status.state,
            version = status.status_resource_version,
            "task status updated"
        );
        Ok(status)
    }
}

impl<R, N> TaskService<R, N>
where
    R: TaskRepository + TaskReadModel,
    N: Normalizer,
{
    /// One page of task statuses matching `query`, ordered by ID.
    pub async fn list(&self, query: ListQuery) -> Result<TaskPage> {
        let query = query.normalized()?;
        self.repo.list_status(&query).await
    }
}

fn check_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(TaskError::invalid("task id is required"));
    }
    Ok(())
}

/// Shape checks on a report that do not depend on the stored status.
pub fn validate_report(logs: &[TaskLog]) -> Result<()> {
    let mut clusters = HashSet::new();
    for log in logs {
        if log.cluster_id.is_empty() {
            return Err(TaskError::invalid("logs.cluster_id is required"));
        }
        if !clusters.insert(log.cluster_id.as_str()) {
            return Err(TaskError::invalid(format!(
                "logs.cluster_id {} is duplicated",
                log.cluster_id
            )));
        }
        for slot in &log.logs {
            let mut executors = HashSet::new();
            for executor in slot {
                if executor.executor_id.is_empty() {
                    return Err(TaskError::invalid("logs.logs.executor_id is required"));
                }
                if !executors.insert(executor.executor_id.as_str()) {
                    return Err(TaskError::invalid(format!(
                        "logs.logs.executor_id {} is duplicated",
                        executor.executor_id
                    )));
                }
            }
        }
    }
    Ok(())
}
