//! SQLite task store.
//!
//! [`SqliteTaskRepository::connect`] opens the pool and applies the embedded
//! migrations from `crates/tes-core/migrations`. Only the status columns
//! (`state`, `cluster_id`, `logs`, `status_resource_version`) are written after
//! insert. Payload collections and `logs` are JSON text, timestamps RFC 3339.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::{Result, TaskError};
use crate::repo::{ListQuery, TaskPage, TaskReadModel, TaskRepository};
use crate::task::{State, Task, TaskLog, TaskStatus};

/// SQLite-backed task store.
#[derive(Clone, Debug)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

type StatusRow = (String, String, String, String, String, i64);

impl SqliteTaskRepository {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://tes.db"`
    /// or `"sqlite::memory:"` for tests. An in-memory database is private to
    /// one connection, so tests should pass `max_connections = 1`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial statement to prove the pool can still serve queries.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn status_from_row(row: StatusRow) -> Result<TaskStatus> {
    let (id, state, cluster_id, logs, creation_time, status_resource_version) = row;
    let state = State::from_str(&state)
        .map_err(|_| TaskError::Internal(format!("task {id} has unknown stored state {state}")))?;
    let logs: Vec<TaskLog> = serde_json::from_str(&logs)?;
    let creation_time = creation_time
        .parse::<DateTime<Utc>>()
        .map_err(|e| TaskError::Internal(format!("task {id} creation_time {creation_time}: {e}")))?;
    Ok(TaskStatus {
        id,
        state,
        cluster_id,
        logs,
        creation_time,
        status_resource_version,
    })
}

impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> Result<()> {
        let status = &task.status;
        let resources = task.resources.as_ref().map(serde_json::to_string).transpose()?;
        let bioos_info = task.bioos_info.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            "INSERT INTO task (id, state, cluster_id, logs, creation_time, status_resource_version, \
             name, description, inputs, outputs, resources, executors, volumes, tags, bioos_info, priority_value) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .bind(&status.id)
        .bind(status.state.to_string())
        .bind(&status.cluster_id)
        .bind(serde_json::to_string(&status.logs)?)
        .bind(status.creation_time.to_rfc3339())
        .bind(status.status_resource_version)
        .bind(&task.name)
        .bind(&task.description)
        .bind(serde_json::to_string(&task.inputs)?)
        .bind(serde_json::to_string(&task.outputs)?)
        .bind(resources)
        .bind(serde_json::to_string(&task.executors)?)
        .bind(serde_json::to_string(&task.volumes)?)
        .bind(serde_json::to_string(&task.tags)?)
        .bind(bioos_info)
        .bind(task.priority_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_status(&self, id: &str) -> Result<TaskStatus> {
        let row: Option<StatusRow> = sqlx::query_as(
            "SELECT id, state, cluster_id, logs, creation_time, status_resource_version \
             FROM task WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(status_from_row)
            .unwrap_or_else(|| Err(TaskError::not_found(id)))
    }

    async fn update_status(&self, status: &TaskStatus) -> Result<bool> {
        let logs = serde_json::to_string(&status.logs)?;
        let result = sqlx::query(
            "UPDATE task SET state = ?1, cluster_id = ?2, logs = ?3, status_resource_version = ?4 \
             WHERE id = ?5 AND status_resource_version = ?6",
        )
        .bind(status.state.to_string())
        .bind(&status.cluster_id)
        .bind(&logs)
        .bind(status.status_resource_version + 1)
        .bind(&status.id)
        .bind(status.status_resource_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn check_id_exist(&self, id: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

impl TaskReadModel for SqliteTaskRepository {
    async fn list_status(&self, query: &ListQuery) -> Result<TaskPage> {
        let filter = &query.filter;
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, state, cluster_id, logs, creation_time, status_resource_version \
             FROM task WHERE 1 = 1",
        );
        if let Some(token) = &query.page_token {
            qb.push(" AND id > ").push_bind(token.clone());
        }
        if !filter.name_prefix.is_empty() {
            qb.push(" AND substr(name, 1, ")
                .push_bind(filter.name_prefix.chars().count() as i64)
                .push(") = ")
                .push_bind(filter.name_prefix.clone());
        }
        if !filter.states.is_empty() {
            qb.push(" AND state IN (");
            let mut states = qb.separated(", ");
            for state in &filter.states {
                states.push_bind(state.to_string());
            }
            states.push_unseparated(")");
        }
        if let Some(cluster_id) = &filter.cluster_id {
            qb.push(" AND cluster_id = ").push_bind(cluster_id.clone());
        }
        if filter.without_cluster {
            qb.push(" AND cluster_id = ''");
        }
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(i64::from(query.page_size) + 1);

        let rows: Vec<StatusRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let tasks = rows
            .into_iter()
            .map(status_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(TaskPage::from_overfetch(tasks, query.page_size))
    }
}

#[cfg(test)]
mod tests {
    use chrono::SubsecRound;

    use super::*;
    use crate::error::ErrorKind;
    use crate::repo::ListFilter;
    use crate::task::{Executor, Resources, TaskSubmission};

    async fn repo() -> SqliteTaskRepository {
        SqliteTaskRepository::connect("sqlite::memory:", 1)
            .await
            .expect("in-memory sqlite")
    }

    fn task(id: &str) -> Task {
        Task::from_submission(
            id,
            Utc::now().trunc_subsecs(0),
            TaskSubmission {
                name: "align".to_owned(),
                executors: vec![Executor {
                    image: "ubuntu:22.04".to_owned(),
                    command: vec!["echo".to_owned(), "hi".to_owned()],
                    ..Executor::default()
                }],
                resources: Some(Resources {
                    cpu_cores: 2,
                    ram_gb: 4.0,
                    disk_gb: 20.0,
                    ..Resources::default()
                }),
                ..TaskSubmission::default()
            },
        )
    }

    #[tokio::test]
    async fn created_task_reads_back_as_queued() {
        let repo = repo().await;
        let task = task("task-0000000a");
        repo.create(&task).await.unwrap();

        let status = repo.get_status("task-0000000a").await.unwrap();
        assert_eq!(status, task.status);
        assert_eq!(status.state, State::Queued);
        assert_eq!(status.cluster_id, "");
        assert_eq!(status.status_resource_version, 0);
        assert!(repo.check_id_exist("task-0000000a").await.unwrap());
        assert!(!repo.check_id_exist("task-0000000b").await.unwrap());
    }

    #[tokio::test]
    async fn conditional_update_bumps_version_once() {
        let repo = repo().await;
        repo.create(&task("task-0000000a")).await.unwrap();

        let read = repo.get_status("task-0000000a").await.unwrap();
        let winner = read.clone().update_cluster_id("cluster-01").unwrap();
        let loser = read.update_cluster_id("cluster-02").unwrap();

        assert!(repo.update_status(&winner).await.unwrap());
        assert!(!repo.update_status(&loser).await.unwrap());

        let stored = repo.get_status("task-0000000a").await.unwrap();
        assert_eq!(stored.cluster_id, "cluster-01");
        assert_eq!(stored.status_resource_version, 1);
    }

    #[tokio::test]
    async fn logs_survive_the_json_column() {
        let repo = repo().await;
        let task = task("task-0000000a");
        repo.create(&task).await.unwrap();

        let start = task.status.creation_time;
        let read = repo.get_status("task-0000000a").await.unwrap();
        let next = read
            .update_logs(&[TaskLog {
                cluster_id: "cluster-01".to_owned(),
                start_time: Some(start),
                system_logs: vec!["scheduled".to_owned()],
                ..TaskLog::default()
            }])
            .unwrap();
        assert!(repo.update_status(&next).await.unwrap());

        let stored = repo.get_status("task-0000000a").await.unwrap();
        assert_eq!(stored.logs, next.logs);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let repo = repo().await;
        let err = repo.get_status("task-deadbeef").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let ghost = TaskStatus::queued("task-deadbeef", Utc::now());
        assert!(!repo.update_status(&ghost).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_id_is_a_storage_error() {
        let repo = repo().await;
        repo.create(&task("task-0000000a")).await.unwrap();
        let err = repo.create(&task("task-0000000a")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn listing_filters_and_pages_by_id() {
        let repo = repo().await;
        for (i, name) in ["align", "align", "call", "align"].iter().enumerate() {
            let mut t = task(&format!("task-0000000{i}"));
            t.name = (*name).to_owned();
            repo.create(&t).await.unwrap();
        }
        let claimed = repo
            .get_status("task-00000001")
            .await
            .unwrap()
            .update_cluster_id("cluster-01")
            .unwrap();
        assert!(repo.update_status(&claimed).await.unwrap());

        let query = ListQuery {
            page_size: 2,
            filter: ListFilter {
                name_prefix: "al".to_owned(),
                states: vec![State::Queued],
                ..ListFilter::default()
            },
            ..ListQuery::default()
        };
        let first = repo.list_status(&query).await.unwrap();
        let ids: Vec<_> = first.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["task-00000000", "task-00000001"]);
        assert_eq!(first.next_page_token.as_deref(), Some("task-00000001"));

        let second = repo
            .list_status(&ListQuery {
                page_token: first.next_page_token,
                ..query.clone()
            })
            .await
            .unwrap();
        let ids: Vec<_> = second.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["task-00000003"]);
        assert!(second.next_page_token.is_none());

        let unclaimed = repo
            .list_status(&ListQuery {
                page_size: 10,
                filter: ListFilter {
                    without_cluster: true,
                    ..ListFilter::default()
                },
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(unclaimed.tasks.len(), 3);
        assert!(unclaimed.tasks.iter().all(|t| t.cluster_id.is_empty()));
    }

    #[tokio::test]
    async fn ping_fails_once_the_pool_is_closed() {
        let repo = repo().await;
        repo.ping().await.unwrap();
        repo.pool().close().await;
        assert_eq!(repo.ping().await.unwrap_err().kind(), ErrorKind::Internal);
    }
}
