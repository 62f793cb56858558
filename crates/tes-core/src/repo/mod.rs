//! Persistence abstraction for tasks.
//!
//! [`TaskRepository`] is the only way the service touches storage. The
//! default implementation is [`sqlite::SqliteTaskRepository`]; tests and
//! local runs can use [`memory::MemoryTaskRepository`]. To swap to another
//! database, implement [`TaskRepository`] and change the concrete type where
//! the service is built. Methods return `impl Future + Send` so the trait
//! stays usable from spawned tasks.

pub mod memory;
pub mod query;
pub mod sqlite;

use std::future::Future;

use crate::error::Result;
use crate::task::{Task, TaskStatus};

pub use memory::MemoryTaskRepository;
pub use query::{ListFilter, ListQuery, TaskPage};
pub use sqlite::SqliteTaskRepository;

pub trait TaskRepository: Send + Sync + 'static {
    /// Persist a new task. The caller guarantees the ID is unused.
    fn create(&self, task: &Task) -> impl Future<Output = Result<()>> + Send;

    /// Load the status projection. Fails with `NotFound` if the ID is unknown.
    fn get_status(&self, id: &str) -> impl Future<Output = Result<TaskStatus>> + Send;

    /// Compare-and-swap on `(id, status_resource_version)`.
    ///
    /// On a match the stored status is replaced and its version incremented,
    /// returning `Ok(true)`. A version mismatch is not an error: it returns
    /// `Ok(false)` so the caller can re-read and retry. `Err` is reserved for
    /// storage failures.
    fn update_status(&self, status: &TaskStatus) -> impl Future<Output = Result<bool>> + Send;

    fn check_id_exist(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Read side used by listing. Kept apart from [`TaskRepository`] so the
/// write path does not depend on query support.
pub trait TaskReadModel: Send + Sync + 'static {
    /// One page of status projections matching `query.filter`, ordered by ID.
    /// `query` has already been through [`ListQuery::normalized`].
    fn list_status(&self, query: &ListQuery) -> impl Future<Output = Result<TaskPage>> + Send;
}
