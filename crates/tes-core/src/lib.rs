pub mod error;
pub mod normalize;
pub mod repo;
pub mod service;
pub mod task;

pub use error::{ErrorKind, Result, TaskError};
pub use normalize::{NormalizeOptions, Normalizer, ResourceNormalizer};
pub use repo::{
    ListFilter, ListQuery, MemoryTaskRepository, SqliteTaskRepository, TaskPage, TaskReadModel,
    TaskRepository,
};
pub use service::{RetryPolicy, StatusUpdate, TaskService};
pub use task::{State, Task, TaskLog, TaskStatus, TaskSubmission};
