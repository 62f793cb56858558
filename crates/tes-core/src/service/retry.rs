use tracing::{debug, warn};

use crate::error::{Result, TaskError};
use crate::repo::TaskRepository;
use crate::task::TaskStatus;

/// Read-transform-conditional-write loop shared by cancel and update.
///
/// `transform` gets a fresh copy of the stored status on every attempt. Its
/// errors end the loop immediately; only a lost compare-and-swap is retried.
/// On success the returned status carries the version the store now holds.
pub(crate) async fn update_with_retry<R, F>(
    repo: &R,
    id: &str,
    max_attempts: usize,
    mut transform: F,
) -> Result<TaskStatus>
where
    R: TaskRepository,
    F: FnMut(TaskStatus) -> Result<TaskStatus>,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        let status = repo.get_status(id).await?;
        let next = transform(status)?;
        if repo.update_status(&next).await? {
            return Ok(TaskStatus {
                status_resource_version: next.status_resource_version + 1,
                ..next
            });
        }
        debug!(
            task_id = %id,
            attempt,
            version = next.status_resource_version,
            "status write lost the race; re-reading"
        );
    }
    warn!(task_id = %id, attempts, "giving up on conflicting status update");
    Err(TaskError::ConflictRetriesExhausted {
        id: id.to_owned(),
        attempts,
    })
}
