//! Legal status and cluster-assignment transitions.
//!
//! ```text
//!   QUEUED ─┬─> INITIALIZING ─> RUNNING ─┬─> COMPLETE / SYSTEM_ERROR / EXECUTOR_ERROR
//!           │   (any executing state may move to any other executing state)
//!           └──────────────> CANCELING ──┴─> CANCELED
//! ```
//!
//! Finished states only accept themselves; `CANCELED` is only reachable from
//! `CANCELING`, and a canceling task cannot go back to executing.

use crate::error::{Result, TaskError};
use crate::task::types::{State, TaskStatus};

impl State {
    /// Validate `self -> next` and return the resulting state.
    pub fn transition_to(self, next: State) -> Result<State> {
        if self == next {
            return Ok(self);
        }
        if self.is_finished() {
            return Err(TaskError::cannot_execute(
                "finished task state cannot be updated",
            ));
        }
        if self == State::Canceling && next.is_executing() {
            return Err(TaskError::cannot_execute(
                "CANCELING task state cannot be updated back to executing",
            ));
        }
        if self != State::Canceling && next == State::Canceled {
            return Err(TaskError::cannot_execute(
                "only a CANCELING task state can be changed to CANCELED",
            ));
        }
        Ok(next)
    }
}

impl TaskStatus {
    pub fn update_state(mut self, next: State) -> Result<Self> {
        self.state = self.state.transition_to(next)?;
        Ok(self)
    }

    pub fn cancel(self) -> Result<Self> {
        self.update_state(State::Canceling)
    }

    /// Assign the task to a cluster. Only a `QUEUED` task may change hands;
    /// re-sending the current value is always accepted.
    pub fn update_cluster_id(mut self, cluster_id: &str) -> Result<Self> {
        if self.cluster_id == cluster_id {
            return Ok(self);
        }
        if self.state != State::Queued {
            return Err(TaskError::cannot_execute(
                "only QUEUED task cluster_id may be changed",
            ));
        }
        self.cluster_id = cluster_id.to_owned();
        Ok(self)
    }
}
