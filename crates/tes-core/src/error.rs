//! Error taxonomy of the task control-plane.
//!
//! Every fallible operation in this crate returns [`TaskError`]. Callers that
//! only need the coarse category (for example to pick an HTTP status code)
//! should match on [`TaskError::kind`] instead of individual variants.

use thiserror::Error;

/// Coarse classification of a [`TaskError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request: unknown state name, temporal-invariant violation,
    /// bad normalization input.
    InvalidInput,
    /// The referenced task does not exist.
    NotFound,
    /// Well-formed request rejected by the state machine.
    CannotExecute,
    /// A bounded retry loop gave up.
    Exhausted,
    /// Storage failure, opaque to the caller.
    Internal,
}

/// Errors produced by the task service and its collaborators.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid param: {0}")]
    InvalidInput(String),

    #[error("task {id} not found")]
    NotFound { id: String },

    #[error("{0}")]
    CannotExecute(String),

    /// No unused task ID was found within the configured attempt ceiling.
    #[error("no free task id after {attempts} attempts")]
    IdSpaceExhausted { attempts: usize },

    /// Every conditional write lost the race within the attempt ceiling.
    #[error("task {id} status update still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { id: String, attempts: usize },

    /// Propagated from the SQLite (or other sqlx) store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TaskError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        TaskError::InvalidInput(msg.into())
    }

    pub fn cannot_execute(msg: impl Into<String>) -> Self {
        TaskError::CannotExecute(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        TaskError::NotFound { id: id.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::InvalidInput(_) => ErrorKind::InvalidInput,
            TaskError::NotFound { .. } => ErrorKind::NotFound,
            TaskError::CannotExecute(_) => ErrorKind::CannotExecute,
            TaskError::IdSpaceExhausted { .. } | TaskError::ConflictRetriesExhausted { .. } => {
                ErrorKind::Exhausted
            }
            TaskError::Database(_) | TaskError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::Internal(format!("json codec: {e}"))
    }
}

pub type Result<T, E = TaskError> = std::result::Result<T, E>;
