//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** storage failures are logged with full detail but only a
//! generic message is returned to the caller so that file paths, SQL, or
//! other implementation details never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tes_core::{ErrorKind, TaskError};
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the tes-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the task service.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// The request body failed DTO validation.
    #[error("invalid param: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::Validation(_) | ServerError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::Task(e) => match e.kind() {
                ErrorKind::InvalidInput | ErrorKind::CannotExecute => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
                ErrorKind::Exhausted if matches!(e, TaskError::ConflictRetriesExhausted { .. }) => {
                    (StatusCode::CONFLICT, e.to_string())
                }
                ErrorKind::Exhausted | ErrorKind::Internal => {
                    error!(error = %e, "task service error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: TaskError) -> (StatusCode, String) {
        ServerError::from(e).status_and_message()
    }

    #[test]
    fn client_errors_keep_their_message() {
        let (status, msg) = status_of(TaskError::invalid("task start_time before task creation_time"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("creation_time"));

        let (status, _) = status_of(TaskError::cannot_execute("finished task state cannot be updated"));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, msg) = status_of(TaskError::not_found("task-00000001"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(msg.contains("task-00000001"));
    }

    #[test]
    fn lost_races_are_conflicts() {
        let (status, _) = status_of(TaskError::ConflictRetriesExhausted {
            id: "task-00000001".to_owned(),
            attempts: 64,
        });
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn internal_detail_is_hidden() {
        for e in [
            TaskError::Internal("disk I/O error at /var/lib/tes.db".to_owned()),
            TaskError::IdSpaceExhausted { attempts: 16 },
        ] {
            let (status, msg) = status_of(e);
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(msg, "internal server error");
        }
    }
}
