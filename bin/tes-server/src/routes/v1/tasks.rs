//! Task lifecycle endpoints.
//!
//! Thin adapters over [`tes_core::TaskService`]: request DTOs are validated,
//! converted and handed to the service; every status-changing call goes
//! through its conditional-write retry loop.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tes_core::{ListQuery, StatusUpdate};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::schemas::v1::task::{
    CreateTaskRequest, CreateTaskResponse, ExecutorRequest, GpuRequest, InputRequest,
    ListTasksQuery, ListTasksResponse, OutputRequest, ResourcesRequest, TaskStatusResponse,
    UpdateTaskRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_task, list_tasks, get_task, cancel_task, update_task),
    components(schemas(
        CreateTaskRequest,
        CreateTaskResponse,
        InputRequest,
        OutputRequest,
        ResourcesRequest,
        GpuRequest,
        ExecutorRequest,
        UpdateTaskRequest,
        TaskStatusResponse,
        ListTasksQuery,
        ListTasksResponse
    ))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).patch(update_task))
        .route("/tasks/{id}/cancel", post(cancel_task))
}

#[utoipa::path(
    post,
    path = "/v1/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task queued", body = CreateTaskResponse),
        (status = 400, description = "Invalid submission"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), ServerError> {
    req.validate()?;
    let id = state.service.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(CreateTaskResponse { id })))
}

#[utoipa::path(
    get,
    path = "/v1/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "One page of task statuses", body = ListTasksResponse),
        (status = 400, description = "Bad filter or page size"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListTasksQuery>,
) -> Result<Json<ListTasksResponse>, ServerError> {
    let page = state.service.list(ListQuery::try_from(q)?).await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "ID of the task to retrieve")
    ),
    responses(
        (status = 200, description = "Task status", body = TaskStatusResponse),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ServerError> {
    let status = state.service.status(&id).await?;
    Ok(Json(status.into()))
}

#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/cancel",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "ID of the task to cancel")
    ),
    responses(
        (status = 200, description = "Task is canceling", body = TaskStatusResponse),
        (status = 400, description = "Task already finished"),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Too many concurrent writers"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ServerError> {
    let status = state.service.cancel(&id).await?;
    info!(task_id = %id, "task cancel accepted");
    Ok(Json(status.into()))
}

#[utoipa::path(
    patch,
    path = "/v1/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "ID of the task to update")
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Report merged", body = TaskStatusResponse),
        (status = 400, description = "Invalid report or illegal transition"),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Too many concurrent writers"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskStatusResponse>, ServerError> {
    let update = StatusUpdate::try_from(req)?;
    let status = state.service.update(&id, update).await?;
    Ok(Json(status.into()))
}
