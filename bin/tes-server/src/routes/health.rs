//! Liveness and storage reachability.
//!
//! `/health` answers 200 only while the task store accepts queries; a closed
//! or broken pool turns it into 503 so an orchestrator stops routing task
//! reports to this instance.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Task store reachable", body = Value),
        (status = 503, description = "Task store unreachable", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (code, database) = match state.service.repository().ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "task store ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };
    let status = if code == StatusCode::OK { "ok" } else { "degraded" };
    (
        code,
        Json(json!({
            "status":   status,
            "database": database,
            "version":  env!("CARGO_PKG_VERSION"),
        })),
    )
}
