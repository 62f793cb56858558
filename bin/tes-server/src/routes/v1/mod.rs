pub mod tasks;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().merge(tasks::router())
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    tasks::TasksApi::openapi()
}
