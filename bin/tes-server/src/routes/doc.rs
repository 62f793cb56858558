use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{health, v1};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "tes-server",
    description = "task lifecycle and status-merge API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}

/// Serves the merged OpenAPI document at `/api-docs/openapi.json`.
pub fn router() -> Router<Arc<AppState>> {
    let docs = get_docs();
    Router::new().route("/api-docs/openapi.json", get(move || async move { Json(docs) }))
}
