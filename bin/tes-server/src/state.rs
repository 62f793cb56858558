//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use tes_core::{ResourceNormalizer, SqliteTaskRepository, TaskService};

use crate::config::Config;

/// The concrete service the server runs.
pub type Service = TaskService<SqliteTaskRepository, ResourceNormalizer>;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Task lifecycle service over the SQLite store.
    pub service: Arc<Service>,
}
