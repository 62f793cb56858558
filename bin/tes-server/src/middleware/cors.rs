use std::sync::Arc;

use http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let any = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    // Wildcard unless TES_CORS_ORIGINS names at least one valid origin.
    let Some(origins_str) = &state.config.cors_allowed_origins else {
        return any;
    };
    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if origins.is_empty() {
        return any;
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_headers(Any)
        .allow_methods(Any)
}
