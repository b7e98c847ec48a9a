//! API router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

/// Create the orchestrator router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Operator operations
        .route("/start_sync/:id", post(handlers::start_sync))
        .route("/stop_sync/:id", post(handlers::stop_sync))
        .route("/commit_sync/:id", post(handlers::commit_sync))
        .route("/reverse_sync/:id", post(handlers::reverse_sync))
        // Status
        .route("/sync_status/:id", get(handlers::sync_status))
        .route("/instances", get(handlers::list_instances))
        .route("/health", get(handlers::health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
