use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Base64 PCM chunks are larger than axum's 2 MB default allows for big buffers
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/sessions", post(handlers::start_session))
        .route("/sessions/:session_id", delete(handlers::cancel_session))
        .route("/sessions/:session_id/chunks", post(handlers::save_chunk))
        .route(
            "/sessions/:session_id/finalize",
            post(handlers::finalize_session),
        )
        // Catalog
        .route("/recordings", get(handlers::list_recordings))
        .route(
            "/recordings/:recording_id",
            delete(handlers::delete_recording),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
