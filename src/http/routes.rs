use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    // Leave headroom above the upload cap so the oversize case is rejected
    // by the handler with a proper error body, not a blunt 413.
    let body_limit = state.upstream.max_upload_bytes * 2;

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Audio forwarding
        .route(
            "/transcribe",
            post(handlers::transcribe).get(handlers::transcribe_capabilities),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        // Browser clients call this cross-origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
