use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session state
        .route("/recorder/status", get(handlers::get_status))
        .route("/recorder/events", get(handlers::session_events))
        // Recording control
        .route("/recorder/start", post(handlers::start_recording))
        .route("/recorder/pause", post(handlers::pause_recording))
        .route("/recorder/resume", post(handlers::resume_recording))
        .route("/recorder/stop", post(handlers::stop_recording))
        .route("/recorder/reset", post(handlers::reset_recording))
        .route("/recorder/settings", patch(handlers::update_settings))
        // Result access and export
        .route("/recorder/recording", get(handlers::download_recording))
        .route("/recorder/export", post(handlers::export_recording))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
