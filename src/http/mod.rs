//! HTTP API server for external control (the recorder UI)
//!
//! This module provides the REST surface the presentation layer drives:
//! - POST /recorder/start|pause|resume|stop|reset - session commands
//! - PATCH /recorder/settings - partial settings update (idle only)
//! - GET /recorder/status - read-only session snapshot
//! - GET /recorder/events - server-sent session events
//! - GET /recorder/recording - download the finished blob
//! - POST /recorder/export - convert and save to the output directory
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
