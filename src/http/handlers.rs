use super::state::AppState;
use crate::export;
use crate::recorder::{ContainerFormat, FfmpegEncoder};
use crate::session::{SessionSnapshot, SettingsUpdate};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json},
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    /// Target container format for the exported file
    pub format: ContainerFormat,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub path: PathBuf,
    pub mime_type: String,
    pub size_bytes: usize,
}

fn internal_error(message: String) -> axum::response::Response {
    error!("{message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
        .into_response()
}

fn snapshot_response(result: anyhow::Result<SessionSnapshot>) -> axum::response::Response {
    match result {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => internal_error(format!("Session command failed: {e}")),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /recorder/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_response(state.session.snapshot().await)
}

/// POST /recorder/start
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_response(state.session.start().await)
}

/// POST /recorder/pause
pub async fn pause_recording(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_response(state.session.pause().await)
}

/// POST /recorder/resume
pub async fn resume_recording(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_response(state.session.resume().await)
}

/// POST /recorder/stop
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_response(state.session.stop().await)
}

/// POST /recorder/reset
pub async fn reset_recording(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_response(state.session.reset().await)
}

/// PATCH /recorder/settings
///
/// Partial update. Updates issued while the session is not idle are
/// rejected by the coordinator; the response carries the effective
/// settings either way.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    snapshot_response(state.session.update_settings(update).await)
}

/// GET /recorder/recording
///
/// Download the finished recording in its original container.
pub async fn download_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.recording().await {
        Ok(Some(recording)) => {
            let filename = export::recording_filename(&recording);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, recording.mime_type.clone()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                recording.data,
            )
                .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No finished recording available".to_string(),
            }),
        )
            .into_response(),
        Err(e) => internal_error(format!("Session command failed: {e}")),
    }
}

/// POST /recorder/export
///
/// Write the recording to the configured output directory, converting to
/// the requested container format first when it differs from the original.
pub async fn export_recording(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> impl IntoResponse {
    let recording = match state.session.recording().await {
        Ok(Some(recording)) => recording,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "No finished recording available".to_string(),
                }),
            )
                .into_response();
        }
        Err(e) => return internal_error(format!("Session command failed: {e}")),
    };

    if state
        .converting
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "An export is already in progress".to_string(),
            }),
        )
            .into_response();
    }

    let result = run_export(&state, recording, request.format).await;
    state.converting.store(false, Ordering::SeqCst);

    match result {
        Ok(response) => {
            info!(
                "Export complete: {} ({} bytes)",
                response.path.display(),
                response.size_bytes
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => internal_error(format!("Export failed: {e}")),
    }
}

async fn run_export(
    state: &AppState,
    recording: crate::recorder::Recording,
    format: ContainerFormat,
) -> anyhow::Result<ExportResponse> {
    let recording = if recording.mime_type == format.mime_type() {
        recording
    } else {
        let encoder = FfmpegEncoder::new(format);
        export::convert_recording(&recording, format, &encoder).await?
    };

    let path = export::save_recording(&recording, &state.output_dir).await?;
    Ok(ExportResponse {
        path,
        mime_type: recording.mime_type,
        size_bytes: recording.data.len(),
    })
}

/// GET /recorder/events
///
/// Server-sent event feed of session lifecycle events.
pub async fn session_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    return Some((Ok(Event::default().data(data)), rx));
                }
                // Skip over dropped events; the next snapshot poll catches up
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
