use super::state::AppState;
use crate::error::{ErrorResponse, RecorderError};
use crate::transport::{FinalizeRequest, SaveChunkRequest, StartSessionRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info};

fn status_for(err: &RecorderError) -> StatusCode {
    match err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        RecorderError::InvalidSessionId(_)
        | RecorderError::InvalidFormat(_)
        | RecorderError::InvalidWavHeader(_)
        | RecorderError::Transport(_) => StatusCode::BAD_REQUEST,
        RecorderError::SessionAlreadyExists(_) | RecorderError::AlreadyRecording => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: RecorderError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (status, Json(ErrorResponse::from(&err))).into_response()
}

// ============================================================================
// Sessions
// ============================================================================

/// POST /sessions
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    info!("Starting session {} ({} tracks)", req.session_id, req.tracks.len());

    match state
        .transport
        .start_recording_session(&req.session_id, &req.config, &req.tracks)
        .await
    {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /sessions/:session_id/chunks
pub async fn save_chunk(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SaveChunkRequest>,
) -> impl IntoResponse {
    if req.session_id != session_id {
        return error_response(RecorderError::Transport(format!(
            "chunk for {} posted to session {}",
            req.session_id, session_id
        )));
    }

    let upload = match req.into_upload() {
        Ok(upload) => upload,
        Err(e) => return error_response(e),
    };

    match state.transport.save_recording_chunk(upload).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /sessions/:session_id/finalize
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<FinalizeRequest>,
) -> impl IntoResponse {
    info!("Finalizing session {}", session_id);

    match state
        .transport
        .finalize_recording(&session_id, &req.config, &req.total_chunks)
        .await
    {
        Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /sessions/:session_id
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Cancelling session {}", session_id);

    match state.transport.cancel_recording(&session_id).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Recordings
// ============================================================================

/// GET /recordings
pub async fn list_recordings(State(state): State<AppState>) -> impl IntoResponse {
    match state.transport.get_recordings().await {
        Ok(recordings) => (StatusCode::OK, Json(recordings)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /recordings/:recording_id
pub async fn delete_recording(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> impl IntoResponse {
    info!("Deleting recording {}", recording_id);

    match state.transport.delete_recording(&recording_id).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
