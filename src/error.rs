//! Error types shared by the capture and storage sides.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::TrackKind;

/// Recorder-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Failed to write {path}: {reason}")]
    FileWrite { path: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Recording not found: {0}")]
    RecordingNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Track not found: {track} in session {session_id}")]
    TrackNotFound { session_id: String, track: TrackKind },

    #[error("Session already exists: {0}")]
    SessionAlreadyExists(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("chunk_write_failed")]
    ChunkWriteFailed,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("No audio track: {0}")]
    NoAudioTrack(String),

    #[error("No active recording session")]
    NoActiveSession,

    #[error("A recording session is already active")]
    AlreadyRecording,

    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("Invalid WAV header: {0}")]
    InvalidWavHeader(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl RecorderError {
    pub fn file_write(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::FileWrite {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn file_read(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::FileRead {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::FileWrite { .. } => "file_write_error",
            RecorderError::FileRead { .. } => "file_read_error",
            RecorderError::RecordingNotFound(_) => "recording_not_found",
            RecorderError::SessionNotFound(_) => "session_not_found",
            RecorderError::TrackNotFound { .. } => "track_not_found",
            RecorderError::SessionAlreadyExists(_) => "session_already_exists",
            RecorderError::InvalidSessionId(_) => "invalid_session_id",
            RecorderError::ChunkWriteFailed => "chunk_write_failed",
            RecorderError::PermissionDenied(_) => "permission_denied",
            RecorderError::DeviceUnavailable(_) => "device_unavailable",
            RecorderError::NoAudioTrack(_) => "no_audio_track",
            RecorderError::NoActiveSession => "no_active_session",
            RecorderError::AlreadyRecording => "already_recording",
            RecorderError::InvalidFormat(_) => "invalid_format",
            RecorderError::InvalidWavHeader(_) => "invalid_wav_header",
            RecorderError::Transport(_) => "transport_error",
        }
    }

    /// True for the not-found family (session, track, recording)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RecorderError::RecordingNotFound(_)
                | RecorderError::SessionNotFound(_)
                | RecorderError::TrackNotFound { .. }
        )
    }
}

/// Error body returned over the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&RecorderError> for ErrorResponse {
    fn from(error: &RecorderError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecorderError
pub type Result<T> = std::result::Result<T, RecorderError>;
