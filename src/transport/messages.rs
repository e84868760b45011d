use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::audio::{TrackKind, TrackSpec};
use crate::error::{RecorderError, Result};
use crate::storage::RecordingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub session_id: String,
    pub config: RecordingConfig,
    pub tracks: Vec<TrackSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub success: bool,
    pub file_path: String,
}

/// One PCM chunk for one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUpload {
    pub session_id: String,
    pub track_kind: TrackKind,
    pub chunk_index: u64,
    pub pcm: Vec<u8>,
}

/// `ChunkUpload` as it travels over the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChunkRequest {
    pub session_id: String,
    pub track_kind: TrackKind,
    pub chunk_index: u64,
    pub pcm_data: String, // Base64-encoded PCM bytes
}

impl From<&ChunkUpload> for SaveChunkRequest {
    fn from(chunk: &ChunkUpload) -> Self {
        Self {
            session_id: chunk.session_id.clone(),
            track_kind: chunk.track_kind,
            chunk_index: chunk.chunk_index,
            pcm_data: base64::engine::general_purpose::STANDARD.encode(&chunk.pcm),
        }
    }
}

impl SaveChunkRequest {
    pub fn into_upload(self) -> Result<ChunkUpload> {
        let pcm = base64::engine::general_purpose::STANDARD
            .decode(self.pcm_data.as_bytes())
            .map_err(|e| RecorderError::Transport(format!("invalid pcmData: {}", e)))?;

        Ok(ChunkUpload {
            session_id: self.session_id,
            track_kind: self.track_kind,
            chunk_index: self.chunk_index,
            pcm,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChunkResponse {
    pub success: bool,
    /// Bytes written by this chunk
    pub bytes_written: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub config: RecordingConfig,
    pub total_chunks: BTreeMap<TrackKind, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
