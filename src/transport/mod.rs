//! Request/response boundary between the capture side and the storage side
//!
//! The channel is assumed reliable and ordered; retries and timeouts belong to
//! whoever implements it.

mod local;
pub mod messages;

use std::collections::BTreeMap;

use crate::audio::{TrackKind, TrackSpec};
use crate::error::Result;
use crate::storage::{RecordingConfig, RecordingMetadata};

pub use local::LocalTransport;
pub use messages::{
    ChunkUpload, FinalizeRequest, SaveChunkRequest, SaveChunkResponse, StartSessionRequest,
    StartSessionResponse, SuccessResponse,
};

#[async_trait::async_trait]
pub trait RecorderTransport: Send + Sync {
    async fn start_recording_session(
        &self,
        session_id: &str,
        config: &RecordingConfig,
        tracks: &[TrackSpec],
    ) -> Result<StartSessionResponse>;

    async fn save_recording_chunk(&self, chunk: ChunkUpload) -> Result<SaveChunkResponse>;

    /// Finalize the session's files and add the recording to the catalog
    async fn finalize_recording(
        &self,
        session_id: &str,
        config: &RecordingConfig,
        total_chunks: &BTreeMap<TrackKind, u64>,
    ) -> Result<RecordingMetadata>;

    async fn cancel_recording(&self, session_id: &str) -> Result<SuccessResponse>;

    async fn get_recordings(&self) -> Result<Vec<RecordingMetadata>>;

    async fn delete_recording(&self, recording_id: &str) -> Result<SuccessResponse>;
}
