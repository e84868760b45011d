use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::messages::{ChunkUpload, SaveChunkResponse, StartSessionResponse, SuccessResponse};
use super::RecorderTransport;
use crate::audio::{TrackKind, TrackSpec};
use crate::error::Result;
use crate::storage::{RecordingCatalog, RecordingConfig, RecordingMetadata, StorageEngine};

/// Storage side of the transport, served in-process
pub struct LocalTransport {
    engine: Mutex<StorageEngine>,
    catalog: Mutex<RecordingCatalog>,
}

impl LocalTransport {
    pub fn new(engine: StorageEngine, catalog: RecordingCatalog) -> Self {
        Self {
            engine: Mutex::new(engine),
            catalog: Mutex::new(catalog),
        }
    }

    /// Engine and catalog under `<data_dir>/recordings`
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self::new(
            StorageEngine::for_data_dir(data_dir),
            RecordingCatalog::for_data_dir(data_dir),
        )
    }

    pub async fn active_sessions(&self) -> usize {
        self.engine.lock().await.active_sessions()
    }
}

#[async_trait::async_trait]
impl RecorderTransport for LocalTransport {
    async fn start_recording_session(
        &self,
        session_id: &str,
        config: &RecordingConfig,
        tracks: &[TrackSpec],
    ) -> Result<StartSessionResponse> {
        let dir = self
            .engine
            .lock()
            .await
            .start_session(session_id, config, tracks)?;

        Ok(StartSessionResponse {
            success: true,
            file_path: dir.display().to_string(),
        })
    }

    async fn save_recording_chunk(&self, chunk: ChunkUpload) -> Result<SaveChunkResponse> {
        debug!(
            "Chunk {} for {} track of {} ({} bytes)",
            chunk.chunk_index,
            chunk.track_kind,
            chunk.session_id,
            chunk.pcm.len()
        );

        let bytes_written = self.engine.lock().await.write_chunk(
            &chunk.session_id,
            chunk.track_kind,
            &chunk.pcm,
        )?;

        Ok(SaveChunkResponse {
            success: true,
            bytes_written,
        })
    }

    async fn finalize_recording(
        &self,
        session_id: &str,
        config: &RecordingConfig,
        total_chunks: &BTreeMap<TrackKind, u64>,
    ) -> Result<RecordingMetadata> {
        let metadata = self
            .engine
            .lock()
            .await
            .finalize_recording(session_id, config, total_chunks)?;

        self.catalog
            .lock()
            .await
            .add_recording(metadata.clone())?;

        info!("Recording {} saved to {}", metadata.id, metadata.file_path);
        Ok(metadata)
    }

    async fn cancel_recording(&self, session_id: &str) -> Result<SuccessResponse> {
        self.engine.lock().await.cancel_session(session_id)?;
        Ok(SuccessResponse::ok())
    }

    async fn get_recordings(&self) -> Result<Vec<RecordingMetadata>> {
        self.catalog.lock().await.get_recordings()
    }

    async fn delete_recording(&self, recording_id: &str) -> Result<SuccessResponse> {
        self.catalog.lock().await.delete_recording(recording_id)?;
        Ok(SuccessResponse::ok())
    }
}
