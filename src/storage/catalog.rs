use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::engine::RECORDINGS_DIR;
use super::types::RecordingMetadata;
use crate::error::{RecorderError, Result};

/// Catalog file name inside the recordings directory
pub const CATALOG_FILE: &str = "recordings.json";

/// Ordered list of completed recordings, persisted as one JSON file
#[derive(Debug, Clone)]
pub struct RecordingCatalog {
    path: PathBuf,
}

impl RecordingCatalog {
    pub fn new(recordings_dir: impl AsRef<Path>) -> Self {
        Self {
            path: recordings_dir.as_ref().join(CATALOG_FILE),
        }
    }

    /// Catalog at `<data_dir>/recordings/recordings.json`
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(RECORDINGS_DIR))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_recordings(&self) -> Result<Vec<RecordingMetadata>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| RecorderError::file_read(&self.path, e))?;
        serde_json::from_str(&raw).map_err(|e| RecorderError::file_read(&self.path, e))
    }

    pub fn get_recording(&self, recording_id: &str) -> Result<RecordingMetadata> {
        self.get_recordings()?
            .into_iter()
            .find(|r| r.id == recording_id)
            .ok_or_else(|| RecorderError::RecordingNotFound(recording_id.to_string()))
    }

    pub fn add_recording(&self, metadata: RecordingMetadata) -> Result<()> {
        let mut recordings = self.get_recordings()?;
        info!("Adding recording {} to catalog", metadata.id);
        recordings.push(metadata);
        self.persist(&recordings)
    }

    /// Delete the recording's files and drop it from the catalog.
    ///
    /// An unknown id fails without touching the catalog file.
    pub fn delete_recording(&self, recording_id: &str) -> Result<()> {
        let mut recordings = self.get_recordings()?;
        let index = recordings
            .iter()
            .position(|r| r.id == recording_id)
            .ok_or_else(|| RecorderError::RecordingNotFound(recording_id.to_string()))?;

        let recording = &recordings[index];
        let target = PathBuf::from(&recording.file_path);

        if recording.tracks.is_empty() {
            // Legacy single-file recording
            if target.is_file() {
                fs::remove_file(&target).map_err(|e| RecorderError::file_write(&target, e))?;
            }
        } else if target.is_dir() {
            fs::remove_dir_all(&target).map_err(|e| RecorderError::file_write(&target, e))?;
        } else {
            warn!("Recording {} has no directory at {:?}", recording_id, target);
        }

        recordings.remove(index);
        self.persist(&recordings)?;

        info!("Deleted recording {}", recording_id);
        Ok(())
    }

    fn persist(&self, recordings: &[RecordingMetadata]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| RecorderError::file_write(dir, e))?;
        }

        let json = serde_json::to_string_pretty(recordings)
            .map_err(|e| RecorderError::file_write(&self.path, e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| RecorderError::file_write(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| RecorderError::file_write(&self.path, e))
    }
}
