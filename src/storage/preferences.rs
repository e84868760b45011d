use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::types::RecordingConfig;
use crate::error::{RecorderError, Result};

/// Preferences file name inside the data directory
pub const PREFERENCES_FILE: &str = "config.json";

/// The user's default recording config, kept across runs
#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
}

impl Preferences {
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(PREFERENCES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved config, or defaults if nothing has been saved yet
    pub fn load(&self) -> Result<RecordingConfig> {
        if !self.path.exists() {
            debug!("No preferences at {:?}, using defaults", self.path);
            return Ok(RecordingConfig::default());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| RecorderError::file_read(&self.path, e))?;
        serde_json::from_str(&raw).map_err(|e| RecorderError::file_read(&self.path, e))
    }

    pub fn save(&self, config: &RecordingConfig) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| RecorderError::file_write(dir, e))?;
        }
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| RecorderError::file_write(&self.path, e))?;
        fs::write(&self.path, json).map_err(|e| RecorderError::file_write(&self.path, e))
    }
}
