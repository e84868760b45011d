use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::{TrackKind, TrackSpec};

pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_BIT_DEPTH: u16 = 16;
pub const DEFAULT_CHANNELS: u16 = 2;

/// Format and sources of one recording. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub mic_enabled: bool,
    pub system_audio_enabled: bool,
    pub mic_device_id: Option<String>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bit_depth: DEFAULT_BIT_DEPTH,
            mic_enabled: true,
            system_audio_enabled: false,
            mic_device_id: None,
        }
    }
}

impl RecordingConfig {
    /// Tracks enabled by this config, mic first
    pub fn tracks(&self) -> Vec<TrackSpec> {
        let mut tracks = Vec::new();
        if self.mic_enabled {
            tracks.push(TrackSpec::from(TrackKind::Mic));
        }
        if self.system_audio_enabled {
            tracks.push(TrackSpec::from(TrackKind::System));
        }
        tracks
    }
}

/// Final state of one track file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub track_kind: TrackKind,
    pub file_name: String,
    pub file_path: String,
    pub channels: u16,
    pub file_size_bytes: u64,
}

/// A completed recording as listed in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub id: String,
    pub file_name: String,
    /// Renamed session directory (or the file itself for legacy entries)
    pub file_path: String,
    /// Empty for legacy single-file recordings
    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub file_size_bytes: u64,
    pub config: RecordingConfig,
}
