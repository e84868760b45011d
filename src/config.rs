use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::DEFAULT_BUFFER_FRAMES;
use crate::recording::CaptureFormat;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cross-recorder";

/// Prefix for environment overrides, e.g. `CROSS_RECORDER__SERVICE__HTTP__PORT`
pub const ENV_PREFIX: &str = "CROSS_RECORDER";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub recording: RecordingDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root data directory; `~` is expanded
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingDefaults {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Frames per PCM buffer handed over by a capture source
    pub buffer_frames: usize,
    /// Pace file-backed sources at wall-clock speed
    pub realtime: bool,
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }
}

impl RecordingDefaults {
    pub fn format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_depth: self.bit_depth,
        }
    }
}

impl Config {
    /// Defaults, then the config file (optional unless given explicitly), then env
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .set_default("service.name", "cross-recorder")?
            .set_default("service.log_level", "info")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 7878_i64)?
            .set_default("storage.data_dir", "~/cross-recorder")?
            .set_default("recording.sample_rate", 48000_i64)?
            .set_default("recording.channels", 2_i64)?
            .set_default("recording.bit_depth", 16_i64)?
            .set_default("recording.buffer_frames", DEFAULT_BUFFER_FRAMES as i64)?
            .set_default("recording.realtime", true)?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load(None).unwrap();

        assert_eq!(cfg.service.http.port, 7878);
        assert_eq!(cfg.recording.format(), CaptureFormat::default());
        assert_eq!(cfg.recording.buffer_frames, DEFAULT_BUFFER_FRAMES);
        assert!(cfg.storage.data_dir().ends_with("cross-recorder"));
        assert!(!cfg.storage.data_dir().starts_with("~"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("recorder.toml");
        std::fs::write(
            &path,
            "[storage]\ndata_dir = \"/var/lib/recorder\"\n\n[recording]\nsample_rate = 44100\n",
        )
        .unwrap();

        let cfg = Config::load(path.to_str()).unwrap();

        assert_eq!(cfg.storage.data_dir(), PathBuf::from("/var/lib/recorder"));
        assert_eq!(cfg.recording.sample_rate, 44100);
        assert_eq!(cfg.recording.channels, 2);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Config::load(Some("/no/such/recorder.toml")).is_err());
    }
}
