//! Storage side of the recorder
//!
//! - `StorageEngine`: live sessions and their open track files
//! - `RecordingCatalog`: the persisted list of finished recordings
//! - `Preferences`: the saved default recording config

mod catalog;
mod engine;
mod preferences;
mod types;

pub use catalog::{RecordingCatalog, CATALOG_FILE};
pub use engine::{timestamp_dir_name, StorageEngine, RECORDINGS_DIR};
pub use preferences::{Preferences, PREFERENCES_FILE};
pub use types::{
    RecordingConfig, RecordingMetadata, TrackInfo, DEFAULT_BIT_DEPTH, DEFAULT_CHANNELS,
    DEFAULT_SAMPLE_RATE,
};
