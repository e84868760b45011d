pub mod backend;
pub mod file;
pub mod wav;

pub use backend::{
    AudioBackend, AudioBackendFactory, TrackEndedCallback, TrackEndedNotifier, TrackKind,
    TrackSpec,
};
pub use file::{AudioFile, FileBackend, FileBackendFactory, DEFAULT_BUFFER_FRAMES};
pub use wav::{duration_ms, WavHeader, MAX_DATA_SIZE, SUPPORTED_BIT_DEPTHS, WAV_HEADER_SIZE};
