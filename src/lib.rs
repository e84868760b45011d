pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod recording;
pub mod session;
pub mod storage;
pub mod transport;

pub use audio::{
    AudioBackend, AudioBackendFactory, AudioFile, FileBackendFactory, TrackEndedNotifier,
    TrackKind, TrackSpec, WavHeader,
};
pub use config::Config;
pub use error::{RecorderError, Result};
pub use http::{create_router, AppState};
pub use recording::{
    CaptureFormat, CaptureOrchestrator, ChunkQueue, ControllerHandle, RecordingController,
    StartRequest,
};
pub use session::{transition, RecordingSession, SessionEvent, SessionState};
pub use storage::{RecordingCatalog, RecordingConfig, RecordingMetadata, StorageEngine, TrackInfo};
pub use transport::{LocalTransport, RecorderTransport};
