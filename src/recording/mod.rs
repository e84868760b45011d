//! Capture side of the recorder
//!
//! - `ChunkQueue`: ordered, non-blocking hand-off of PCM chunks to storage
//! - `CaptureOrchestrator`: per-track acquisition and teardown
//! - `RecordingController`: drives the orchestrator from session state changes

mod chunk_queue;
mod controller;
mod orchestrator;

pub use chunk_queue::{ChunkQueue, QueueErrorCallback};
pub use controller::{ControllerHandle, RecordingController};
pub use orchestrator::{AsyncErrorCallback, CaptureFormat, CaptureOrchestrator, StartRequest};
