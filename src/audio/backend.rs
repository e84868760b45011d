use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::storage::RecordingConfig;

/// Independently captured audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Microphone input
    Mic,
    /// System audio (applications, browser, etc.)
    System,
}

impl TrackKind {
    /// Fixed channel count for this kind of track
    pub fn channels(self) -> u16 {
        match self {
            TrackKind::Mic => 1,
            TrackKind::System => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackKind::Mic => "mic",
            TrackKind::System => "system",
        }
    }

    /// File name of this track inside a session directory
    pub fn file_name(self) -> String {
        format!("{}.wav", self.as_str())
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A track declared when a storage session is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSpec {
    pub track_kind: TrackKind,
    pub channels: u16,
}

impl From<TrackKind> for TrackSpec {
    fn from(track_kind: TrackKind) -> Self {
        Self {
            track_kind,
            channels: track_kind.channels(),
        }
    }
}

pub type TrackEndedCallback = Arc<dyn Fn(TrackKind) + Send + Sync>;

/// One-shot "track ended" signal handed to a backend before it starts.
///
/// Fires at most once, and never after the owner has disarmed it.
#[derive(Clone)]
pub struct TrackEndedNotifier {
    track: TrackKind,
    callback: Option<TrackEndedCallback>,
    armed: Arc<AtomicBool>,
}

impl TrackEndedNotifier {
    pub fn new(track: TrackKind, callback: Option<TrackEndedCallback>) -> Self {
        Self {
            track,
            callback,
            armed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn track(&self) -> TrackKind {
        self.track
    }

    pub fn notify(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(callback) = &self.callback {
                callback(self.track);
            }
        }
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TrackEndedNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackEndedNotifier")
            .field("track", &self.track)
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Media stream for a single track
///
/// Implementations deliver interleaved 16-bit little-endian PCM buffers over
/// the returned channel and must never block the delivering thread on I/O.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing. `ended` is already registered when this is called,
    /// so a stream that terminates immediately is still reported.
    async fn start(&mut self, ended: TrackEndedNotifier) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Stop capturing. Buffers already sent stay readable from the receiver.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Creates the backend that captures a given track
pub trait AudioBackendFactory: Send + Sync {
    fn create(&self, track: TrackKind, config: &RecordingConfig) -> Result<Box<dyn AudioBackend>>;
}
