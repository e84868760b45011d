use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::chunk_queue::ChunkQueue;
use crate::audio::{
    AudioBackend, AudioBackendFactory, TrackEndedCallback, TrackEndedNotifier, TrackKind,
    TrackSpec,
};
use crate::error::{RecorderError, Result};
use crate::storage::{RecordingConfig, RecordingMetadata, DEFAULT_BIT_DEPTH, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};
use crate::transport::RecorderTransport;

pub type AsyncErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Which sources to capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub mic_enabled: bool,
    pub system_audio_enabled: bool,
    pub mic_device_id: Option<String>,
}

impl StartRequest {
    pub fn for_tracks(tracks: &[TrackKind], mic_device_id: Option<String>) -> Self {
        Self {
            mic_enabled: tracks.contains(&TrackKind::Mic),
            system_audio_enabled: tracks.contains(&TrackKind::System),
            mic_device_id,
        }
    }
}

/// Audio format applied to every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bit_depth: DEFAULT_BIT_DEPTH,
        }
    }
}

struct TrackCapture {
    track: TrackKind,
    backend: Box<dyn AudioBackend>,
    ended: TrackEndedNotifier,
    forwarder: Option<JoinHandle<()>>,
}

struct ActiveSession {
    session_id: String,
    config: RecordingConfig,
    tracks: Vec<TrackKind>,
    queue: ChunkQueue,
    captures: Vec<TrackCapture>,
    started_at: Instant,
}

/// Acquires per-track streams and wires them into a chunk queue
pub struct CaptureOrchestrator {
    transport: Arc<dyn RecorderTransport>,
    backends: Arc<dyn AudioBackendFactory>,
    format: CaptureFormat,
    active: Option<ActiveSession>,
    on_track_ended: Option<TrackEndedCallback>,
    on_error: Option<AsyncErrorCallback>,
}

impl CaptureOrchestrator {
    pub fn new(
        transport: Arc<dyn RecorderTransport>,
        backends: Arc<dyn AudioBackendFactory>,
        format: CaptureFormat,
    ) -> Self {
        Self {
            transport,
            backends,
            format,
            active: None,
            on_track_ended: None,
            on_error: None,
        }
    }

    /// Called with the track kind when a live track terminates on its own
    pub fn on_track_ended<F>(&mut self, callback: F)
    where
        F: Fn(TrackKind) + Send + Sync + 'static,
    {
        self.on_track_ended = Some(Arc::new(callback));
    }

    /// Called with a reason when persistence fails mid-session
    pub fn on_error<F>(&mut self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
    }

    /// Open a storage session and acquire every requested track, in order.
    ///
    /// On any failure everything acquired so far is released and the storage
    /// session is cancelled before the error is returned.
    pub async fn start(&mut self, request: StartRequest) -> Result<String> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let config = RecordingConfig {
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
            bit_depth: self.format.bit_depth,
            mic_enabled: request.mic_enabled,
            system_audio_enabled: request.system_audio_enabled,
            mic_device_id: request.mic_device_id,
        };

        let tracks: Vec<TrackSpec> = config.tracks();
        if tracks.is_empty() {
            return Err(RecorderError::NoAudioTrack(
                "no audio source enabled".to_string(),
            ));
        }

        let session_id = uuid::Uuid::new_v4().simple().to_string();
        info!(
            "Starting session {} with tracks {:?}",
            session_id,
            tracks.iter().map(|t| t.track_kind).collect::<Vec<_>>()
        );

        let queue = ChunkQueue::new(Arc::clone(&self.transport));
        if let Some(on_error) = self.on_error.clone() {
            queue.on_error(move |err| on_error(err.code().to_string()));
        }

        let mut captures = Vec::with_capacity(tracks.len());
        let acquired = self
            .acquire(&session_id, &config, &tracks, &queue, &mut captures)
            .await;

        if let Err(e) = acquired {
            warn!("Acquisition failed for session {}: {}", session_id, e);
            teardown(&mut captures).await;
            queue.reset();
            if let Err(cancel_err) = self.transport.cancel_recording(&session_id).await {
                error!("Failed to cancel session {}: {}", session_id, cancel_err);
            }
            return Err(e);
        }

        self.active = Some(ActiveSession {
            session_id: session_id.clone(),
            config,
            tracks: tracks.iter().map(|t| t.track_kind).collect(),
            queue,
            captures,
            started_at: Instant::now(),
        });

        info!("Session {} recording", session_id);
        Ok(session_id)
    }

    async fn acquire(
        &self,
        session_id: &str,
        config: &RecordingConfig,
        tracks: &[TrackSpec],
        queue: &ChunkQueue,
        captures: &mut Vec<TrackCapture>,
    ) -> Result<()> {
        self.transport
            .start_recording_session(session_id, config, tracks)
            .await?;

        for spec in tracks {
            let track = spec.track_kind;
            let mut backend = self.backends.create(track, config)?;

            // Registered before start() so an immediate termination is seen
            let ended = TrackEndedNotifier::new(track, self.on_track_ended.clone());
            let mut rx = match backend.start(ended.clone()).await {
                Ok(rx) => rx,
                Err(e) => {
                    ended.disarm();
                    if let Err(stop_err) = backend.stop().await {
                        warn!("Failed to stop {} backend: {}", track, stop_err);
                    }
                    return Err(e);
                }
            };

            debug!("{} track acquired via {}", track, backend.name());

            let queue = queue.clone();
            let sid = session_id.to_string();
            let forwarder = tokio::spawn(async move {
                while let Some(pcm) = rx.recv().await {
                    queue.enqueue(&sid, track, pcm);
                }
            });

            captures.push(TrackCapture {
                track,
                backend,
                ended,
                forwarder: Some(forwarder),
            });
        }

        Ok(())
    }

    /// Stop capture, flush pending chunks, and finalize the recording
    pub async fn stop(&mut self) -> Result<RecordingMetadata> {
        let mut session = self.active.take().ok_or(RecorderError::NoActiveSession)?;
        info!("Stopping session {}", session.session_id);

        teardown(&mut session.captures).await;
        session.queue.flush().await;

        if session.queue.is_errored() {
            warn!(
                "Session {} lost chunks after a write failure; finalizing what was stored",
                session.session_id
            );
        }

        let total_chunks = session.queue.chunk_counts();
        self.transport
            .finalize_recording(&session.session_id, &session.config, &total_chunks)
            .await
    }

    /// Discard the active session, if any
    pub async fn cancel(&mut self) -> Result<()> {
        let Some(mut session) = self.active.take() else {
            return Ok(());
        };
        info!("Cancelling session {}", session.session_id);

        teardown(&mut session.captures).await;
        session.queue.reset();
        self.transport
            .cancel_recording(&session.session_id)
            .await
            .map(|_| ())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.session_id.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn tracks(&self) -> Vec<TrackKind> {
        self.active
            .as_ref()
            .map(|s| s.tracks.clone())
            .unwrap_or_default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.active
            .as_ref()
            .map_or(0, |s| s.started_at.elapsed().as_millis() as u64)
    }

    pub fn total_bytes(&self) -> u64 {
        self.active.as_ref().map_or(0, |s| s.queue.total_bytes())
    }

    pub fn chunk_counts(&self) -> BTreeMap<TrackKind, u64> {
        self.active
            .as_ref()
            .map(|s| s.queue.chunk_counts())
            .unwrap_or_default()
    }
}

/// Disarm track-ended signals, stop every backend, and wait for the
/// forwarders to hand over whatever was already captured
async fn teardown(captures: &mut [TrackCapture]) {
    for capture in captures.iter() {
        capture.ended.disarm();
    }

    for capture in captures.iter_mut() {
        if let Err(e) = capture.backend.stop().await {
            warn!("Failed to stop {} backend: {}", capture.track, e);
        }
    }

    let forwarders = captures.iter_mut().filter_map(|c| c.forwarder.take());
    for result in join_all(forwarders).await {
        if let Err(e) = result {
            error!("Capture forwarder panicked: {}", e);
        }
    }
}
