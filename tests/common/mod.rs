// Shared test doubles: an in-memory transport and scripted audio backends

#![allow(dead_code)]

use cross_recorder::audio::{
    AudioBackend, AudioBackendFactory, TrackEndedNotifier, TrackKind, TrackSpec,
};
use cross_recorder::error::{RecorderError, Result};
use cross_recorder::storage::{RecordingConfig, RecordingMetadata};
use cross_recorder::transport::{
    ChunkUpload, RecorderTransport, SaveChunkResponse, StartSessionResponse, SuccessResponse,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Transport that records every call and can be told to fail
#[derive(Default)]
pub struct MockTransport {
    pub started: Mutex<Vec<(String, Vec<TrackSpec>)>>,
    pub chunks: Mutex<Vec<ChunkUpload>>,
    pub finalized: Mutex<Vec<(String, BTreeMap<TrackKind, u64>)>>,
    pub cancelled: Mutex<Vec<String>>,
    /// Zero-based chunk call that fails
    pub fail_chunk_at: Mutex<Option<usize>>,
    /// Zero-based chunk call answered with `success: false`
    pub respond_unsuccessful_at: Mutex<Option<usize>>,
    pub fail_start: Mutex<bool>,
    /// Delay applied to every chunk call
    pub chunk_delay: Mutex<Option<Duration>>,
    calls: Mutex<usize>,
    in_flight: Mutex<usize>,
    max_in_flight: Mutex<usize>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_chunk_at(index: usize) -> Arc<Self> {
        let transport = Self::default();
        *transport.fail_chunk_at.lock() = Some(index);
        Arc::new(transport)
    }

    pub fn unsuccessful_chunk_at(index: usize) -> Arc<Self> {
        let transport = Self::default();
        *transport.respond_unsuccessful_at.lock() = Some(index);
        Arc::new(transport)
    }

    pub fn chunk_calls(&self) -> usize {
        *self.calls.lock()
    }

    /// Most chunk calls that were ever running at the same time
    pub fn max_in_flight(&self) -> usize {
        *self.max_in_flight.lock()
    }

    pub fn sessions_sent(&self) -> Vec<String> {
        self.chunks.lock().iter().map(|c| c.session_id.clone()).collect()
    }

    pub fn indices_for(&self, track: TrackKind) -> Vec<u64> {
        self.chunks
            .lock()
            .iter()
            .filter(|c| c.track_kind == track)
            .map(|c| c.chunk_index)
            .collect()
    }

    async fn store_chunk(&self, chunk: ChunkUpload) -> Result<SaveChunkResponse> {
        let call = {
            let mut calls = self.calls.lock();
            let call = *calls;
            *calls += 1;
            call
        };

        let delay = *self.chunk_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_chunk_at.lock() == Some(call) {
            return Err(RecorderError::file_write("/tmp/mic.wav", "disk full"));
        }
        if *self.respond_unsuccessful_at.lock() == Some(call) {
            return Ok(SaveChunkResponse {
                success: false,
                bytes_written: 0,
            });
        }

        let bytes_written = chunk.pcm.len() as u64;
        self.chunks.lock().push(chunk);
        Ok(SaveChunkResponse {
            success: true,
            bytes_written,
        })
    }
}

#[async_trait::async_trait]
impl RecorderTransport for MockTransport {
    async fn start_recording_session(
        &self,
        session_id: &str,
        _config: &RecordingConfig,
        tracks: &[TrackSpec],
    ) -> Result<StartSessionResponse> {
        if *self.fail_start.lock() {
            return Err(RecorderError::file_write("/readonly", "read-only file system"));
        }
        self.started
            .lock()
            .push((session_id.to_string(), tracks.to_vec()));
        Ok(StartSessionResponse {
            success: true,
            file_path: format!("/tmp/{}", session_id),
        })
    }

    async fn save_recording_chunk(&self, chunk: ChunkUpload) -> Result<SaveChunkResponse> {
        {
            let mut in_flight = self.in_flight.lock();
            *in_flight += 1;
            let mut max = self.max_in_flight.lock();
            *max = (*max).max(*in_flight);
        }
        let result = self.store_chunk(chunk).await;
        *self.in_flight.lock() -= 1;
        result
    }

    async fn finalize_recording(
        &self,
        session_id: &str,
        config: &RecordingConfig,
        total_chunks: &BTreeMap<TrackKind, u64>,
    ) -> Result<RecordingMetadata> {
        self.finalized
            .lock()
            .push((session_id.to_string(), total_chunks.clone()));
        Ok(RecordingMetadata {
            id: session_id.to_string(),
            file_name: "2024-01-01T00-00-00".to_string(),
            file_path: "/tmp/2024-01-01T00-00-00".to_string(),
            tracks: Vec::new(),
            created_at: chrono::Utc::now(),
            duration_ms: 0,
            file_size_bytes: 0,
            config: config.clone(),
        })
    }

    async fn cancel_recording(&self, session_id: &str) -> Result<SuccessResponse> {
        self.cancelled.lock().push(session_id.to_string());
        Ok(SuccessResponse::ok())
    }

    async fn get_recordings(&self) -> Result<Vec<RecordingMetadata>> {
        Ok(Vec::new())
    }

    async fn delete_recording(&self, recording_id: &str) -> Result<SuccessResponse> {
        Err(RecorderError::RecordingNotFound(recording_id.to_string()))
    }
}

/// Backend that emits a fixed list of buffers, then stays open until stopped
/// (or ends the track when `end_after_buffers` is set)
pub struct ScriptedBackend {
    buffers: Vec<Vec<u8>>,
    end_after_buffers: bool,
    stopped: Arc<Mutex<Vec<TrackKind>>>,
    track: TrackKind,
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedBackend {
    async fn start(&mut self, ended: TrackEndedNotifier) -> Result<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(self.buffers.len().max(1));
        for buffer in self.buffers.drain(..) {
            let _ = tx.try_send(buffer);
        }
        if self.end_after_buffers {
            ended.notify();
        } else {
            self.tx = Some(tx);
        }
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        // Dropping the sender lets the forwarder finish
        self.tx = None;
        self.stopped.lock().push(self.track);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Factory handing out `ScriptedBackend`s; tracks in `deny` fail to start
#[derive(Default)]
pub struct ScriptedFactory {
    pub buffers: Mutex<BTreeMap<TrackKind, Vec<Vec<u8>>>>,
    pub deny: Mutex<HashSet<TrackKind>>,
    pub ending: Mutex<HashSet<TrackKind>>,
    pub created: Mutex<Vec<TrackKind>>,
    pub stopped: Arc<Mutex<Vec<TrackKind>>>,
}

impl ScriptedFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_buffers(self: &Arc<Self>, track: TrackKind, buffers: Vec<Vec<u8>>) -> Arc<Self> {
        self.buffers.lock().insert(track, buffers);
        Arc::clone(self)
    }

    pub fn deny(self: &Arc<Self>, track: TrackKind) -> Arc<Self> {
        self.deny.lock().insert(track);
        Arc::clone(self)
    }

    /// The track terminates on its own right after delivering its buffers
    pub fn ending(self: &Arc<Self>, track: TrackKind) -> Arc<Self> {
        self.ending.lock().insert(track);
        Arc::clone(self)
    }
}

impl AudioBackendFactory for ScriptedFactory {
    fn create(&self, track: TrackKind, _config: &RecordingConfig) -> Result<Box<dyn AudioBackend>> {
        self.created.lock().push(track);
        if self.deny.lock().contains(&track) {
            return Err(RecorderError::PermissionDenied(format!(
                "{} access denied",
                track
            )));
        }

        Ok(Box::new(ScriptedBackend {
            buffers: self.buffers.lock().remove(&track).unwrap_or_default(),
            end_after_buffers: self.ending.lock().contains(&track),
            stopped: Arc::clone(&self.stopped),
            track,
            tx: None,
        }))
    }
}

/// Poll `condition` until it holds or a second has passed
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Write a 16-bit PCM WAV with `frames` frames of a ramp signal
pub fn write_test_wav(
    path: &std::path::Path,
    sample_rate: u32,
    channels: u16,
    frames: usize,
) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..frames {
        for _ in 0..channels {
            writer.write_sample((i % 1000) as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}
