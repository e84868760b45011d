// Serialized chunk delivery
//
// Capture callbacks hand PCM buffers to `enqueue`, which never waits on I/O.
// A single drain task sends queued chunks one at a time, assigning each
// track's next chunk index right before its send. The first failed send
// poisons the queue: pending chunks are dropped, later enqueues are ignored,
// and the error callback runs once.
//
// `reset` never starts a second drain while a send is still awaiting the
// transport. The running drain discards that send's outcome and carries on
// with whatever the next session queues.

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

use crate::audio::TrackKind;
use crate::error::RecorderError;
use crate::transport::{ChunkUpload, RecorderTransport};

pub type QueueErrorCallback = Arc<dyn Fn(&RecorderError) + Send + Sync>;

struct QueueEntry {
    session_id: String,
    track: TrackKind,
    pcm: Vec<u8>,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<QueueEntry>,
    draining: bool,
    errored: bool,
    chunk_indices: BTreeMap<TrackKind, u64>,
    total_bytes: u64,
    /// Bumped by `reset` so the outcome of a send from before it is discarded
    generation: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    idle: Notify,
    transport: Arc<dyn RecorderTransport>,
    on_error: Mutex<Option<QueueErrorCallback>>,
}

/// Per-session send queue with first-error-wins semantics
#[derive(Clone)]
pub struct ChunkQueue {
    shared: Arc<Shared>,
}

impl ChunkQueue {
    pub fn new(transport: Arc<dyn RecorderTransport>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
                transport,
                on_error: Mutex::new(None),
            }),
        }
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&RecorderError) + Send + Sync + 'static,
    {
        *self.shared.on_error.lock() = Some(Arc::new(callback));
    }

    /// Queue a PCM buffer. Never blocks; dropped silently once errored.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, session_id: &str, track: TrackKind, pcm: Vec<u8>) {
        let generation = {
            let mut state = self.shared.state.lock();
            if state.errored {
                trace!("Dropping {} chunk: queue has errored", track);
                return;
            }

            state.entries.push_back(QueueEntry {
                session_id: session_id.to_string(),
                track,
                pcm,
            });

            if state.draining {
                return;
            }
            state.draining = true;
            state.generation
        };

        tokio::spawn(drain(Arc::clone(&self.shared), generation));
    }

    /// Resolve once every queued chunk has been sent, or the queue has errored
    pub async fn flush(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.state.lock();
                if state.errored || (!state.draining && state.entries.is_empty()) {
                    return;
                }
            }

            notified.await;
        }
    }

    /// Clear queue, counters and error state for a new session.
    ///
    /// A drain still awaiting a send keeps running, so sends stay serialized.
    pub fn reset(&self) {
        {
            let mut state = self.shared.state.lock();
            let generation = state.generation.wrapping_add(1);
            let draining = state.draining;
            *state = QueueState {
                generation,
                draining,
                ..QueueState::default()
            };
        }
        self.shared.idle.notify_waiters();
    }

    /// Sum of bytes the storage side reported as written
    pub fn total_bytes(&self) -> u64 {
        self.shared.state.lock().total_bytes
    }

    /// Chunks handed to the transport so far, per track
    pub fn chunk_counts(&self) -> BTreeMap<TrackKind, u64> {
        self.shared.state.lock().chunk_indices.clone()
    }

    pub fn is_errored(&self) -> bool {
        self.shared.state.lock().errored
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().entries.len()
    }
}

async fn drain(shared: Arc<Shared>, mut generation: u64) {
    loop {
        let upload = {
            let mut state = shared.state.lock();
            if state.generation != generation {
                debug!("Queue was reset; draining the new session's chunks");
                generation = state.generation;
            }

            let Some(entry) = state.entries.pop_front() else {
                state.draining = false;
                drop(state);
                shared.idle.notify_waiters();
                return;
            };

            let counter = state.chunk_indices.entry(entry.track).or_insert(0);
            let chunk_index = *counter;
            *counter += 1;

            ChunkUpload {
                session_id: entry.session_id,
                track_kind: entry.track,
                chunk_index,
                pcm: entry.pcm,
            }
        };

        let track = upload.track_kind;
        let chunk_index = upload.chunk_index;
        let outcome = shared.transport.save_recording_chunk(upload).await;

        let reason = {
            let mut state = shared.state.lock();
            if state.generation != generation {
                trace!("Ignoring outcome of {} chunk {} sent before reset", track, chunk_index);
                continue;
            }

            let reason = match outcome {
                Ok(response) if response.success => {
                    state.total_bytes += response.bytes_written;
                    trace!("{} chunk {} stored ({} bytes)", track, chunk_index, response.bytes_written);
                    continue;
                }
                Ok(_) => "storage reported an unsuccessful write".to_string(),
                Err(e) => e.to_string(),
            };

            state.errored = true;
            state.draining = false;
            let dropped = state.entries.len();
            state.entries.clear();
            if dropped > 0 {
                warn!("Discarding {} queued chunk(s) after write failure", dropped);
            }
            reason
        };

        error!("{} chunk {} failed: {}", track, chunk_index, reason);
        shared.idle.notify_waiters();

        let callback = shared.on_error.lock().clone();
        match callback {
            Some(callback) => callback(&RecorderError::ChunkWriteFailed),
            None => debug!("No error callback registered"),
        }
        return;
    }
}
