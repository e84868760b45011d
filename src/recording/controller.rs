// Event loop tying the session state machine to the capture orchestrator
//
// Every event, whether it comes from the user or from a capture callback,
// goes through one channel and is applied in order. After each effective
// transition the controller performs the side effect for the new state and
// feeds the outcome back in as the next event.

use std::collections::VecDeque;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use super::orchestrator::{CaptureOrchestrator, StartRequest};
use crate::audio::TrackKind;
use crate::session::{RecordingSession, SessionEvent, SessionState};
use crate::storage::RecordingMetadata;

enum ControlMessage {
    Event(SessionEvent),
    Shutdown,
}

/// Cloneable handle for sending events and observing state
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
    state: watch::Receiver<SessionState>,
    last_recording: watch::Receiver<Option<RecordingMetadata>>,
}

impl ControllerHandle {
    /// Returns false if the controller has shut down
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(ControlMessage::Event(event)).is_ok()
    }

    pub fn start(&self, tracks: Vec<TrackKind>) -> bool {
        self.send(SessionEvent::Start {
            requested_tracks: tracks,
        })
    }

    /// Send START and wait until acquisition settles.
    ///
    /// Returns the first state published after START that is not
    /// `Acquiring`, which may already be `Idle` when a short session finished
    /// before this task was polled. If a session is already under way START is
    /// ignored and the current state is returned. None if the controller is gone.
    pub async fn start_recording(&self, tracks: Vec<TrackKind>) -> Option<SessionState> {
        let mut rx = self.state.clone();
        {
            let current = rx.borrow_and_update();
            if !matches!(*current, SessionState::Idle) {
                return Some(current.clone());
            }
        }

        if !self.start(tracks) {
            return None;
        }

        loop {
            rx.changed().await.ok()?;
            let state = rx.borrow_and_update().clone();
            if !matches!(state, SessionState::Acquiring { .. }) {
                return Some(state);
            }
        }
    }

    pub fn stop(&self) -> bool {
        self.send(SessionEvent::Stop)
    }

    pub fn dismiss(&self) -> bool {
        self.send(SessionEvent::Dismiss)
    }

    pub fn shutdown(&self) -> bool {
        self.tx.send(ControlMessage::Shutdown).is_ok()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Metadata of the most recently finalized recording
    pub fn last_recording(&self) -> Option<RecordingMetadata> {
        self.last_recording.borrow().clone()
    }

    /// Wait until the state satisfies `predicate`. None if the controller is gone.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Option<SessionState>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut rx = self.state.clone();
        rx.wait_for(|s| predicate(s)).await.ok().map(|s| s.clone())
    }
}

pub struct RecordingController {
    session: RecordingSession,
    orchestrator: CaptureOrchestrator,
    mic_device_id: Option<String>,
    rx: mpsc::UnboundedReceiver<ControlMessage>,
    handle: ControllerHandle,
    last_recording: watch::Sender<Option<RecordingMetadata>>,
}

impl RecordingController {
    pub fn new(mut orchestrator: CaptureOrchestrator, mic_device_id: Option<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (last_tx, last_rx) = watch::channel(None);

        let ended_tx = tx.clone();
        orchestrator.on_track_ended(move |track| {
            warn!("Track ended: {}", track);
            let _ = ended_tx.send(ControlMessage::Event(SessionEvent::TrackLost { track }));
        });

        let error_tx = tx.clone();
        orchestrator.on_error(move |reason| {
            let _ = error_tx.send(ControlMessage::Event(SessionEvent::Error { reason }));
        });

        let mut session = RecordingSession::new();
        session.on_state_change(move |state| {
            state_tx.send_replace(state.clone());
        });

        Self {
            session,
            orchestrator,
            mic_device_id,
            rx,
            handle: ControllerHandle {
                tx,
                state: state_rx,
                last_recording: last_rx,
            },
            last_recording: last_tx,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Process events until `shutdown`. An active session is cancelled on exit.
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                ControlMessage::Event(event) => self.apply(event).await,
                ControlMessage::Shutdown => break,
            }
        }

        if self.orchestrator.is_active() {
            warn!("Controller shutting down with an active session; cancelling");
            if let Err(e) = self.orchestrator.cancel().await {
                error!("Failed to cancel session on shutdown: {}", e);
            }
        }
        info!("Recording controller stopped");
    }

    async fn apply(&mut self, event: SessionEvent) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            if !self.session.dispatch(event) {
                continue;
            }
            if let Some(next) = self.react().await {
                pending.push_back(next);
            }
        }
    }

    /// Side effect for the state just entered
    async fn react(&mut self) -> Option<SessionEvent> {
        match self.session.state().clone() {
            SessionState::Acquiring { requested_tracks } => {
                let request =
                    StartRequest::for_tracks(&requested_tracks, self.mic_device_id.clone());
                match self.orchestrator.start(request).await {
                    Ok(session_id) => Some(SessionEvent::Acquired {
                        session_id,
                        tracks: self.orchestrator.tracks(),
                    }),
                    Err(e) => {
                        error!("Failed to acquire devices: {}", e);
                        Some(SessionEvent::Error {
                            reason: e.to_string(),
                        })
                    }
                }
            }
            SessionState::Stopping { session_id } => match self.orchestrator.stop().await {
                Ok(metadata) => {
                    info!("Session {} finalized ({} ms)", session_id, metadata.duration_ms);
                    self.last_recording.send_replace(Some(metadata));
                    Some(SessionEvent::Finalized)
                }
                Err(e) => {
                    error!("Failed to finalize session {}: {}", session_id, e);
                    Some(SessionEvent::Error {
                        reason: e.to_string(),
                    })
                }
            },
            _ => None,
        }
    }
}
