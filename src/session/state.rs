use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::TrackKind;

/// Lifecycle of one recording attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Acquiring {
        requested_tracks: Vec<TrackKind>,
    },
    Recording {
        session_id: String,
        active_tracks: Vec<TrackKind>,
        start_time: DateTime<Utc>,
    },
    /// At least one, but not every, acquired track has been lost
    Degraded {
        session_id: String,
        active_tracks: Vec<TrackKind>,
        lost_tracks: Vec<TrackKind>,
        start_time: DateTime<Utc>,
    },
    Stopping {
        session_id: String,
    },
    Error {
        message: String,
        last_session_id: Option<String>,
    },
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Acquiring { .. } => "acquiring",
            SessionState::Recording { .. } => "recording",
            SessionState::Degraded { .. } => "degraded",
            SessionState::Stopping { .. } => "stopping",
            SessionState::Error { .. } => "error",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionState::Recording { session_id, .. }
            | SessionState::Degraded { session_id, .. }
            | SessionState::Stopping { session_id } => Some(session_id),
            SessionState::Error {
                last_session_id, ..
            } => last_session_id.as_deref(),
            SessionState::Idle | SessionState::Acquiring { .. } => None,
        }
    }

    /// Capturing audio (possibly degraded)
    pub fn is_capturing(&self) -> bool {
        matches!(
            self,
            SessionState::Recording { .. } | SessionState::Degraded { .. }
        )
    }
}

/// Inputs to the session lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    Start { requested_tracks: Vec<TrackKind> },
    Acquired { session_id: String, tracks: Vec<TrackKind> },
    TrackLost { track: TrackKind },
    AllTracksLost,
    Stop,
    Finalized,
    Error { reason: String },
    Dismiss,
}

/// Next state for `event`, or `None` when the event does not apply.
///
/// Pure: `now` is only used as the start time of a new recording.
pub fn transition(
    current: &SessionState,
    event: &SessionEvent,
    now: DateTime<Utc>,
) -> Option<SessionState> {
    use SessionEvent as E;
    use SessionState as S;

    match (current, event) {
        (S::Idle, E::Start { requested_tracks }) => Some(S::Acquiring {
            requested_tracks: requested_tracks.clone(),
        }),

        (S::Acquiring { .. }, E::Acquired { session_id, tracks }) => Some(S::Recording {
            session_id: session_id.clone(),
            active_tracks: tracks.clone(),
            start_time: now,
        }),
        // Nothing captured yet, so nothing to salvage
        (S::Acquiring { .. }, E::Error { reason }) => Some(S::Error {
            message: reason.clone(),
            last_session_id: None,
        }),

        (
            S::Recording {
                session_id,
                active_tracks,
                start_time,
            },
            E::TrackLost { track },
        ) => {
            let remaining = without(active_tracks, *track);
            if remaining.is_empty() {
                Some(stopping(session_id))
            } else {
                Some(S::Degraded {
                    session_id: session_id.clone(),
                    active_tracks: remaining,
                    lost_tracks: vec![*track],
                    start_time: *start_time,
                })
            }
        }
        // Errors while capturing stop the session so captured audio is kept
        (S::Recording { session_id, .. }, E::Stop | E::Error { .. }) => Some(stopping(session_id)),

        (
            S::Degraded {
                session_id,
                active_tracks,
                lost_tracks,
                start_time,
            },
            E::TrackLost { track },
        ) => {
            let remaining = without(active_tracks, *track);
            if remaining.is_empty() {
                Some(stopping(session_id))
            } else {
                let mut lost = lost_tracks.clone();
                lost.push(*track);
                Some(S::Degraded {
                    session_id: session_id.clone(),
                    active_tracks: remaining,
                    lost_tracks: lost,
                    start_time: *start_time,
                })
            }
        }
        (S::Degraded { session_id, .. }, E::Stop | E::AllTracksLost | E::Error { .. }) => {
            Some(stopping(session_id))
        }

        (S::Stopping { .. }, E::Finalized) => Some(S::Idle),
        (S::Stopping { session_id }, E::Error { reason }) => Some(S::Error {
            message: reason.clone(),
            last_session_id: Some(session_id.clone()),
        }),

        (S::Error { .. }, E::Dismiss) => Some(S::Idle),

        _ => None,
    }
}

fn stopping(session_id: &str) -> SessionState {
    SessionState::Stopping {
        session_id: session_id.to_string(),
    }
}

fn without(tracks: &[TrackKind], lost: TrackKind) -> Vec<TrackKind> {
    tracks.iter().copied().filter(|t| *t != lost).collect()
}
