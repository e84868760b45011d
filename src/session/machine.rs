use chrono::Utc;
use tracing::{debug, info};

use super::state::{transition, SessionEvent, SessionState};

/// Handle for removing a state-change listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type StateListener = Box<dyn FnMut(&SessionState) + Send>;

/// Holds the single live `SessionState` and notifies listeners on change
pub struct RecordingSession {
    state: SessionState,
    listeners: Vec<(ListenerId, StateListener)>,
    next_listener: u64,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply `event`. Returns false (and notifies nobody) when it does not apply.
    pub fn dispatch(&mut self, event: SessionEvent) -> bool {
        let Some(next) = transition(&self.state, &event, Utc::now()) else {
            debug!("Ignoring {:?} in {} state", event, self.state.name());
            return false;
        };

        info!("Session state: {} -> {}", self.state.name(), next.name());
        self.state = next;

        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.state);
        }
        true
    }

    pub fn on_state_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&SessionState) + Send + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }
}
