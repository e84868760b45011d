//! Recording session lifecycle
//!
//! `transition` is the whole state machine: a pure function from the current
//! state and an event to the next state. `RecordingSession` holds the one live
//! state and tells listeners when it changes.

mod machine;
mod state;

pub use machine::{ListenerId, RecordingSession};
pub use state::{transition, SessionEvent, SessionState};
