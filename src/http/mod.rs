//! HTTP API exposing the storage side of the recorder
//!
//! - POST /sessions - Open a recording session
//! - POST /sessions/:id/chunks - Append a PCM chunk (base64)
//! - POST /sessions/:id/finalize - Finalize and catalog the recording
//! - DELETE /sessions/:id - Cancel a session
//! - GET /recordings - List finished recordings
//! - DELETE /recordings/:id - Delete a recording
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
