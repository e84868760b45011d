use std::sync::Arc;

use crate::transport::RecorderTransport;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Storage side every request is forwarded to
    pub transport: Arc<dyn RecorderTransport>,
}

impl AppState {
    pub fn new(transport: Arc<dyn RecorderTransport>) -> Self {
        Self { transport }
    }
}
