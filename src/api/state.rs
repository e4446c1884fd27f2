//! Application state for the API server

use crate::{Config, DownloadOrchestrator};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator every handler drives
    pub orchestrator: Arc<DownloadOrchestrator>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(orchestrator: Arc<DownloadOrchestrator>, config: Arc<Config>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }
}
