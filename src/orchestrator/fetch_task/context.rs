//! Fetch run context -- state one loop carries from start to cleanup.

use crate::control::ControlHandle;
use crate::orchestrator::DownloadOrchestrator;
use crate::types::Work;
use std::sync::Arc;

/// One execution of a work's fetch loop
///
/// Dropping it runs the cleanup in [`finalization`](super::finalization),
/// whether the loop finished, observed an abort, panicked or was cancelled.
pub(crate) struct FetchRun {
    pub(super) orchestrator: DownloadOrchestrator,
    pub(super) work: Arc<Work>,
    pub(super) handle: ControlHandle,
    /// Chapters processed so far (batch granularity)
    pub(super) processed: usize,
    /// Set once every batch has settled
    pub(super) completed: bool,
}

impl FetchRun {
    pub(super) fn new(
        orchestrator: DownloadOrchestrator,
        work: Arc<Work>,
        handle: ControlHandle,
    ) -> Self {
        Self {
            orchestrator,
            work,
            handle,
            processed: 0,
            completed: false,
        }
    }
}
