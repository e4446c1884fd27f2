//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;

use super::DownloadOrchestrator;

impl DownloadOrchestrator {
    /// Gracefully shut down the orchestrator
    ///
    /// 1. Stop accepting new tasks
    /// 2. Drop every queued work
    /// 3. Abort every fetch loop (each finishes its in-flight batch)
    /// 4. Wait, bounded by `shutdown_timeout`, for loops and pending mirror writes
    /// 5. Emit [`Event::Shutdown`]
    ///
    /// Calling it again is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new tasks
        self.accepting_new.store(false, Ordering::SeqCst);

        // 2-3. Clear the queue and signal every loop while holding the state
        // lock, so nothing can be promoted in between
        {
            let mut state = self.lock_state();
            let dropped = state.queue.len();
            state.queue.clear();
            let aborted = self.controller.abort_all();
            tracing::info!(
                dropped_queued = dropped,
                aborted_loops = aborted,
                "Stopped accepting new tasks"
            );
        }

        // 4. Wait for loops, then for the mirror writes their last batch spawned
        self.fetch_loops.close();
        let remote_writes = self.pipeline.remote_writes().clone();
        remote_writes.close();

        let wait = async {
            self.fetch_loops.wait().await;
            remote_writes.wait().await;
        };
        match tokio::time::timeout(self.config.shutdown_timeout, wait).await {
            Ok(()) => tracing::info!("All fetch tasks and remote writes finished"),
            Err(_) => tracing::warn!(
                pending_loops = self.fetch_loops.len(),
                pending_writes = remote_writes.len(),
                "Timeout waiting for fetch tasks, proceeding with shutdown"
            ),
        }

        // 5. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
