//! Fetch run finalization -- exactly-once cleanup on every exit path.

use crate::types::Event;

use super::context::FetchRun;

impl Drop for FetchRun {
    fn drop(&mut self) {
        let work_id = self.work.id.clone();
        // Read before release: a released handle always reads as aborted
        let aborted = !self.completed || self.handle.is_aborted();

        let superseded = self.orchestrator.finish_run(&work_id, &self.handle);

        if superseded {
            // A newer run of this work owns its events now
            tracing::debug!(
                work_id = %work_id,
                run_id = self.handle.run_id(),
                processed = self.processed,
                "Stale fetch run exited"
            );
        } else if aborted {
            tracing::info!(
                work_id = %work_id,
                processed = self.processed,
                total = self.work.chapters.len(),
                "Fetch task aborted"
            );
            self.orchestrator.emit_event(Event::Aborted {
                work_id,
                processed: self.processed,
            });
        } else {
            tracing::info!(
                work_id = %work_id,
                total = self.work.chapters.len(),
                "Fetch task completed"
            );
            self.orchestrator.emit_event(Event::Completed {
                work_id,
                total: self.work.chapters.len(),
            });
        }

        self.orchestrator.promote_next();
    }
}
