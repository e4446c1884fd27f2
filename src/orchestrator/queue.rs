//! Queue bookkeeping and auto-promotion.

use crate::types::{Event, Work, WorkId};

use super::{DownloadOrchestrator, SchedulerState};

impl DownloadOrchestrator {
    /// Queued work ids in promotion order
    pub fn queued_ids(&self) -> Vec<WorkId> {
        self.lock_state()
            .queue
            .iter()
            .map(|work| work.id.clone())
            .collect()
    }

    /// Whether a work is waiting in the queue
    pub fn is_queued(&self, work_id: &WorkId) -> bool {
        self.lock_state().queue_position(work_id).is_some()
    }

    /// Remove a work from the queue without running it
    ///
    /// Does not touch the active slot or any task state. Returns `false` if
    /// the work was not queued.
    pub fn remove_from_queue(&self, work_id: &WorkId) -> bool {
        let mut state = self.lock_state();
        let Some(position) = state.queue_position(work_id) else {
            return false;
        };
        state.queue.remove(position);

        tracing::info!(work_id = %work_id, position, "Removed work from queue");
        self.emit_event(Event::RemovedFromQueue {
            work_id: work_id.clone(),
        });
        true
    }

    /// Append a work to the queue tail, returning its position
    pub(crate) fn enqueue_locked(&self, state: &mut SchedulerState, work: Work) -> usize {
        let work_id = work.id.clone();
        state.queue.push_back(work);
        let position = state.queue.len() - 1;

        tracing::info!(work_id = %work_id, position, "Work queued behind active task");
        self.emit_event(Event::Queued { work_id, position });
        position
    }

    /// Start the queue head while the active slot is empty
    ///
    /// Called after every transition that can free the slot (completion, abort,
    /// stop). A head that cannot be launched goes back to the front.
    pub(crate) fn promote_next(&self) {
        if !self.is_accepting() {
            return;
        }

        let launch = {
            let mut state = self.lock_state();
            if state.active.is_some() {
                return;
            }
            let Some(work) = state.queue.pop_front() else {
                return;
            };

            let work_id = work.id.clone();
            match self.launch_locked(&mut state, work) {
                Ok(launch) => {
                    tracing::info!(work_id = %work_id, "Auto-promoted queue head");
                    launch
                }
                Err((work, e)) => {
                    tracing::error!(work_id = %work_id, error = %e, "Failed to promote queue head");
                    state.queue.push_front(work);
                    return;
                }
            }
        };
        launch.spawn();
    }
}
