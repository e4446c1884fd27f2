//! Fetch task execution -- the batch loop of the active work.
//!
//! Split into focused submodules:
//! - [`context`] - Per-run state carried by the loop
//! - [`orchestration`] - Batch sequencing, pause waits and pacing
//! - [`batching`] - Concurrent fan-out of one batch and cache reporting
//! - [`finalization`] - Exactly-once cleanup when the loop exits

mod batching;
mod context;
mod finalization;
mod orchestration;


use crate::error::Error;
use crate::types::{Event, TaskState, TaskStatus, Work, WorkId};
use std::sync::Arc;
use tokio::runtime::Handle;

use super::{ActiveSlot, DownloadOrchestrator, SchedulerState, TaskEntry};
use crate::control::ControlHandle;
use context::FetchRun;

/// A fetch loop that owns the active slot but has not been spawned yet
///
/// Must be spawned (or dropped) only after the scheduler lock is released:
/// dropping the run, which a shutting-down runtime does inside `spawn_on`,
/// takes that lock for cleanup.
#[must_use = "the fetch loop only runs once spawned"]
pub(crate) struct PendingLaunch {
    run: FetchRun,
    runtime: Handle,
}

impl PendingLaunch {
    pub(crate) fn spawn(self) {
        let fetch_loops = self.run.orchestrator.fetch_loops.clone();
        fetch_loops.spawn_on(self.run.execute(), &self.runtime);
    }
}

impl DownloadOrchestrator {
    /// Give `work` the active slot and prepare its fetch loop
    ///
    /// Registers control flags and publishes `{current: 0, status: running}`
    /// before the loop runs. Hands the work back if no tokio runtime is
    /// available to run it.
    pub(crate) fn launch_locked(
        &self,
        state: &mut SchedulerState,
        work: Work,
    ) -> std::result::Result<PendingLaunch, (Work, Error)> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                return Err((
                    work,
                    Error::Other(format!("no tokio runtime to run fetch task: {e}")),
                ));
            }
        };

        let handle = self.controller.register(&work.id);
        let run_id = handle.run_id();
        let total = work.chapters.len();

        state.tasks.insert(
            work.id.clone(),
            TaskEntry {
                state: TaskState {
                    current: 0,
                    total,
                    status: TaskStatus::Running,
                },
                run_id,
            },
        );
        state.active = Some(ActiveSlot {
            work_id: work.id.clone(),
            run_id,
        });

        tracing::info!(work_id = %work.id, total, run_id, "Starting fetch task");
        self.emit_event(Event::Started {
            work_id: work.id.clone(),
            total,
        });

        Ok(PendingLaunch {
            run: FetchRun::new(self.clone(), Arc::new(work), handle),
            runtime,
        })
    }

    /// Advance `current` if the task still belongs to `run_id`
    ///
    /// Returns `false` once the task was stopped or replaced by a newer run.
    pub(crate) fn publish_progress(&self, work_id: &WorkId, run_id: u64, current: usize) -> bool {
        let mut state = self.lock_state();
        let Some(entry) = state
            .tasks
            .get_mut(work_id)
            .filter(|entry| entry.run_id == run_id)
        else {
            return false;
        };

        let current = current.min(entry.state.total).max(entry.state.current);
        entry.state.current = current;
        let total = entry.state.total;

        tracing::debug!(work_id = %work_id, current, total, "Batch settled");
        self.emit_event(Event::Progress {
            work_id: work_id.clone(),
            current,
            total,
        });
        true
    }

    /// Tear down everything `handle`'s run owns
    ///
    /// Removes its task state and control block and frees the active slot if
    /// this run still holds it. State that a newer run of the same work owns
    /// is left alone; returns `true` in that case.
    pub(crate) fn finish_run(&self, work_id: &WorkId, handle: &ControlHandle) -> bool {
        let run_id = handle.run_id();
        let mut state = self.lock_state();

        let superseded = state
            .tasks
            .get(work_id)
            .is_some_and(|entry| entry.run_id != run_id)
            || state
                .active
                .as_ref()
                .is_some_and(|slot| &slot.work_id == work_id && slot.run_id != run_id);

        if state
            .tasks
            .get(work_id)
            .is_some_and(|entry| entry.run_id == run_id)
        {
            state.tasks.remove(work_id);
        }
        if state
            .active
            .as_ref()
            .is_some_and(|slot| &slot.work_id == work_id && slot.run_id == run_id)
        {
            state.active = None;
        }
        self.controller.release(handle);
        superseded
    }
}
