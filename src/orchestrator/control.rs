//! Task control: start, pause, resume, stop, prioritize.
//!
//! Every operation takes the scheduler lock once, applies its transition and
//! emits the matching event before releasing it, so observers never see a
//! half-applied transition. A fetch loop prepared under the lock is spawned
//! after the lock is released. Operations on unknown works are no-ops.

use crate::error::{Error, Result, TaskError};
use crate::types::{Event, TaskStatus, Work, WorkId};

use super::fetch_task::PendingLaunch;
use super::{ActiveSlot, DownloadOrchestrator, PrioritizeOutcome, SchedulerState, StartOutcome};

impl DownloadOrchestrator {
    /// Start downloading a work, or queue it behind the active one
    ///
    /// - A work with a paused task is prioritized instead.
    /// - A work that is already running or queued is left alone.
    /// - Otherwise the work takes the free active slot, or joins the queue tail.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NoChapters`] if the chapter list has not been resolved
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use novel_dl::*;
    /// # async fn example(orchestrator: DownloadOrchestrator) -> Result<()> {
    /// let work = Work::new(
    ///     "https://example.com/novel/1",
    ///     "example",
    ///     vec![ChapterRef::new("https://example.com/novel/1/1", "Chapter 1")],
    /// );
    /// match orchestrator.start(work)? {
    ///     StartOutcome::Started => println!("downloading"),
    ///     StartOutcome::Queued { position } => println!("queued at {position}"),
    ///     other => println!("{other:?}"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn start(&self, work: Work) -> Result<StartOutcome> {
        if work.chapters.is_empty() {
            return Err(Error::Task(TaskError::NoChapters {
                work_id: work.id.to_string(),
            }));
        }
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let mut state = self.lock_state();

        if let Some(status) = state.tasks.get(&work.id).map(|entry| entry.state.status) {
            return match status {
                TaskStatus::Running => Ok(StartOutcome::AlreadyRunning),
                TaskStatus::Paused => {
                    let (outcome, launch) = self.prioritize_locked(&mut state, &work.id)?;
                    drop(state);
                    if let Some(launch) = launch {
                        launch.spawn();
                    }
                    Ok(StartOutcome::Prioritized { outcome })
                }
            };
        }

        if state.queue_position(&work.id).is_some() {
            return Ok(StartOutcome::AlreadyQueued);
        }

        if state.active.is_some() {
            let position = self.enqueue_locked(&mut state, work);
            return Ok(StartOutcome::Queued { position });
        }

        let launch = self.launch_locked(&mut state, work).map_err(|(_, e)| e)?;
        drop(state);
        launch.spawn();
        Ok(StartOutcome::Started)
    }

    /// Pause a task
    ///
    /// The fetch loop finishes its in-flight batch and then waits. The task
    /// keeps the active slot while paused. Returns `false` if the work has no
    /// running loop.
    pub fn pause(&self, work_id: &WorkId) -> bool {
        let mut state = self.lock_state();
        self.pause_locked(&mut state, work_id)
    }

    fn pause_locked(&self, state: &mut SchedulerState, work_id: &WorkId) -> bool {
        let Some(entry) = state.tasks.get_mut(work_id) else {
            return false;
        };
        if !self.controller.pause(work_id) {
            return false;
        }
        if entry.state.status == TaskStatus::Paused {
            return true;
        }

        entry.state.status = TaskStatus::Paused;
        tracing::info!(work_id = %work_id, current = entry.state.current, "Task paused");
        self.emit_event(Event::Paused {
            work_id: work_id.clone(),
        });
        true
    }

    /// Resume a paused task
    ///
    /// A paused task that does not hold the active slot (it was displaced)
    /// takes the slot if it is free, or is prioritized over the current
    /// holder otherwise. Returns `false` if the work has no task.
    pub fn resume(&self, work_id: &WorkId) -> bool {
        let mut state = self.lock_state();
        if !state.tasks.contains_key(work_id) {
            return false;
        }

        if !state.is_active(work_id) {
            if state.active.is_some() {
                let Ok((outcome, launch)) = self.prioritize_locked(&mut state, work_id) else {
                    return false;
                };
                drop(state);
                if let Some(launch) = launch {
                    launch.spawn();
                }
                return matches!(outcome, PrioritizeOutcome::Resumed { .. });
            }
            let Some(run_id) = state.tasks.get(work_id).map(|entry| entry.run_id) else {
                return false;
            };
            state.active = Some(ActiveSlot {
                work_id: work_id.clone(),
                run_id,
            });
        }

        self.resume_locked(&mut state, work_id)
    }

    fn resume_locked(&self, state: &mut SchedulerState, work_id: &WorkId) -> bool {
        let Some(entry) = state.tasks.get_mut(work_id) else {
            return false;
        };
        if !self.controller.resume(work_id) {
            return false;
        }
        if entry.state.status == TaskStatus::Running {
            return true;
        }

        entry.state.status = TaskStatus::Running;
        tracing::info!(work_id = %work_id, current = entry.state.current, "Task resumed");
        self.emit_event(Event::Resumed {
            work_id: work_id.clone(),
        });
        true
    }

    /// Stop a task or drop it from the queue
    ///
    /// Progress disappears immediately. A running loop lets its in-flight batch
    /// finish, then exits. If the work held the active slot, the queue head is
    /// promoted. Returns `false` if the work was neither running nor queued.
    pub fn stop(&self, work_id: &WorkId) -> bool {
        let mut state = self.lock_state();

        let had_task = state.tasks.remove(work_id).is_some();
        self.controller.abort(work_id);
        let dequeued = match state.queue_position(work_id) {
            Some(position) => state.queue.remove(position).is_some(),
            None => false,
        };
        let was_active = state.is_active(work_id);
        if was_active {
            state.active = None;
        }

        if !(had_task || dequeued || was_active) {
            return false;
        }

        tracing::info!(
            work_id = %work_id,
            was_active,
            dequeued,
            "Task stopped"
        );
        self.emit_event(Event::Stopped {
            work_id: work_id.clone(),
        });
        drop(state);

        self.promote_next();
        true
    }

    /// Move a work into the active slot ahead of everything else
    ///
    /// The currently active work is paused (not re-queued). A queued work
    /// starts from its first chapter; a paused work resumes where its loop
    /// stopped.
    ///
    /// # Errors
    ///
    /// Fails only if the fetch loop cannot be spawned (no tokio runtime); the
    /// work is then put back at the queue head.
    pub fn prioritize(&self, work_id: &WorkId) -> Result<PrioritizeOutcome> {
        let (outcome, launch) = {
            let mut state = self.lock_state();
            self.prioritize_locked(&mut state, work_id)?
        };
        if let Some(launch) = launch {
            launch.spawn();
        }
        Ok(outcome)
    }

    /// Apply a prioritize transition, returning the fetch loop to spawn once
    /// the lock is released
    pub(crate) fn prioritize_locked(
        &self,
        state: &mut SchedulerState,
        work_id: &WorkId,
    ) -> Result<(PrioritizeOutcome, Option<PendingLaunch>)> {
        if state.is_active(work_id) {
            return Ok((PrioritizeOutcome::AlreadyActive, None));
        }

        let queued_at = state.queue_position(work_id);
        if queued_at.is_none() && !state.tasks.contains_key(work_id) {
            return Ok((PrioritizeOutcome::NotFound, None));
        }

        let displaced = state.active.take().map(|slot| {
            self.pause_locked(state, &slot.work_id);
            tracing::warn!(
                work_id = %slot.work_id,
                by = %work_id,
                "Active task displaced; it stays paused and is not re-queued"
            );
            self.emit_event(Event::Displaced {
                work_id: slot.work_id.clone(),
                by: work_id.clone(),
            });
            slot.work_id
        });

        if let Some(position) = queued_at {
            let Some(work) = state.queue.remove(position) else {
                return Ok((PrioritizeOutcome::NotFound, None));
            };
            return match self.launch_locked(state, work) {
                Ok(launch) => Ok((PrioritizeOutcome::Started { displaced }, Some(launch))),
                Err((work, e)) => {
                    state.queue.push_front(work);
                    Err(e)
                }
            };
        }

        let Some(run_id) = state.tasks.get(work_id).map(|entry| entry.run_id) else {
            return Ok((PrioritizeOutcome::NotFound, None));
        };
        state.active = Some(ActiveSlot {
            work_id: work_id.clone(),
            run_id,
        });
        self.resume_locked(state, work_id);
        Ok((PrioritizeOutcome::Resumed { displaced }, None))
    }
}
