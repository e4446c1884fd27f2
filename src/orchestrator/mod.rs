//! Background download orchestrator split into focused submodules.
//!
//! The [`DownloadOrchestrator`] owns one active slot, a FIFO queue of waiting
//! works, and the batch fetch loop of whichever work holds the slot. Methods
//! are organized by domain:
//! - [`queue`] - Queue bookkeeping and auto-promotion
//! - [`control`] - Task control (start/pause/resume/stop/prioritize)
//! - [`lifecycle`] - Graceful shutdown
//! - [`fetch_task`] - The per-work batch fetch loop
//!
//! All scheduler state sits behind one mutex that is never held across an
//! await, so every control operation is synchronous and callable from any
//! thread inside a tokio runtime.

mod control;
mod fetch_task;
mod lifecycle;
mod queue;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::bulk::BulkDownloader;
use crate::config::{BulkConfig, Config, OrchestratorConfig};
use crate::control::TaskController;
use crate::error::Result;
use crate::fetcher::HttpContentFetcher;
use crate::pipeline::{ChapterPipeline, Collaborators};
use crate::remote::{HttpRemoteSync, NoOpRemoteSync, RemoteSync};
use crate::store::SqliteChapterStore;
use crate::types::{ChapterId, Event, OrchestratorSnapshot, TaskState, Work, WorkId};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

/// Callback receiving the chapter ids reported cached after each batch
pub type CachedListener = Arc<dyn Fn(&WorkId, &[ChapterId]) + Send + Sync>;

/// Result of [`DownloadOrchestrator::start`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    /// Work took the free active slot and its fetch loop is running
    Started,
    /// Another work is active; appended to the queue
    Queued {
        /// Position in the queue (0 = next)
        position: usize,
    },
    /// Work already has a running task
    AlreadyRunning,
    /// Work is already waiting in the queue
    AlreadyQueued,
    /// Work had a paused task and was prioritized
    Prioritized {
        /// What prioritizing did
        outcome: PrioritizeOutcome,
    },
}

/// Result of [`DownloadOrchestrator::prioritize`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PrioritizeOutcome {
    /// Work already holds the active slot
    AlreadyActive,
    /// Work was dequeued and its fetch loop started from the first chapter
    Started {
        /// Previously active work, now paused
        displaced: Option<WorkId>,
    },
    /// Work's paused loop was resumed in the active slot
    Resumed {
        /// Previously active work, now paused
        displaced: Option<WorkId>,
    },
    /// Work is neither queued nor paused; nothing changed
    NotFound,
}

/// Work currently allowed to run, tagged with the run that holds it
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ActiveSlot {
    pub(crate) work_id: WorkId,
    pub(crate) run_id: u64,
}

/// Visible progress of one task, tagged with the run that publishes it
#[derive(Clone, Debug)]
pub(crate) struct TaskEntry {
    pub(crate) state: TaskState,
    pub(crate) run_id: u64,
}

/// Active slot, queue and task progress (protected by one mutex)
#[derive(Debug, Default)]
pub(crate) struct SchedulerState {
    pub(crate) active: Option<ActiveSlot>,
    pub(crate) queue: VecDeque<Work>,
    pub(crate) tasks: HashMap<WorkId, TaskEntry>,
}

impl SchedulerState {
    pub(crate) fn is_active(&self, work_id: &WorkId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|slot| &slot.work_id == work_id)
    }

    pub(crate) fn queue_position(&self, work_id: &WorkId) -> Option<usize> {
        self.queue.iter().position(|work| &work.id == work_id)
    }
}

/// Background download orchestrator (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloadOrchestrator {
    /// Batching and pacing settings
    pub(crate) config: Arc<OrchestratorConfig>,
    /// Per-chapter cache fall-through shared by every fetch loop
    pub(crate) pipeline: ChapterPipeline,
    /// Active slot, queue and task progress
    pub(crate) state: Arc<Mutex<SchedulerState>>,
    /// Pause/abort flags of running loops
    pub(crate) controller: Arc<TaskController>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Side-channel for chapter availability indicators
    pub(crate) cached_listener: Arc<RwLock<Option<CachedListener>>>,
    /// Spawned fetch loops, awaited on shutdown
    pub(crate) fetch_loops: TaskTracker,
    /// Flag to indicate whether new tasks are accepted (false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl DownloadOrchestrator {
    /// Create an orchestrator over arbitrary collaborators
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators) -> Self {
        let (event_tx, _rx) = broadcast::channel(config.event_buffer.max(1));
        let pipeline = ChapterPipeline::new(collaborators, config.chapter_timeout);

        Self {
            config: Arc::new(config),
            pipeline,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            controller: Arc::new(TaskController::new()),
            event_tx,
            cached_listener: Arc::new(RwLock::new(None)),
            fetch_loops: TaskTracker::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Build the SQLite store, HTTP fetcher and (if enabled) HTTP mirror from config
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = SqliteChapterStore::new(&config.store.database_path).await?;
        let fetcher = HttpContentFetcher::new(&config.fetcher)?;
        let remote: Arc<dyn RemoteSync> = if config.remote.enabled {
            Arc::new(HttpRemoteSync::from_config(&config.remote)?)
        } else {
            Arc::new(NoOpRemoteSync)
        };

        tracing::info!(
            database = %config.store.database_path.display(),
            remote = remote.name(),
            batch_size = config.orchestrator.batch_size,
            "Orchestrator initialized"
        );

        let collaborators =
            Collaborators::new(Arc::new(store), Arc::new(fetcher)).with_remote(remote);
        Ok(Self::new(config.orchestrator.clone(), collaborators))
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to orchestrator events
    ///
    /// Each subscriber receives every event sent after it subscribed. Slow
    /// subscribers that fall more than `event_buffer` events behind miss the
    /// oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Register the callback that receives chapter ids reported cached
    ///
    /// Replaces any previous listener. Called from the fetch loop, so it must
    /// not block.
    pub fn set_cached_listener<F>(&self, listener: F)
    where
        F: Fn(&WorkId, &[ChapterId]) + Send + Sync + 'static,
    {
        let mut slot = self
            .cached_listener
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(listener));
    }

    /// Remove the cached-chapters callback
    pub fn clear_cached_listener(&self) {
        let mut slot = self
            .cached_listener
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    pub(crate) fn notify_cached(&self, work_id: &WorkId, chapter_ids: Vec<ChapterId>) {
        if chapter_ids.is_empty() {
            return;
        }

        let listener = self
            .cached_listener
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(listener) = listener {
            listener(work_id, &chapter_ids);
        }

        self.emit_event(Event::ChaptersCached {
            work_id: work_id.clone(),
            chapter_ids,
        });
    }

    /// Active slot, queue and every visible task state
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        let state = self.lock_state();
        OrchestratorSnapshot {
            active: state.active.as_ref().map(|slot| slot.work_id.clone()),
            queue: state.queue.iter().map(|work| work.id.clone()).collect(),
            tasks: state
                .tasks
                .iter()
                .map(|(id, entry)| (id.clone(), entry.state))
                .collect(),
        }
    }

    /// Progress of one work, if it has a visible task
    pub fn task_state(&self, work_id: &WorkId) -> Option<TaskState> {
        self.lock_state()
            .tasks
            .get(work_id)
            .map(|entry| entry.state)
    }

    /// Work holding the active slot
    pub fn active_id(&self) -> Option<WorkId> {
        self.lock_state()
            .active
            .as_ref()
            .map(|slot| slot.work_id.clone())
    }

    /// Whether new tasks are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Orchestrator settings
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Foreground bulk downloader sharing this orchestrator's collaborators
    ///
    /// Its mirror writes are tracked with the orchestrator's, so shutdown waits
    /// for them too.
    pub fn bulk_downloader(&self, config: &BulkConfig) -> BulkDownloader {
        BulkDownloader::with_pipeline(config, self.pipeline.clone())
    }
}
