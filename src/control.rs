//! Per-task pause/abort signalling
//!
//! The [`TaskController`] owns one control block per running work. User
//! actions flip the flags; the work's fetch loop watches them through its
//! [`ControlHandle`] at batch boundaries. Cancellation is cooperative: nothing
//! here interrupts a fetch already in flight.
//!
//! Each registration gets a fresh run id. Registering a work again replaces its
//! block, and the old handle then reads as aborted, so a loop that is still
//! unwinding can never act on (or release) the newer run's block.

use crate::types::WorkId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cooperative control flags of one task
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ControlFlags {
    /// Loop must suspend before its next batch
    pub paused: bool,
    /// Loop must exit at its next check point
    pub aborted: bool,
}

impl ControlFlags {
    const DETACHED: ControlFlags = ControlFlags {
        paused: false,
        aborted: true,
    };
}

#[derive(Debug)]
struct ControlEntry {
    run_id: u64,
    tx: watch::Sender<ControlFlags>,
}

/// Registry of control blocks keyed by work id
///
/// Every operation on an unregistered id is a no-op and returns `false`.
#[derive(Debug)]
pub struct TaskController {
    entries: Mutex<HashMap<WorkId, ControlEntry>>,
    next_run_id: AtomicU64,
}

impl Default for TaskController {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskController {
    /// Create an empty controller
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_run_id: AtomicU64::new(1),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<WorkId, ControlEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a `{paused: false, aborted: false}` block for a work
    ///
    /// Replaces any existing block for the same work.
    pub fn register(&self, work_id: &WorkId) -> ControlHandle {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(ControlFlags::default());

        if let Some(previous) = self
            .entries()
            .insert(work_id.clone(), ControlEntry { run_id, tx })
        {
            tracing::debug!(
                work_id = %work_id,
                previous_run = previous.run_id,
                run_id,
                "Replaced control block of a previous run"
            );
        }

        ControlHandle {
            work_id: work_id.clone(),
            run_id,
            rx,
        }
    }

    fn modify(&self, work_id: &WorkId, f: impl FnOnce(&mut ControlFlags)) -> bool {
        match self.entries().get(work_id) {
            Some(entry) => {
                entry.tx.send_modify(f);
                true
            }
            None => false,
        }
    }

    /// Set `paused`
    pub fn pause(&self, work_id: &WorkId) -> bool {
        self.modify(work_id, |flags| flags.paused = true)
    }

    /// Clear `paused`
    pub fn resume(&self, work_id: &WorkId) -> bool {
        self.modify(work_id, |flags| flags.paused = false)
    }

    /// Set `aborted` and clear `paused`
    pub fn abort(&self, work_id: &WorkId) -> bool {
        self.modify(work_id, |flags| {
            flags.aborted = true;
            flags.paused = false;
        })
    }

    /// Abort every registered task, returning how many were signalled
    pub fn abort_all(&self) -> usize {
        let entries = self.entries();
        for entry in entries.values() {
            entry.tx.send_modify(|flags| {
                flags.aborted = true;
                flags.paused = false;
            });
        }
        entries.len()
    }

    /// Delete the block for a work, whichever run owns it
    ///
    /// Its handle reads as aborted from then on.
    pub fn unregister(&self, work_id: &WorkId) -> bool {
        self.entries().remove(work_id).is_some()
    }

    /// Delete the block only if it still belongs to `handle`'s run
    pub fn release(&self, handle: &ControlHandle) -> bool {
        let mut entries = self.entries();
        match entries.get(&handle.work_id) {
            Some(entry) if entry.run_id == handle.run_id => {
                entries.remove(&handle.work_id);
                true
            }
            _ => false,
        }
    }

    /// Current flags of a work, if registered
    pub fn flags(&self, work_id: &WorkId) -> Option<ControlFlags> {
        self.entries().get(work_id).map(|entry| *entry.tx.borrow())
    }

    /// Whether a work is registered and paused
    pub fn is_paused(&self, work_id: &WorkId) -> bool {
        self.flags(work_id).is_some_and(|flags| flags.paused)
    }

    /// Whether a work is registered and aborted
    pub fn is_aborted(&self, work_id: &WorkId) -> bool {
        self.flags(work_id).is_some_and(|flags| flags.aborted)
    }

    /// Whether a work has a control block
    pub fn is_registered(&self, work_id: &WorkId) -> bool {
        self.entries().contains_key(work_id)
    }

    /// Number of registered blocks
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no block is registered
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// A fetch loop's view of its control block
#[derive(Debug)]
pub struct ControlHandle {
    work_id: WorkId,
    run_id: u64,
    rx: watch::Receiver<ControlFlags>,
}

impl ControlHandle {
    /// Work this handle controls
    pub fn work_id(&self) -> &WorkId {
        &self.work_id
    }

    /// Run id assigned at registration
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Latest flags; a detached handle reads as aborted
    pub fn flags(&self) -> ControlFlags {
        if self.rx.has_changed().is_err() {
            return ControlFlags::DETACHED;
        }
        *self.rx.borrow()
    }

    /// Whether the loop must exit
    pub fn is_aborted(&self) -> bool {
        self.flags().aborted
    }

    /// Whether the loop must suspend
    pub fn is_paused(&self) -> bool {
        self.flags().paused
    }

    /// Suspend while paused
    ///
    /// Wakes as soon as the flags change and re-checks at least every `poll`.
    /// Returns `false` if the task was aborted (before or during the wait).
    pub async fn wait_until_runnable(&mut self, poll: Duration) -> bool {
        loop {
            let flags = self.flags();
            if flags.aborted {
                return false;
            }
            if !flags.paused {
                return true;
            }
            match tokio::time::timeout(poll, self.rx.changed()).await {
                Ok(Ok(())) | Err(_) => {}
                Ok(Err(_)) => return false,
            }
        }
    }

    /// Sleep for `delay`, returning early (with `false`) on abort
    pub async fn sleep(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.is_aborted() {
                return false;
            }
            match tokio::time::timeout_at(deadline, self.rx.changed()).await {
                Err(_) => return !self.is_aborted(),
                Ok(Ok(())) => {}
                Ok(Err(_)) => return false,
            }
        }
    }
}
