//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - Starting and controlling per-work tasks
//! - [`queue`] - Inspecting and editing the pending queue
//! - [`system`] - Health and the event stream

mod queue;
mod system;
mod tasks;

pub use queue::*;
pub use system::*;
pub use tasks::*;

use crate::error::{Error, TaskError};
use crate::types::WorkId;

/// 404 error for a work the orchestrator does not know
pub(crate) fn not_found(work_id: &WorkId) -> Error {
    Error::Task(TaskError::NotFound {
        work_id: work_id.to_string(),
    })
}
