//! Task handlers: start, inspect, pause, resume, prioritize, stop.

use super::not_found;
use crate::api::AppState;
use crate::error::Result;
use crate::orchestrator::{PrioritizeOutcome, StartOutcome};
use crate::types::{OrchestratorSnapshot, TaskState, Work, WorkId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// GET /tasks - Active slot, queue and every visible task
pub async fn list_tasks(State(state): State<AppState>) -> Json<OrchestratorSnapshot> {
    Json(state.orchestrator.snapshot())
}

/// POST /tasks - Start a work or queue it behind the active one
///
/// 202 when the call started, queued or prioritized the work, 200 when it
/// was already running or queued.
pub async fn start_task(
    State(state): State<AppState>,
    Json(work): Json<Work>,
) -> Result<impl IntoResponse> {
    let work_id = work.id.clone();
    let outcome = state.orchestrator.start(work)?;

    let status = match outcome {
        StartOutcome::AlreadyRunning | StartOutcome::AlreadyQueued => StatusCode::OK,
        StartOutcome::Started | StartOutcome::Queued { .. } | StartOutcome::Prioritized { .. } => {
            StatusCode::ACCEPTED
        }
    };
    tracing::debug!(work_id = %work_id, ?outcome, "Start requested via API");
    Ok((status, Json(outcome)))
}

/// GET /tasks/:id - Progress of one work
pub async fn get_task(
    State(state): State<AppState>,
    Path(work_id): Path<WorkId>,
) -> Result<Json<TaskState>> {
    state
        .orchestrator
        .task_state(&work_id)
        .map(Json)
        .ok_or_else(|| not_found(&work_id))
}

/// POST /tasks/:id/pause - Pause a task at its next batch boundary
pub async fn pause_task(
    State(state): State<AppState>,
    Path(work_id): Path<WorkId>,
) -> Result<StatusCode> {
    if state.orchestrator.pause(&work_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&work_id))
    }
}

/// POST /tasks/:id/resume - Resume a paused task
pub async fn resume_task(
    State(state): State<AppState>,
    Path(work_id): Path<WorkId>,
) -> Result<StatusCode> {
    if state.orchestrator.resume(&work_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&work_id))
    }
}

/// POST /tasks/:id/prioritize - Move a queued or paused work into the active slot
pub async fn prioritize_task(
    State(state): State<AppState>,
    Path(work_id): Path<WorkId>,
) -> Result<Json<PrioritizeOutcome>> {
    match state.orchestrator.prioritize(&work_id)? {
        PrioritizeOutcome::NotFound => Err(not_found(&work_id)),
        outcome => Ok(Json(outcome)),
    }
}

/// DELETE /tasks/:id - Stop a task or drop it from the queue
pub async fn stop_task(
    State(state): State<AppState>,
    Path(work_id): Path<WorkId>,
) -> Result<StatusCode> {
    if state.orchestrator.stop(&work_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&work_id))
    }
}
