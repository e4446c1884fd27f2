//! Queue handlers.

use super::not_found;
use crate::api::AppState;
use crate::error::Result;
use crate::types::WorkId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// GET /queue - Queued work ids in promotion order
pub async fn list_queue(State(state): State<AppState>) -> Json<Vec<WorkId>> {
    Json(state.orchestrator.queued_ids())
}

/// DELETE /queue/:id - Remove a work from the queue without running it
pub async fn remove_queued(
    State(state): State<AppState>,
    Path(work_id): Path<WorkId>,
) -> Result<StatusCode> {
    if state.orchestrator.remove_from_queue(&work_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&work_id))
    }
}
