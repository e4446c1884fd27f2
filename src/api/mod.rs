//! REST API server module
//!
//! Exposes the orchestrator's task controls, its queue and its event stream
//! over HTTP for a presentation layer.

use crate::{Config, DownloadOrchestrator, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `GET /tasks` - Active slot, queue and task progress
/// - `POST /tasks` - Start a work (JSON [`Work`](crate::Work) body)
/// - `GET /tasks/:id` - Progress of one work
/// - `POST /tasks/:id/pause` - Pause a task
/// - `POST /tasks/:id/resume` - Resume a task
/// - `POST /tasks/:id/prioritize` - Move a work into the active slot
/// - `DELETE /tasks/:id` - Stop a task or drop it from the queue
///
/// ## Queue
/// - `GET /queue` - Queued work ids
/// - `DELETE /queue/:id` - Remove a work from the queue
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /events` - Server-sent events stream
///
/// Work ids are usually URLs and must be percent-encoded in paths.
pub fn create_router(orchestrator: Arc<DownloadOrchestrator>, config: Arc<Config>) -> Router {
    let state = AppState::new(orchestrator, config.clone());

    let router = Router::new()
        // Tasks
        .route("/tasks", get(routes::list_tasks).post(routes::start_task))
        .route("/tasks/:id", get(routes::get_task).delete(routes::stop_task))
        .route("/tasks/:id/pause", post(routes::pause_task))
        .route("/tasks/:id/resume", post(routes::resume_task))
        .route("/tasks/:id/prioritize", post(routes::prioritize_task))
        // Queue
        .route("/queue", get(routes::list_queue))
        .route("/queue/:id", axum::routing::delete(routes::remove_queued))
        // System
        .route("/health", get(routes::health_check))
        .route("/events", get(routes::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config (outermost)
    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin. Origins that are not valid header
/// values are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Runs until the server fails or the task is dropped.
///
/// # Example
///
/// ```no_run
/// use novel_dl::{Config, DownloadOrchestrator};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let orchestrator = Arc::new(DownloadOrchestrator::from_config(&config).await?);
///
/// novel_dl::api::start_api_server(orchestrator, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    orchestrator: Arc<DownloadOrchestrator>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(orchestrator, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
