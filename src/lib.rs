//! # novel-dl
//!
//! Background download orchestrator for serialized web content (novels and
//! other chaptered works).
//!
//! One work at a time holds the active slot and has its chapters fetched in
//! small concurrent batches; everything else waits in a FIFO queue. Each
//! chapter falls through a local cache, an optional remote mirror and finally
//! the content source, and whatever is fetched is cached for next time.
//!
//! - **Pausable** - pause, resume, stop and prioritize at batch granularity
//! - **Cache-first** - cached chapters never touch the network
//! - **Event-driven** - consumers subscribe to events, no polling required
//! - **Library-first** - storage, mirror and fetcher are traits; SQLite and
//!   HTTP implementations ship with the crate
//!
//! ## Quick Start
//!
//! ```no_run
//! use novel_dl::{ChapterRef, Config, DownloadOrchestrator, Work};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = DownloadOrchestrator::from_config(&Config::default()).await?;
//!
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let work = Work::new(
//!         "https://example.com/novel/1",
//!         "example",
//!         vec![
//!             ChapterRef::new("https://example.com/novel/1/1", "Chapter 1"),
//!             ChapterRef::new("https://example.com/novel/1/2", "Chapter 2"),
//!         ],
//!     );
//!     orchestrator.start(work)?;
//!
//!     novel_dl::run_with_shutdown(orchestrator).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Foreground bulk downloads of chapter ranges
pub mod bulk;
/// Configuration types
pub mod config;
/// Per-task pause/abort signalling
pub mod control;
/// Error types
pub mod error;
/// ZIP export of downloaded chapters
pub mod export;
/// Chapter content sources
pub mod fetcher;
/// Background download orchestrator (decomposed into focused submodules)
pub mod orchestrator;
/// Per-chapter cache fall-through
pub mod pipeline;
/// Remote chapter mirror
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// Local chapter cache
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use bulk::{BulkChapter, BulkDownloader, ChapterRange};
pub use config::{CacheMarking, Config, OrchestratorConfig};
pub use error::{
    ApiError, ErrorDetail, Error, FetchError, Result, StoreError, TaskError, ToHttpStatus,
};
pub use export::ExportFormat;
pub use fetcher::{ContentFetcher, HttpContentFetcher};
pub use orchestrator::{DownloadOrchestrator, PrioritizeOutcome, StartOutcome};
pub use pipeline::Collaborators;
pub use remote::{HttpRemoteSync, NoOpRemoteSync, RemoteSync};
pub use store::{ChapterStore, MemoryChapterStore, SqliteChapterStore};
pub use types::{
    CachedChapterRecord, ChapterId, ChapterRef, ChapterSource, ChapterStats, Event,
    OrchestratorSnapshot, SourceTag, TaskState, TaskStatus, Work, WorkId,
};

/// Wait for a termination signal, then shut the orchestrator down
///
/// - **Unix:** SIGTERM or SIGINT, falling back to Ctrl+C if the handlers
///   cannot be registered.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(orchestrator: DownloadOrchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Could not register one signal handler, waiting on the other");
            only.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
