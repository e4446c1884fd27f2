//! Batch fan-out -- concurrent chapter loads joined at the batch boundary.

use crate::config::CacheMarking;
use crate::orchestrator::DownloadOrchestrator;
use crate::types::{ChapterId, ChapterRef, ChapterSource, Event, Work};
use futures::future::join_all;

/// What one settled batch produced
pub(super) struct BatchOutcome {
    /// Chapter ids to report as cached
    pub(super) reported: Vec<ChapterId>,
    /// Chapters whose pipeline succeeded
    pub(super) succeeded: usize,
    /// Chapters downloaded from the content source
    pub(super) from_network: usize,
    /// Chapters whose pipeline failed
    pub(super) failed: usize,
}

/// Load every chapter of `batch` concurrently and wait for all of them
///
/// A failed chapter is logged and announced with [`Event::ChapterFailed`];
/// it never fails the batch. Under [`CacheMarking::Batch`] every chapter of
/// the batch is reported cached, failed ones included.
pub(super) async fn process_batch(
    orchestrator: &DownloadOrchestrator,
    work: &Work,
    batch: &[ChapterRef],
) -> BatchOutcome {
    let results = join_all(
        batch
            .iter()
            .map(|chapter| orchestrator.pipeline.load(work, chapter)),
    )
    .await;

    let mut confirmed = Vec::with_capacity(batch.len());
    let mut from_network = 0usize;
    let mut failed = 0usize;

    for (chapter, result) in batch.iter().zip(results) {
        match result {
            Ok((source, _)) => {
                if source == ChapterSource::Network {
                    from_network += 1;
                }
                confirmed.push(chapter.id.clone());
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(
                    work_id = %work.id,
                    chapter_id = %chapter.id,
                    error = %e,
                    "Chapter fetch failed; it stays uncached"
                );
                orchestrator.emit_event(Event::ChapterFailed {
                    work_id: work.id.clone(),
                    chapter_id: chapter.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let succeeded = confirmed.len();
    let reported = match orchestrator.config.cache_marking {
        CacheMarking::Batch => batch.iter().map(|chapter| chapter.id.clone()).collect(),
        CacheMarking::Confirmed => confirmed,
    };

    BatchOutcome {
        reported,
        succeeded,
        from_network,
        failed,
    }
}
