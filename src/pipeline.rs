//! Per-chapter cache fall-through
//!
//! Local store, then remote mirror, then the content source. Whatever is
//! fetched is written back to the store, and anything that did not come from
//! the mirror is pushed to it in the background. Both the background
//! orchestrator and the bulk downloader load chapters through here.

use crate::error::{Error, FetchError, Result};
use crate::fetcher::ContentFetcher;
use crate::remote::RemoteSync;
use crate::store::ChapterStore;
use crate::types::{CachedChapterRecord, ChapterRef, ChapterSource, Work};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

/// Storage and network collaborators shared by every download path
#[derive(Clone)]
pub struct Collaborators {
    /// Local chapter cache (authoritative)
    pub store: Arc<dyn ChapterStore>,
    /// Optional remote mirror
    pub remote: Arc<dyn RemoteSync>,
    /// Content source client
    pub fetcher: Arc<dyn ContentFetcher>,
}

impl Collaborators {
    /// Collaborators without a remote mirror
    pub fn new(store: Arc<dyn ChapterStore>, fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            store,
            remote: Arc::new(crate::remote::NoOpRemoteSync),
            fetcher,
        }
    }

    /// Use `remote` as the mirror
    pub fn with_remote(mut self, remote: Arc<dyn RemoteSync>) -> Self {
        self.remote = remote;
        self
    }
}

/// Loads single chapters through the cache tiers
#[derive(Clone)]
pub struct ChapterPipeline {
    collaborators: Collaborators,
    remote_writes: TaskTracker,
    chapter_timeout: Option<Duration>,
}

impl ChapterPipeline {
    /// Create a pipeline; `chapter_timeout` bounds each content-source fetch
    pub fn new(collaborators: Collaborators, chapter_timeout: Option<Duration>) -> Self {
        Self {
            collaborators,
            remote_writes: TaskTracker::new(),
            chapter_timeout,
        }
    }

    /// Collaborators this pipeline reads and writes
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Tracker of detached mirror writes
    pub fn remote_writes(&self) -> &TaskTracker {
        &self.remote_writes
    }

    /// Load one chapter, reporting which tier satisfied it
    ///
    /// A cache hit touches nothing else. Mirror read errors count as a miss.
    /// Store errors and content-source failures are returned.
    pub async fn load(
        &self,
        work: &Work,
        chapter: &ChapterRef,
    ) -> Result<(ChapterSource, CachedChapterRecord)> {
        let Collaborators {
            store,
            remote,
            fetcher,
        } = &self.collaborators;

        if let Some(record) = store.get(&work.id, &chapter.id).await? {
            return Ok((ChapterSource::Cache, record));
        }

        let sync_enabled = remote.is_authenticated();
        let mirrored = if sync_enabled {
            match remote.fetch(&work.id, &chapter.id).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        work_id = %work.id,
                        chapter_id = %chapter.id,
                        backend = remote.name(),
                        error = %e,
                        "Remote read failed, falling back to source"
                    );
                    None
                }
            }
        } else {
            None
        };

        let (source, record) = match mirrored {
            Some(record) => (ChapterSource::Remote, record),
            None => {
                let text = self.fetch_text(chapter, work).await?;
                (ChapterSource::Network, CachedChapterRecord::new(text))
            }
        };

        store.put(&work.id, &chapter.id, &record).await?;

        if source != ChapterSource::Remote && sync_enabled {
            self.spawn_remote_write(work, chapter, &record);
        }

        Ok((source, record))
    }

    async fn fetch_text(&self, chapter: &ChapterRef, work: &Work) -> Result<String> {
        let fetch = self.collaborators.fetcher.fetch(chapter, &work.source);
        match self.chapter_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fetch).await.map_err(|_| {
                Error::Fetch(FetchError::Timeout {
                    chapter_id: chapter.id.to_string(),
                    timeout,
                })
            })?,
            None => fetch.await,
        }
    }

    fn spawn_remote_write(&self, work: &Work, chapter: &ChapterRef, record: &CachedChapterRecord) {
        let remote = Arc::clone(&self.collaborators.remote);
        let work_id = work.id.clone();
        let chapter_id = chapter.id.clone();
        let record = record.clone();

        self.remote_writes.spawn(async move {
            if let Err(e) = remote.save(&work_id, &chapter_id, &record).await {
                tracing::warn!(
                    work_id = %work_id,
                    chapter_id = %chapter_id,
                    backend = remote.name(),
                    error = %e,
                    "Remote write failed"
                );
            }
        });
    }
}
