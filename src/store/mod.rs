//! Local chapter cache
//!
//! The [`ChapterStore`] is the authoritative copy of every downloaded chapter,
//! keyed by `(work id, chapter id)`. The orchestrator consults it before any
//! network access and writes every fetched chapter back into it.
//!
//! - [`SqliteChapterStore`] persists to a SQLite file (WAL mode, versioned schema)
//! - [`MemoryChapterStore`] keeps records in a map, for tests and throwaway sessions

use crate::error::Result;
use crate::types::{CachedChapterRecord, ChapterId, WorkId};
use async_trait::async_trait;

mod memory;
mod sqlite;

pub use memory::MemoryChapterStore;
pub use sqlite::SqliteChapterStore;

/// Key-value persistence for chapter content
///
/// `put` overwrites; writing the same record twice leaves one copy.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Look up a cached chapter
    async fn get(&self, work_id: &WorkId, chapter_id: &ChapterId)
    -> Result<Option<CachedChapterRecord>>;

    /// Insert or replace a cached chapter
    async fn put(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
        record: &CachedChapterRecord,
    ) -> Result<()>;

    /// Whether a chapter is cached
    async fn contains(&self, work_id: &WorkId, chapter_id: &ChapterId) -> Result<bool> {
        Ok(self.get(work_id, chapter_id).await?.is_some())
    }
}
