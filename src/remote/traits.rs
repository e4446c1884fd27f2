//! Trait for the remote chapter mirror

use crate::error::Result;
use crate::types::{CachedChapterRecord, ChapterId, WorkId};
use async_trait::async_trait;

/// Optional, authenticated remote copy of the chapter store
///
/// Callers check [`is_authenticated`](RemoteSync::is_authenticated) before
/// each read or write; an unauthenticated mirror is treated as absent.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// Whether the mirror can currently be used
    fn is_authenticated(&self) -> bool;

    /// Read a chapter from the mirror; `Ok(None)` when the mirror lacks it
    async fn fetch(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
    ) -> Result<Option<CachedChapterRecord>>;

    /// Write a chapter to the mirror
    async fn save(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
        record: &CachedChapterRecord,
    ) -> Result<()>;

    /// Name of the backend, for logs
    fn name(&self) -> &'static str;
}
