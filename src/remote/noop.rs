//! Remote sync stand-in used when no mirror is configured

use super::traits::RemoteSync;
use crate::error::Result;
use crate::types::{CachedChapterRecord, ChapterId, WorkId};
use async_trait::async_trait;

/// Mirror that is never authenticated
///
/// ```
/// use novel_dl::remote::{NoOpRemoteSync, RemoteSync};
///
/// # #[tokio::main]
/// # async fn main() -> novel_dl::Result<()> {
/// let remote = NoOpRemoteSync;
/// assert!(!remote.is_authenticated());
/// assert!(remote.fetch(&"work".into(), &"1".into()).await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRemoteSync;

#[async_trait]
impl RemoteSync for NoOpRemoteSync {
    fn is_authenticated(&self) -> bool {
        false
    }

    async fn fetch(
        &self,
        _work_id: &WorkId,
        _chapter_id: &ChapterId,
    ) -> Result<Option<CachedChapterRecord>> {
        Ok(None)
    }

    async fn save(
        &self,
        _work_id: &WorkId,
        _chapter_id: &ChapterId,
        _record: &CachedChapterRecord,
    ) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
