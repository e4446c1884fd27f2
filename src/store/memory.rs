use super::ChapterStore;
use crate::error::Result;
use crate::types::{CachedChapterRecord, ChapterId, WorkId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process chapter store backed by a `HashMap`
#[derive(Debug, Default)]
pub struct MemoryChapterStore {
    records: RwLock<HashMap<(WorkId, ChapterId), CachedChapterRecord>>,
}

impl MemoryChapterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached chapters across all works
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no chapters
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Ids of the cached chapters of one work, in no particular order
    pub async fn chapter_ids(&self, work_id: &WorkId) -> Vec<ChapterId> {
        self.records
            .read()
            .await
            .keys()
            .filter(|(work, _)| work == work_id)
            .map(|(_, chapter)| chapter.clone())
            .collect()
    }
}

#[async_trait]
impl ChapterStore for MemoryChapterStore {
    async fn get(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
    ) -> Result<Option<CachedChapterRecord>> {
        let key = (work_id.clone(), chapter_id.clone());
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn put(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
        record: &CachedChapterRecord,
    ) -> Result<()> {
        self.records
            .write()
            .await
            .insert((work_id.clone(), chapter_id.clone()), record.clone());
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_returns_record() {
        let store = MemoryChapterStore::new();
        let work = WorkId::from("w");
        let chapter = ChapterId::from("1");

        assert!(store.get(&work, &chapter).await.unwrap().is_none());

        let record = CachedChapterRecord::new("chapter one");
        store.put(&work, &chapter, &record).await.unwrap();

        assert_eq!(store.get(&work, &chapter).await.unwrap(), Some(record));
        assert!(store.contains(&work, &chapter).await.unwrap());
    }

    #[tokio::test]
    async fn same_chapter_id_in_different_works_is_distinct() {
        let store = MemoryChapterStore::new();
        let chapter = ChapterId::from("1");

        store
            .put(&"a".into(), &chapter, &CachedChapterRecord::new("from a"))
            .await
            .unwrap();
        store
            .put(&"b".into(), &chapter, &CachedChapterRecord::new("from b"))
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        let a = store.get(&"a".into(), &chapter).await.unwrap().unwrap();
        assert_eq!(a.content, "from a");
        assert_eq!(store.chapter_ids(&"b".into()).await, vec![chapter]);
    }
}
