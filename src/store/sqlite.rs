//! SQLite-backed chapter store with versioned schema migrations.

use super::ChapterStore;
use crate::error::StoreError;
use crate::types::{CachedChapterRecord, ChapterId, ChapterStats, WorkId};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{FromRow, SqliteConnection};
use std::path::Path;

/// Chapter store persisted in a SQLite database file
#[derive(Clone, Debug)]
pub struct SqliteChapterStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct ChapterRow {
    content: String,
    word_count: Option<i64>,
    char_count: Option<i64>,
    fetched_at: i64,
}

impl SqliteChapterStore {
    /// Open (or create) the store at `path` and bring its schema up to date
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Store(StoreError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let store = Self { pool };
        store.run_migrations().await?;

        tracing::debug!(path = %path.display(), "Chapter store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Store(StoreError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?;

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: chapters table
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying chapter store migration v1");

        sqlx::query("BEGIN").execute(&mut *conn).await.map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = async {
            sqlx::query(
                r#"
                CREATE TABLE chapters (
                    work_id TEXT NOT NULL,
                    chapter_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    word_count INTEGER,
                    char_count INTEGER,
                    fetched_at INTEGER NOT NULL,
                    PRIMARY KEY (work_id, chapter_id)
                )
                "#,
            )
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Store(StoreError::MigrationFailed(format!(
                    "Failed to create chapters table: {}",
                    e
                )))
            })?;

            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(1_i64)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Store(StoreError::MigrationFailed(format!(
                        "Failed to record migration: {}",
                        e
                    )))
                })?;

            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(|e| {
                    Error::Store(StoreError::MigrationFailed(format!(
                        "Failed to commit migration v1: {}",
                        e
                    )))
                })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Chapter store migration v1 complete");
        Ok(())
    }

    /// Number of cached chapters for a work
    pub async fn count_for_work(&self, work_id: &WorkId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE work_id = ?")
            .bind(work_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Store(StoreError::QueryFailed(format!(
                    "Failed to count chapters: {}",
                    e
                )))
            })?;
        Ok(count.max(0) as u64)
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

impl ChapterRow {
    fn into_record(self, work_id: &WorkId, chapter_id: &ChapterId) -> Result<CachedChapterRecord> {
        let fetched_at = DateTime::from_timestamp_millis(self.fetched_at).ok_or_else(|| {
            Error::Store(StoreError::CorruptRecord {
                work_id: work_id.to_string(),
                chapter_id: chapter_id.to_string(),
                reason: format!("fetched_at {} out of range", self.fetched_at),
            })
        })?;

        let stats = match (self.word_count, self.char_count) {
            (Some(words), Some(chars)) => Some(ChapterStats {
                word_count: words.max(0) as u64,
                char_count: chars.max(0) as u64,
            }),
            _ => None,
        };

        Ok(CachedChapterRecord {
            content: self.content,
            stats,
            fetched_at,
        })
    }
}

#[async_trait]
impl ChapterStore for SqliteChapterStore {
    async fn get(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
    ) -> Result<Option<CachedChapterRecord>> {
        let row = sqlx::query_as::<_, ChapterRow>(
            r#"
            SELECT content, word_count, char_count, fetched_at
            FROM chapters
            WHERE work_id = ? AND chapter_id = ?
            "#,
        )
        .bind(work_id.as_str())
        .bind(chapter_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Store(StoreError::QueryFailed(format!(
                "Failed to read chapter: {}",
                e
            )))
        })?;

        row.map(|row| row.into_record(work_id, chapter_id))
            .transpose()
    }

    async fn put(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
        record: &CachedChapterRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chapters (work_id, chapter_id, content, word_count, char_count, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(work_id, chapter_id) DO UPDATE SET
                content = excluded.content,
                word_count = excluded.word_count,
                char_count = excluded.char_count,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(work_id.as_str())
        .bind(chapter_id.as_str())
        .bind(&record.content)
        .bind(record.stats.map(|s| s.word_count as i64))
        .bind(record.stats.map(|s| s.char_count as i64))
        .bind(record.fetched_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Store(StoreError::QueryFailed(format!(
                "Failed to write chapter: {}",
                e
            )))
        })?;

        Ok(())
    }
}
