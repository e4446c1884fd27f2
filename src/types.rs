//! Core types for novel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a work (usually its source URL)
    WorkId
);

string_id!(
    /// Identifier of a chapter, unique within its work
    ChapterId
);

string_id!(
    /// Source-system tag telling the fetcher which site a work comes from
    SourceTag
);

/// Immutable reference to one chapter of a work. Carries no content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    /// Chapter id (unique within the work)
    pub id: ChapterId,
    /// Display title
    pub title: String,
}

impl ChapterRef {
    /// Create a chapter reference
    pub fn new(id: impl Into<ChapterId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// A content collection (e.g. a novel) with an ordered chapter list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    /// Unique work id
    pub id: WorkId,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Ordered chapter list (must be resolved before a task can start)
    #[serde(default)]
    pub chapters: Vec<ChapterRef>,
    /// Source system the work is fetched from
    pub source: SourceTag,
}

impl Work {
    /// Create a work with a resolved chapter list
    pub fn new(
        id: impl Into<WorkId>,
        source: impl Into<SourceTag>,
        chapters: Vec<ChapterRef>,
    ) -> Self {
        Self {
            id: id.into(),
            title: None,
            chapters,
            source: source.into(),
        }
    }

    /// Set the display title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title for display, falling back to the id
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Word/character statistics stored next to chapter content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterStats {
    /// Whitespace-separated words
    pub word_count: u64,
    /// Non-whitespace characters
    pub char_count: u64,
}

impl ChapterStats {
    /// Compute statistics for a chapter text
    pub fn from_text(text: &str) -> Self {
        Self {
            word_count: text.split_whitespace().count() as u64,
            char_count: text.chars().filter(|c| !c.is_whitespace()).count() as u64,
        }
    }
}

/// Persisted payload for one (work, chapter) pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedChapterRecord {
    /// Chapter text
    pub content: String,
    /// Optional statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ChapterStats>,
    /// When the content was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedChapterRecord {
    /// Build a record from freshly fetched text, computing its statistics
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let stats = ChapterStats::from_text(&content);
        Self {
            content,
            stats: Some(stats),
            fetched_at: Utc::now(),
        }
    }
}

/// Where a chapter's content came from during a fetch run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterSource {
    /// Already present in the local store
    Cache,
    /// Read through from the remote mirror
    Remote,
    /// Downloaded from the content source
    Network,
}

/// Task status while a task has visible progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Fetch loop is allowed to run
    Running,
    /// Fetch loop is suspended
    Paused,
}

/// Per-work download progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// Chapters processed (advances at batch boundaries)
    pub current: usize,
    /// Chapter count, fixed at task start
    pub total: usize,
    /// Running or paused
    pub status: TaskStatus,
}

/// Point-in-time view of the orchestrator, for progress displays
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSnapshot {
    /// Work holding the active slot
    pub active: Option<WorkId>,
    /// Queued works in promotion order
    pub queue: Vec<WorkId>,
    /// Progress of every task with visible state
    pub tasks: BTreeMap<WorkId, TaskState>,
}

/// Event emitted during the task lifecycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Work appended to the queue
    Queued {
        /// Work id
        work_id: WorkId,
        /// Position in the queue (0 = next)
        position: usize,
    },

    /// Work removed from the queue without running
    RemovedFromQueue {
        /// Work id
        work_id: WorkId,
    },

    /// Fetch loop started for a work
    Started {
        /// Work id
        work_id: WorkId,
        /// Number of chapters in the work
        total: usize,
    },

    /// A batch settled and progress advanced
    Progress {
        /// Work id
        work_id: WorkId,
        /// Chapters processed
        current: usize,
        /// Total chapters
        total: usize,
    },

    /// Task paused
    Paused {
        /// Work id
        work_id: WorkId,
    },

    /// Task resumed
    Resumed {
        /// Work id
        work_id: WorkId,
    },

    /// Active task was paused to make room for another work. It is not
    /// re-queued and stays paused until resumed or prioritized.
    Displaced {
        /// Work that was paused
        work_id: WorkId,
        /// Work that took the active slot
        by: WorkId,
    },

    /// Task stopped by the caller
    Stopped {
        /// Work id
        work_id: WorkId,
    },

    /// Fetch loop went through every chapter
    Completed {
        /// Work id
        work_id: WorkId,
        /// Total chapters
        total: usize,
    },

    /// Fetch loop exited before the last batch
    Aborted {
        /// Work id
        work_id: WorkId,
        /// Chapters processed before exit
        processed: usize,
    },

    /// Chapters reported as cached after a batch
    ChaptersCached {
        /// Work id
        work_id: WorkId,
        /// Chapters reported as cached
        chapter_ids: Vec<ChapterId>,
    },

    /// A chapter's fetch pipeline failed; it stays uncached
    ChapterFailed {
        /// Work id
        work_id: WorkId,
        /// Chapter id
        chapter_id: ChapterId,
        /// Error message
        error: String,
    },

    /// Orchestrator is shutting down
    Shutdown,
}

impl Event {
    /// Short snake_case name of the event, used as the SSE event type
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Queued { .. } => "queued",
            Event::RemovedFromQueue { .. } => "removed_from_queue",
            Event::Started { .. } => "started",
            Event::Progress { .. } => "progress",
            Event::Paused { .. } => "paused",
            Event::Resumed { .. } => "resumed",
            Event::Displaced { .. } => "displaced",
            Event::Stopped { .. } => "stopped",
            Event::Completed { .. } => "completed",
            Event::Aborted { .. } => "aborted",
            Event::ChaptersCached { .. } => "chapters_cached",
            Event::ChapterFailed { .. } => "chapter_failed",
            Event::Shutdown => "shutdown",
        }
    }
}
