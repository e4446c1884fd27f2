//! Chapter content retrieval
//!
//! A [`ContentFetcher`] turns a [`ChapterRef`] plus the work's [`SourceTag`]
//! into chapter text. Failures are per chapter; callers decide whether a
//! failure matters.

use crate::error::Result;
use crate::types::{ChapterRef, SourceTag};
use async_trait::async_trait;

mod http;

pub use http::HttpContentFetcher;

/// Retrieves chapter text from its source
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the text of one chapter
    async fn fetch(&self, chapter: &ChapterRef, source: &SourceTag) -> Result<String>;
}
