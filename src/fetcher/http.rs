//! Plain HTTP chapter fetcher

use super::ContentFetcher;
use crate::config::{FetcherConfig, RetryConfig};
use crate::error::{Error, FetchError, Result};
use crate::retry::with_retry;
use crate::types::{ChapterRef, SourceTag};
use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

/// Fetches chapter bodies with `GET`
///
/// A chapter id that is an absolute `http(s)` URL is requested as-is. Any other
/// id is joined onto the base URL configured for the work's source tag. The
/// response body is returned verbatim; 5xx and 429 responses and transport
/// failures are retried with backoff.
#[derive(Clone, Debug)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
    sources: HashMap<SourceTag, Url>,
    retry: RetryConfig,
}

impl HttpContentFetcher {
    /// Build a fetcher from the `fetcher` config section
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        let mut sources = HashMap::with_capacity(config.sources.len());
        for (tag, base) in &config.sources {
            let url = Url::parse(base).map_err(|e| Error::Config {
                message: format!("invalid base URL {base:?} for source {tag}: {e}"),
                key: Some(format!("fetcher.sources.{tag}")),
            })?;
            sources.insert(tag.clone(), url);
        }

        Ok(Self {
            client,
            sources,
            retry: config.retry.clone(),
        })
    }

    /// URL a chapter is fetched from
    pub fn resolve(&self, chapter: &ChapterRef, source: &SourceTag) -> Result<Url> {
        if let Ok(url) = Url::parse(chapter.id.as_str())
            && matches!(url.scheme(), "http" | "https")
        {
            return Ok(url);
        }

        let unresolvable = || {
            Error::Fetch(FetchError::UnresolvableChapter {
                chapter_id: chapter.id.to_string(),
                source_tag: source.to_string(),
            })
        };

        let base = self.sources.get(source).ok_or_else(unresolvable)?;
        base.join(chapter.id.as_str()).map_err(|_| unresolvable())
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            }
            .into());
        }
        Ok(body)
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, chapter: &ChapterRef, source: &SourceTag) -> Result<String> {
        let url = self.resolve(chapter, source)?;
        tracing::debug!(chapter_id = %chapter.id, url = %url, "Fetching chapter");
        with_retry(&self.retry, || self.get_text(&url)).await
    }
}
