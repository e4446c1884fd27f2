//! HTTP document-store mirror

use super::traits::RemoteSync;
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::types::{CachedChapterRecord, ChapterId, WorkId};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote mirror speaking JSON over HTTP
///
/// Chapters live at `{base_url}/works/{work_id}/chapters/{chapter_id}` with both
/// ids percent-encoded. `GET` returns a [`CachedChapterRecord`] or 404, `PUT`
/// stores one. Requests carry `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct HttpRemoteSync {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpRemoteSync {
    /// Create a mirror client; without a token it reports unauthenticated
    pub fn new(
        base_url: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|e| Error::Config {
            message: format!("invalid remote base_url {base_url:?}: {e}"),
            key: Some("remote.base_url".into()),
        })?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.filter(|token| !token.is_empty()),
        })
    }

    /// Build from the `remote` config section
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let base_url = config.base_url.clone().ok_or_else(|| Error::Config {
            message: "remote sync is enabled but no base_url is set".into(),
            key: Some("remote.base_url".into()),
        })?;
        Self::new(
            base_url,
            config.access_token.clone(),
            config.timeout.unwrap_or(DEFAULT_TIMEOUT),
        )
    }

    fn chapter_url(&self, work_id: &WorkId, chapter_id: &ChapterId) -> String {
        format!(
            "{}/works/{}/chapters/{}",
            self.base_url,
            urlencoding::encode(work_id.as_str()),
            urlencoding::encode(chapter_id.as_str())
        )
    }

    fn token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| Error::RemoteSync("not authenticated".into()))
    }
}

#[async_trait]
impl RemoteSync for HttpRemoteSync {
    fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    async fn fetch(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
    ) -> Result<Option<CachedChapterRecord>> {
        let url = self.chapter_url(work_id, chapter_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let record = response.json::<CachedChapterRecord>().await?;
                Ok(Some(record))
            }
            status => Err(Error::RemoteSync(format!("GET {url} returned {status}"))),
        }
    }

    async fn save(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
        record: &CachedChapterRecord,
    ) -> Result<()> {
        let url = self.chapter_url(work_id, chapter_id);
        let response = self
            .client
            .put(&url)
            .bearer_auth(self.token()?)
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteSync(format!("PUT {url} returned {status}")));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote(server: &MockServer) -> HttpRemoteSync {
        HttpRemoteSync::new(
            server.uri(),
            Some("secret".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_record_on_success() {
        let server = MockServer::start().await;
        let record = CachedChapterRecord::new("mirrored text");

        Mock::given(method("GET"))
            .and(path("/works/novel-1/chapters/ch-1"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&record))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = remote(&server)
            .fetch(&"novel-1".into(), &"ch-1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.content, "mirrored text");
    }

    #[tokio::test]
    async fn fetch_maps_404_to_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetched = remote(&server)
            .fetch(&"novel-1".into(), &"ch-9".into())
            .await
            .unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn fetch_reports_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = remote(&server)
            .fetch(&"novel-1".into(), &"ch-1".into())
            .await;
        assert!(matches!(result, Err(Error::RemoteSync(_))));
    }

    #[tokio::test]
    async fn save_puts_json_record() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/works/novel-1/chapters/ch-2"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        remote(&server)
            .save(
                &"novel-1".into(),
                &"ch-2".into(),
                &CachedChapterRecord::new("text"),
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["content"], "text");
    }

    #[test]
    fn ids_are_percent_encoded_in_path() {
        let remote =
            HttpRemoteSync::new("https://mirror.example.com/", None, DEFAULT_TIMEOUT).unwrap();
        let url = remote.chapter_url(
            &"https://site.example/novel/1".into(),
            &"chapter 1".into(),
        );
        assert_eq!(
            url,
            "https://mirror.example.com/works/https%3A%2F%2Fsite.example%2Fnovel%2F1/chapters/chapter%201"
        );
    }

    #[test]
    fn missing_or_empty_token_is_unauthenticated() {
        let remote = HttpRemoteSync::new("https://mirror.example.com", None, DEFAULT_TIMEOUT)
            .unwrap();
        assert!(!remote.is_authenticated());

        let remote = HttpRemoteSync::new(
            "https://mirror.example.com",
            Some(String::new()),
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        assert!(!remote.is_authenticated());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = HttpRemoteSync::new("not a url", Some("t".into()), DEFAULT_TIMEOUT);
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
