//! Common test utilities for novel-dl integration tests

use novel_dl::config::RetryConfig;
use novel_dl::{ChapterRef, Config, Event, Work, WorkId};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Source tag every test work uses
pub const SOURCE: &str = "testsite";

/// Config pointing the fetcher at `server` and the store into `dir`
pub fn test_config(dir: &Path, server: &MockServer) -> Config {
    let mut config = Config::default();
    config.store.database_path = dir.join("chapters.db");
    config
        .fetcher
        .sources
        .insert(SOURCE.into(), format!("{}/novel/", server.uri()));
    config.fetcher.timeout = Duration::from_secs(5);
    config.fetcher.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.orchestrator.batch_delay = Duration::from_millis(10);
    config.orchestrator.pause_poll_interval = Duration::from_millis(10);
    config.orchestrator.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Work `id` with relative chapter ids "1"..="count"
pub fn test_work(id: &str, count: usize) -> Work {
    let chapters = (1..=count)
        .map(|n| ChapterRef::new(n.to_string(), format!("Chapter {n}")))
        .collect();
    Work::new(id, SOURCE, chapters).with_title(format!("Novel {id}"))
}

/// Serve `/novel/<n>` for every chapter in `1..=count` except `missing`
pub async fn mount_chapters(server: &MockServer, count: usize, missing: &[usize]) {
    for n in 1..=count {
        let response = if missing.contains(&n) {
            ResponseTemplate::new(404)
        } else {
            ResponseTemplate::new(200).set_body_string(format!("Text of chapter {n}.\n\nThe end."))
        };
        Mock::given(method("GET"))
            .and(path(format!("/novel/{n}")))
            .respond_with(response)
            .mount(server)
            .await;
    }
}

/// Collect events until `work_id` completes or aborts
pub async fn run_to_end(rx: &mut broadcast::Receiver<Event>, work_id: &WorkId) -> Vec<Event> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            };
            let done = matches!(
                &event,
                Event::Completed { work_id: id, .. } | Event::Aborted { work_id: id, .. } if id == work_id
            );
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for the task to finish");
    seen
}
