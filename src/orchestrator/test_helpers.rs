//! Shared fixtures for orchestrator and pipeline tests.

use crate::config::OrchestratorConfig;
use crate::error::{Error, FetchError, Result};
use crate::fetcher::ContentFetcher;
use crate::pipeline::Collaborators;
use crate::remote::RemoteSync;
use crate::store::{ChapterStore, MemoryChapterStore};
use crate::types::{CachedChapterRecord, ChapterId, ChapterRef, Event, SourceTag, Work, WorkId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};

use super::DownloadOrchestrator;

/// Generous upper bound for anything the tests wait on
pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Content fetcher double with failure injection, delays and an optional gate
#[derive(Default)]
pub(crate) struct MockFetcher {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: HashSet<ChapterId>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    fetched: Mutex<Vec<ChapterId>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail these chapter ids with a 404
    pub(crate) fn failing_on<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        self.failing = ids.into_iter().map(ChapterId::from).collect();
        self
    }

    /// Sleep before answering
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block every fetch until a permit is added to the returned semaphore
    pub(crate) fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (fetcher, gate)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetches currently waiting on the gate or delay
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Chapter ids in the order their fetch finished
    pub(crate) fn fetched(&self) -> Vec<ChapterId> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, chapter: &ChapterRef, _source: &SourceTag) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(chapter.id.clone());

        if self.failing.contains(&chapter.id) {
            return Err(Error::Fetch(FetchError::HttpStatus {
                url: chapter.id.to_string(),
                status: 404,
            }));
        }
        Ok(format!("content of {}", chapter.id))
    }
}

/// Remote mirror double
pub(crate) struct MockRemote {
    authenticated: bool,
    fail_reads: bool,
    records: Mutex<HashMap<(WorkId, ChapterId), CachedChapterRecord>>,
    fetch_calls: AtomicUsize,
    save_calls: AtomicUsize,
    saving_blocked: AtomicBool,
}

impl MockRemote {
    fn build(authenticated: bool, fail_reads: bool) -> Self {
        Self {
            authenticated,
            fail_reads,
            records: Mutex::new(HashMap::new()),
            fetch_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
            saving_blocked: AtomicBool::new(false),
        }
    }

    pub(crate) fn authenticated() -> Self {
        Self::build(true, false)
    }

    pub(crate) fn unauthenticated() -> Self {
        Self::build(false, false)
    }

    pub(crate) fn failing_reads() -> Self {
        Self::build(true, true)
    }

    /// Make every save fail
    pub(crate) fn reject_saves(self) -> Self {
        self.saving_blocked.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn insert(&self, work: &str, chapter: &str, content: &str) {
        self.records.lock().unwrap().insert(
            (WorkId::from(work), ChapterId::from(chapter)),
            CachedChapterRecord::new(content),
        );
    }

    pub(crate) fn contains(&self, work: &str, chapter: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .contains_key(&(WorkId::from(work), ChapterId::from(chapter)))
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSync for MockRemote {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn fetch(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
    ) -> Result<Option<CachedChapterRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(Error::RemoteSync("mirror unavailable".into()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(work_id.clone(), chapter_id.clone()))
            .cloned())
    }

    async fn save(
        &self,
        work_id: &WorkId,
        chapter_id: &ChapterId,
        record: &CachedChapterRecord,
    ) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.saving_blocked.load(Ordering::SeqCst) {
            return Err(Error::RemoteSync("quota exceeded".into()));
        }
        self.records
            .lock()
            .unwrap()
            .insert((work_id.clone(), chapter_id.clone()), record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Chapters "1".."=count"
pub(crate) fn chapters(count: usize) -> Vec<ChapterRef> {
    (1..=count)
        .map(|n| ChapterRef::new(n.to_string(), format!("Chapter {n}")))
        .collect()
}

/// Work `id` with `count` chapters
pub(crate) fn work(id: &str, count: usize) -> Work {
    Work::new(id, "test", chapters(count))
}

/// Orchestrator settings with short delays so loops finish quickly
pub(crate) fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        batch_delay: Duration::from_millis(10),
        pause_poll_interval: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(5),
        ..OrchestratorConfig::default()
    }
}

/// Orchestrator over a memory store and the given fetcher
pub(crate) fn orchestrator_with(
    config: OrchestratorConfig,
    fetcher: Arc<MockFetcher>,
) -> (DownloadOrchestrator, Arc<MemoryChapterStore>) {
    let store = Arc::new(MemoryChapterStore::new());
    let orchestrator = DownloadOrchestrator::new(config, Collaborators::new(store.clone(), fetcher));
    (orchestrator, store)
}

/// Orchestrator whose fetches block until released through the returned gate
pub(crate) fn gated_orchestrator() -> (
    DownloadOrchestrator,
    Arc<MockFetcher>,
    Arc<Semaphore>,
    Arc<MemoryChapterStore>,
) {
    let (fetcher, gate) = MockFetcher::gated();
    let fetcher = Arc::new(fetcher);
    let (orchestrator, store) = orchestrator_with(fast_config(), fetcher.clone());
    (orchestrator, fetcher, gate, store)
}

/// Release every fetch blocked on `gate`, then shut down
pub(crate) async fn release_and_shutdown(orchestrator: &DownloadOrchestrator, gate: &Semaphore) {
    gate.add_permits(1_000);
    orchestrator.shutdown().await.unwrap();
}

/// Pre-populate `store` with every chapter of `work`
pub(crate) async fn cache_all(store: &MemoryChapterStore, work: &Work) {
    for chapter in &work.chapters {
        store
            .put(
                &work.id,
                &chapter.id,
                &CachedChapterRecord::new(format!("cached {}", chapter.id)),
            )
            .await
            .unwrap();
    }
}

/// Poll `condition` until it holds, panicking after [`WAIT`]
pub(crate) async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Receive events until one matches, panicking after [`WAIT`]
pub(crate) async fn wait_for_event(
    rx: &mut broadcast::Receiver<Event>,
    mut matches: impl FnMut(&Event) -> bool,
) -> Event {
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Drain events that are already buffered
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
