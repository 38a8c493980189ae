//! Chat pipeline: cache gate -> paginate (retry, dedup, rate limit) -> persist.
//!
//! - Existing artifact short-circuits the run with no network activity
//! - Pages are fetched strictly in order; each offset depends on the previous page
//! - Artifact is written only when the run ends Exhausted or Capped
//! - Several VODs may run concurrently; each run owns its aggregator

use crate::domain::{ChatAggregator, ChatTranscript, DomainError, FetchError, RunState, VodId};
use crate::ports::{ChatCache, ChatPageSource};
use crate::shared::ChatSettings;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Log progress every N pages.
const PROGRESS_EVERY: u32 = 10;

/// Chat service. Owns the page source, the artifact cache and the run settings.
#[derive(Clone)]
pub struct ChatService {
    source: Arc<dyn ChatPageSource>,
    cache: Arc<dyn ChatCache>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        source: Arc<dyn ChatPageSource>,
        cache: Arc<dyn ChatCache>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            source,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn artifact_path(&self, vod_id: &VodId) -> std::path::PathBuf {
        self.cache.artifact_path(vod_id)
    }

    /// Download the chat of one VOD, or load it from the artifact if present.
    ///
    /// `vod_duration` (seconds) bounds pagination; 0 disables the bound.
    /// A run stopped by the page ceiling succeeds with `truncated = true`.
    pub async fn download_chat(
        &self,
        vod_id: &VodId,
        vod_duration: u64,
        cancel: &CancellationToken,
    ) -> Result<ChatTranscript, DomainError> {
        self.settings.validate()?;

        if self.cache.exists(vod_id).await? {
            let path = self.cache.artifact_path(vod_id);
            info!(vod_id = %vod_id, path = %path.display(), "loading chat from cache");
            let messages = self.cache.load(vod_id).await?;
            return Ok(ChatTranscript {
                vod_id: vod_id.clone(),
                messages,
                truncated: false,
                from_cache: true,
                pages_fetched: 0,
            });
        }

        info!(vod_id = %vod_id, vod_duration, "downloading chat");
        let start = Instant::now();

        let aggregator = self.fetch_all(vod_id, vod_duration, cancel).await?;
        let truncated = aggregator.state() == RunState::Capped;
        let pages_fetched = aggregator.pages_fetched();

        // Interrupted between the last page and the write: leave nothing behind.
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled {
                offset: aggregator.offset(),
            });
        }

        let messages = aggregator.into_messages();
        self.cache.persist(vod_id, &messages).await?;

        info!(
            vod_id = %vod_id,
            messages = messages.len(),
            pages = pages_fetched,
            truncated,
            elapsed_s = start.elapsed().as_secs(),
            "chat download complete"
        );

        Ok(ChatTranscript {
            vod_id: vod_id.clone(),
            messages,
            truncated,
            from_cache: false,
            pages_fetched,
        })
    }

    /// Page loop. Returns the aggregator in a terminal success state.
    async fn fetch_all(
        &self,
        vod_id: &VodId,
        vod_duration: u64,
        cancel: &CancellationToken,
    ) -> Result<ChatAggregator, DomainError> {
        let mut aggregator = ChatAggregator::new(vod_duration, self.settings.max_pages);
        let source = &self.source;
        let timeout = self.settings.request_timeout;

        loop {
            let offset = aggregator.offset();
            let page = self
                .settings
                .retry
                .run(cancel, |attempt| async move {
                    debug!(vod_id = %vod_id, offset, attempt, "fetching chat page");
                    match tokio::time::timeout(timeout, source.fetch_page(vod_id, offset)).await {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Transient(format!(
                            "no response within {}s",
                            timeout.as_secs()
                        ))),
                    }
                })
                .await;

            let page = match page {
                Ok(page) => page,
                Err(FetchError::Cancelled) => {
                    aggregator.fail();
                    warn!(vod_id = %vod_id, offset, "chat download cancelled");
                    return Err(DomainError::Cancelled { offset });
                }
                Err(err) => {
                    aggregator.fail();
                    warn!(
                        vod_id = %vod_id,
                        page = aggregator.pages_fetched(),
                        offset,
                        error = %err,
                        "chat page failed, aborting run"
                    );
                    return Err(DomainError::Chat {
                        vod_id: vod_id.clone(),
                        offset,
                        source: err,
                    });
                }
            };

            let summary = aggregator.ingest(page);
            let pages = aggregator.pages_fetched();
            if pages % PROGRESS_EVERY == 1 {
                info!(
                    vod_id = %vod_id,
                    page = pages,
                    offset,
                    total = aggregator.messages().len(),
                    new_this_page = summary.new_messages,
                    "chat progress"
                );
            }

            match summary.state {
                RunState::Continuing { .. } => {
                    if self.settings.rate_limit.pause(cancel).await.is_err() {
                        aggregator.fail();
                        return Err(DomainError::Cancelled {
                            offset: aggregator.offset(),
                        });
                    }
                }
                RunState::Exhausted => {
                    info!(
                        vod_id = %vod_id,
                        pages,
                        total = aggregator.messages().len(),
                        "last chat page reached"
                    );
                    return Ok(aggregator);
                }
                RunState::Capped => {
                    warn!(
                        vod_id = %vod_id,
                        pages,
                        max_pages = self.settings.max_pages,
                        "safety stop: max pages reached, transcript may be incomplete"
                    );
                    return Ok(aggregator);
                }
                RunState::Failed => {
                    return Err(DomainError::Chat {
                        vod_id: vod_id.clone(),
                        offset,
                        source: FetchError::Fatal("aggregator already failed".into()),
                    });
                }
            }
        }
    }

    /// Download several VODs concurrently. A repeated id runs once; results
    /// keep first-seen order.
    pub async fn download_many(
        &self,
        jobs: Vec<(VodId, u64)>,
        cancel: &CancellationToken,
    ) -> Vec<(VodId, Result<ChatTranscript, DomainError>)> {
        let mut seen = HashSet::new();
        let jobs: Vec<(VodId, u64)> = jobs
            .into_iter()
            .filter(|(vod_id, _)| seen.insert(vod_id.clone()))
            .collect();

        let mut set = JoinSet::new();
        for (idx, (vod_id, duration)) in jobs.iter().cloned().enumerate() {
            let service = self.clone();
            let cancel = cancel.clone();
            set.spawn(async move {
                let result = service.download_chat(&vod_id, duration, &cancel).await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<Result<ChatTranscript, DomainError>>> =
            jobs.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!(error = %e, "chat task aborted"),
            }
        }

        jobs.into_iter()
            .zip(slots)
            .map(|((vod_id, _), slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(DomainError::Task(format!(
                        "chat task for {} did not finish",
                        vod_id
                    )))
                });
                (vod_id, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::JsonChatCache;
    use crate::domain::{ChatMessage, Page};
    use std::collections::{HashMap, VecDeque};
    use crate::shared::RateLimiter;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn msg(id: &str, offset: u64) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            offset_seconds: offset as f64,
            author: "User".into(),
            body: format!("text {}", id),
            emotes: vec![],
            color: None,
            badges: vec![],
            is_subscriber: false,
            is_moderator: false,
        }
    }

    fn page(items: &[(&str, u64)], next: Option<u64>) -> Page {
        Page::new(items.iter().map(|(id, o)| msg(id, *o)).collect(), next)
    }

    /// Replays scripted responses in order; records requested offsets.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Page, FetchError>>>,
        offsets: Mutex<Vec<u64>>,
        calls: AtomicU32,
        on_exhausted: Option<CancellationToken>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Page, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                offsets: Mutex::new(Vec::new()),
                calls: AtomicU32::new(0),
                on_exhausted: None,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn offsets(&self) -> Vec<u64> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatPageSource for ScriptedSource {
        async fn fetch_page(&self, _vod_id: &VodId, offset: u64) -> Result<Page, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.offsets.lock().unwrap().push(offset);
            let next = self.script.lock().unwrap().pop_front();
            let result = next.unwrap_or_else(|| Ok(Page::default()));
            if self.script.lock().unwrap().is_empty() {
                if let Some(token) = &self.on_exhausted {
                    token.cancel();
                }
            }
            result
        }
    }

    /// Never ends: one fresh message per page, always with a continuation.
    struct EndlessSource {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ChatPageSource for EndlessSource {
        async fn fetch_page(&self, _vod_id: &VodId, offset: u64) -> Result<Page, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let id = format!("m{}", n);
            Ok(page(&[(id.as_str(), offset + 1)], Some(offset + 1)))
        }
    }

    /// In-memory cache keyed by VOD id.
    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<VodId, Vec<ChatMessage>>>,
        writes: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ChatCache for MemoryCache {
        fn artifact_path(&self, vod_id: &VodId) -> std::path::PathBuf {
            std::path::PathBuf::from(format!("mem/{}_chat.json", vod_id))
        }

        async fn exists(&self, vod_id: &VodId) -> Result<bool, DomainError> {
            Ok(self.entries.lock().unwrap().contains_key(vod_id))
        }

        async fn load(&self, vod_id: &VodId) -> Result<Vec<ChatMessage>, DomainError> {
            self.entries
                .lock()
                .unwrap()
                .get(vod_id)
                .cloned()
                .ok_or_else(|| DomainError::Cache("missing".into()))
        }

        async fn persist(
            &self,
            vod_id: &VodId,
            messages: &[ChatMessage],
        ) -> Result<(), DomainError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .unwrap()
                .insert(vod_id.clone(), messages.to_vec());
            Ok(())
        }
    }

    fn ids(t: &ChatTranscript) -> Vec<&str> {
        t.messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn three_page_scenario_yields_five_unique_messages() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[("a", 0), ("b", 0), ("c", 5)], Some(5))),
            Ok(page(&[("c", 5), ("d", 5), ("e", 10)], Some(10))),
            Ok(Page::default()),
        ]));
        let cache = Arc::new(MemoryCache::default());
        let service = ChatService::new(source.clone(), cache.clone(), ChatSettings::immediate(100, 3));

        let t = service
            .download_chat(&VodId::new("v1"), 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ids(&t), vec!["a", "b", "c", "d", "e"]);
        assert!(!t.truncated);
        assert!(!t.from_cache);
        assert_eq!(t.pages_fetched, 3);
        assert_eq!(source.offsets(), vec![0, 5, 10]);
        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_run_hits_cache_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(JsonChatCache::new(dir.path()));
        let vod = VodId::new("v2");

        let first_source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[("a", 0), ("b", 3)], Some(3))),
            Ok(page(&[("c", 9)], None)),
        ]));
        let first = ChatService::new(first_source, cache.clone(), ChatSettings::immediate(100, 3))
            .download_chat(&vod, 60, &CancellationToken::new())
            .await
            .unwrap();

        let second_source = Arc::new(ScriptedSource::new(vec![]));
        let second = ChatService::new(second_source.clone(), cache, ChatSettings::immediate(100, 3))
            .download_chat(&vod, 60, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(second_source.calls(), 0);
        assert!(second.from_cache);
        assert_eq!(second.messages, first.messages);
    }

    #[tokio::test]
    async fn endless_pages_stop_at_exactly_the_ceiling() {
        let source = Arc::new(EndlessSource {
            calls: AtomicU32::new(0),
        });
        let cache = Arc::new(MemoryCache::default());
        let service = ChatService::new(source.clone(), cache.clone(), ChatSettings::immediate(7, 3));

        let t = service
            .download_chat(&VodId::new("v3"), 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 7);
        assert!(t.truncated);
        assert_eq!(t.len(), 7);
        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_below_attempt_cap_are_absorbed() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Transient("503".into())),
            Err(FetchError::Transient("timeout".into())),
            Ok(page(&[("a", 1)], None)),
        ]));
        let cache = Arc::new(MemoryCache::default());
        let service = ChatService::new(source.clone(), cache, ChatSettings::immediate(100, 3));

        let t = service
            .download_chat(&VodId::new("v4"), 60, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(ids(&t), vec!["a"]);
    }

    #[tokio::test]
    async fn persistent_transient_failure_fails_run_without_artifact() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[("a", 0), ("b", 4)], Some(4))),
            Err(FetchError::Transient("503".into())),
            Err(FetchError::Transient("503".into())),
            Err(FetchError::Transient("503".into())),
        ]));
        let cache = Arc::new(MemoryCache::default());
        let service = ChatService::new(source.clone(), cache.clone(), ChatSettings::immediate(100, 3));
        let vod = VodId::new("v5");

        let err = service
            .download_chat(&vod, 60, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(source.calls(), 4);
        match err {
            DomainError::Chat { offset, source, .. } => {
                assert_eq!(offset, 4);
                assert!(source.is_transient());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!cache.exists(&vod).await.unwrap());
        assert_eq!(cache.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let source = Arc::new(ScriptedSource::new(vec![Err(FetchError::Fatal(
            "401 unauthorized".into(),
        ))]));
        let cache = Arc::new(MemoryCache::default());
        let service = ChatService::new(source.clone(), cache, ChatSettings::immediate(100, 5));

        let err = service
            .download_chat(&VodId::new("v6"), 60, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(source.calls(), 1);
        assert!(matches!(err.fetch_error(), Some(FetchError::Fatal(_))));
    }

    #[tokio::test]
    async fn interruption_before_persist_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(JsonChatCache::new(dir.path()));
        let token = CancellationToken::new();
        let mut scripted = ScriptedSource::new(vec![
            Ok(page(&[("a", 0)], Some(2))),
            Ok(page(&[("b", 2)], None)),
        ]);
        scripted.on_exhausted = Some(token.clone());
        let service = ChatService::new(Arc::new(scripted), cache.clone(), ChatSettings::immediate(100, 3));
        let vod = VodId::new("v7");

        let err = service.download_chat(&vod, 60, &token).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(!cache.artifact_path(&vod).exists());
        let leftovers = std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_any_fetch() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page(&[("a", 0)], None))]));
        let cache = Arc::new(MemoryCache::default());
        let service = ChatService::new(source.clone(), cache, ChatSettings::immediate(100, 3));
        let token = CancellationToken::new();
        token.cancel();

        let err = service
            .download_chat(&VodId::new("v8"), 60, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Cancelled { offset: 0 }));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn walk_stops_once_cursor_reaches_duration() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[("a", 10), ("b", 20)], Some(20))),
            Ok(page(&[("c", 40), ("d", 50)], Some(50))),
            Ok(page(&[("e", 55), ("f", 61)], Some(61))),
        ]));
        let cache = Arc::new(MemoryCache::default());
        let service = ChatService::new(source.clone(), cache, ChatSettings::immediate(100, 3));

        let t = service
            .download_chat(&VodId::new("v9"), 60, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(source.offsets(), vec![0, 20, 50]);
        assert_eq!(t.len(), 6);
    }

    #[tokio::test]
    async fn concurrent_runs_keep_separate_state() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(JsonChatCache::new(dir.path()));
        let source = Arc::new(EndlessSource {
            calls: AtomicU32::new(0),
        });
        let service = ChatService::new(source.clone(), cache.clone(), ChatSettings::immediate(4, 3));
        let jobs = vec![(VodId::new("x"), 0), (VodId::new("y"), 0), (VodId::new("z"), 0)];

        let results = service.download_many(jobs, &CancellationToken::new()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, VodId::new("x"));
        for (vod, result) in &results {
            let t = result.as_ref().unwrap();
            assert_eq!(&t.vod_id, vod);
            assert_eq!(t.len(), 4);
            assert!(t.truncated);
            assert!(cache.artifact_path(vod).exists());
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn repeated_ids_run_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(JsonChatCache::new(dir.path()));
        let source = Arc::new(EndlessSource {
            calls: AtomicU32::new(0),
        });
        let service = ChatService::new(source.clone(), cache, ChatSettings::immediate(3, 1));
        let jobs = vec![(VodId::new("123"), 0), (VodId::new("123"), 0), (VodId::new("9"), 0)];

        let results = service.download_many(jobs, &CancellationToken::new()).await;

        let got: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(got, vec!["123", "9"]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    }

    /// First page answers, every later request hangs until dropped.
    struct StallingSource {
        first: Mutex<Option<Page>>,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ChatPageSource for StallingSource {
        async fn fetch_page(&self, _vod_id: &VodId, _offset: u64) -> Result<Page, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first = self.first.lock().unwrap().take();
            match first {
                Some(page) => Ok(page),
                None => std::future::pending::<Result<Page, FetchError>>().await,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_in_flight_request() {
        let cache = Arc::new(MemoryCache::default());
        let source = Arc::new(StallingSource {
            first: Mutex::new(Some(page(&[("a", 0), ("b", 7)], Some(7)))),
            calls: AtomicU32::new(0),
        });
        let service = ChatService::new(source.clone(), cache.clone(), ChatSettings::immediate(100, 3));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let vod = VodId::new("hang");

        let err = service.download_chat(&vod, 600, &token).await.unwrap_err();

        assert!(matches!(err, DomainError::Cancelled { offset: 7 }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(!cache.exists(&vod).await.unwrap());
        assert_eq!(cache.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_pauses_between_pages_not_between_retries() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[("a", 0), ("b", 5)], Some(5))),
            Err(FetchError::Transient("503".into())),
            Err(FetchError::Transient("429".into())),
            Ok(page(&[("c", 10)], Some(10))),
            Ok(Page::default()),
        ]));
        let cache = Arc::new(MemoryCache::default());
        let pause = Duration::from_millis(250);
        let settings = ChatSettings {
            rate_limit: RateLimiter::new(pause, pause),
            ..ChatSettings::immediate(100, 3)
        };
        let service = ChatService::new(source.clone(), cache, settings);
        let start = tokio::time::Instant::now();

        let t = service
            .download_chat(&VodId::new("pace"), 100, &CancellationToken::new())
            .await
            .unwrap();

        // 3 pages -> 2 pauses; the two retried attempts add none
        assert_eq!(t.pages_fetched, 3);
        assert_eq!(source.calls(), 5);
        let elapsed = start.elapsed();
        assert!(elapsed >= pause * 2, "elapsed {elapsed:?}");
        assert!(elapsed < pause * 3, "elapsed {elapsed:?}");
    }
}
