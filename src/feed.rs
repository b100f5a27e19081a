//! The feed session: consumer-facing API over the pager and coordinator.
//!
//! All mutable state (loaded items, pagination flags, cache, in-flight set)
//! lives inside [`Feed`] and is touched only by the task that owns it.
//! Network and decode work runs on spawned worker tasks whose results come
//! back over an mpsc channel; the owner applies them one at a time with
//! [`Feed::process_next`]. Workers never see shared mutable state, so none
//! of the structures need locks.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::api::{CatalogSource, Item};
use crate::asset::Asset;
use crate::cache::AssetCache;
use crate::coordinator::{Coordinator, Lookup};
use crate::error::FetchError;
use crate::memory::{self, MemoryBudget};
use crate::pager::Pager;

/// Notifications delivered to feed subscribers.
///
/// A subscriber that has gone away is pruned silently; results arriving for
/// consumers that lost interest are no-ops by construction.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A page load appended `count` items starting at `offset`.
    ItemsInserted { offset: usize, count: usize },
    /// The asset for `key` is now in the cache.
    AssetReady { key: String, position: Option<usize> },
    /// The fetch for `key` failed; the key is eligible for a fresh request.
    AssetFailed { key: String },
    /// A page load failed; pagination is back to idle and may be retried.
    PageFailed { error: String },
}

/// Worker task results marshaled back to the owning context.
enum WorkerMessage {
    PageLoaded {
        result: Result<Vec<Item>, FetchError>,
        started: Instant,
    },
    AssetFetched {
        key: String,
        position: Option<usize>,
        result: Result<Asset, FetchError>,
    },
}

pub struct Feed {
    pager: Pager,
    coordinator: Coordinator,
    source: Arc<dyn CatalogSource>,
    worker_tx: mpsc::UnboundedSender<WorkerMessage>,
    worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    subscribers: Vec<mpsc::UnboundedSender<FeedEvent>>,
}

impl Feed {
    /// Build a feed session. The cache capacity is derived from the budget
    /// once, here; the budget is not re-consulted on later insertions.
    pub fn new(
        source: Arc<dyn CatalogSource>,
        budget: &dyn MemoryBudget,
        page_size: usize,
    ) -> Self {
        let capacity = memory::cache_capacity(budget) as usize;
        log::info!("asset cache capacity: {capacity} bytes");

        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        Self {
            pager: Pager::new(page_size),
            coordinator: Coordinator::new(AssetCache::new(capacity)),
            source,
            worker_tx,
            worker_rx,
            subscribers: Vec::new(),
        }
    }

    /// Register an observer for feed notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<FeedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Kick off the next page load unless one is running or the catalog is
    /// exhausted. Returns the current all-loaded state so scroll triggers
    /// can unregister themselves once it turns true.
    pub fn request_next_page(&mut self) -> bool {
        if let Some(request) = self.pager.begin_load() {
            log::debug!("loading page at offset {}", request.offset);
            let source = Arc::clone(&self.source);
            let tx = self.worker_tx.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let result = source.fetch_page(request.offset, request.limit).await;
                let _ = tx.send(WorkerMessage::PageLoaded { result, started });
            });
        }
        self.pager.all_loaded()
    }

    /// Resolve an asset, dispatching a fetch on a miss.
    ///
    /// `Some` is a synchronous cache hit. `None` means not ready yet: either
    /// a fetch was just dispatched or one is already in flight for this key,
    /// and an [`FeedEvent::AssetReady`] or [`FeedEvent::AssetFailed`] will
    /// follow. At most one fetch per key is outstanding at any time.
    pub fn request_asset(&mut self, key: &str, position: Option<usize>) -> Option<Arc<Asset>> {
        match self.coordinator.lookup(key) {
            Lookup::Hit(asset) => Some(asset),
            Lookup::InFlight => None,
            Lookup::Dispatch => {
                let source = Arc::clone(&self.source);
                let tx = self.worker_tx.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    let result = match source.fetch_asset_bytes(&key).await {
                        Ok(raw) => Asset::decode(&raw.bytes, &raw.content_type),
                        Err(e) => Err(e),
                    };
                    let _ = tx.send(WorkerMessage::AssetFetched {
                        key,
                        position,
                        result,
                    });
                });
                None
            }
        }
    }

    /// Wait for the next worker result and apply it.
    ///
    /// This is the single point where feed state mutates. Returns `false`
    /// only if the worker channel is closed, which cannot happen while the
    /// feed itself holds a sender.
    pub async fn process_next(&mut self) -> bool {
        match self.worker_rx.recv().await {
            Some(message) => {
                self.apply(message);
                true
            }
            None => false,
        }
    }

    /// Drive the apply loop until the worker channel closes.
    ///
    /// For consumers that park the feed on a dedicated task and watch their
    /// subscriptions from elsewhere. Callers that inspect feed state between
    /// results drive [`Feed::process_next`] directly instead.
    pub async fn run(&mut self) {
        while self.process_next().await {}
    }

    pub fn items(&self) -> &[Item] {
        self.pager.items()
    }

    pub fn loaded_count(&self) -> usize {
        self.pager.loaded_count()
    }

    pub fn is_loading(&self) -> bool {
        self.pager.is_loading()
    }

    pub fn all_loaded(&self) -> bool {
        self.pager.all_loaded()
    }

    pub fn log_cache_stats(&self) {
        self.coordinator.cache().log_stats();
    }

    fn apply(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::PageLoaded {
                result: Ok(page),
                started,
            } => {
                let (offset, count) = self.pager.complete(page);
                log::info!(
                    "loaded {count} items in {:.2}s, {} total",
                    started.elapsed().as_secs_f64(),
                    self.pager.loaded_count()
                );
                if count > 0 {
                    self.emit(FeedEvent::ItemsInserted { offset, count });
                }
            }
            WorkerMessage::PageLoaded {
                result: Err(error), ..
            } => {
                self.pager.fail();
                log::warn!("page load failed: {error}");
                self.emit(FeedEvent::PageFailed {
                    error: error.to_string(),
                });
            }
            WorkerMessage::AssetFetched {
                key,
                position,
                result: Ok(asset),
            } => {
                self.coordinator.complete(&key, Arc::new(asset));
                self.emit(FeedEvent::AssetReady { key, position });
            }
            WorkerMessage::AssetFetched {
                key,
                result: Err(error),
                ..
            } => {
                self.coordinator.fail(&key);
                if error.is_retryable() {
                    log::debug!("asset fetch for {key} deferred: {error}");
                } else {
                    log::warn!("asset fetch for {key} failed: {error}");
                }
                self.emit(FeedEvent::AssetFailed { key });
            }
        }
    }

    fn emit(&mut self, event: FeedEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RawAsset;
    use crate::memory::FixedBudget;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Local;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes() -> Bytes {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    /// In-memory catalog with call accounting.
    struct FakeCatalog {
        total_items: usize,
        page_calls: AtomicUsize,
        asset_calls: Mutex<HashMap<String, usize>>,
        fail_pages: bool,
        asset_error: Mutex<Option<FetchError>>,
    }

    impl FakeCatalog {
        fn with_items(total_items: usize) -> Self {
            Self {
                total_items,
                page_calls: AtomicUsize::new(0),
                asset_calls: Mutex::new(HashMap::new()),
                fail_pages: false,
                asset_error: Mutex::new(None),
            }
        }

        fn failing_pages() -> Self {
            Self {
                fail_pages: true,
                ..Self::with_items(0)
            }
        }

        fn set_asset_error(&self, error: FetchError) {
            *self.asset_error.lock().unwrap() = Some(error);
        }

        fn asset_calls_for(&self, key: &str) -> usize {
            *self.asset_calls.lock().unwrap().get(key).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Item>, FetchError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_pages {
                return Err(FetchError::Transport("connection refused".to_string()));
            }

            let end = (offset + limit).min(self.total_items);
            Ok((offset..end)
                .map(|i| Item {
                    id: format!("item-{i}"),
                    created_at: Local::now(),
                    tags: Vec::new(),
                })
                .collect())
        }

        async fn fetch_asset_bytes(&self, id: &str) -> Result<RawAsset, FetchError> {
            *self
                .asset_calls
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_insert(0) += 1;

            if let Some(error) = self.asset_error.lock().unwrap().take() {
                return Err(error);
            }

            Ok(RawAsset {
                bytes: png_bytes(),
                content_type: "image/png".to_string(),
            })
        }
    }

    fn feed_over(catalog: Arc<FakeCatalog>, page_size: usize) -> Feed {
        Feed::new(catalog, &FixedBudget(64 * 1024 * 1024), page_size)
    }

    #[tokio::test]
    async fn test_pages_through_a_37_item_catalog() {
        let catalog = Arc::new(FakeCatalog::with_items(37));
        let mut feed = feed_over(Arc::clone(&catalog), 15);
        let mut events = feed.subscribe();

        let expectations = [(15, false), (30, false), (37, true)];
        for (expected_count, expected_all_loaded) in expectations {
            feed.request_next_page();
            assert!(feed.process_next().await);
            assert_eq!(feed.loaded_count(), expected_count);
            assert_eq!(feed.all_loaded(), expected_all_loaded);
        }

        // Exhausted: the trigger reports done and no further fetch happens.
        assert!(feed.request_next_page());
        assert_eq!(catalog.page_calls.load(Ordering::SeqCst), 3);

        let mut inserted = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let FeedEvent::ItemsInserted { offset, count } = event {
                inserted.push((offset, count));
            }
        }
        assert_eq!(inserted, vec![(0, 15), (15, 15), (30, 7)]);
    }

    #[tokio::test]
    async fn test_request_next_page_is_noop_while_loading() {
        let catalog = Arc::new(FakeCatalog::with_items(20));
        let mut feed = feed_over(Arc::clone(&catalog), 10);

        feed.request_next_page();
        feed.request_next_page();
        feed.request_next_page();
        assert!(feed.process_next().await);

        assert_eq!(catalog.page_calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.loaded_count(), 10);
    }

    #[tokio::test]
    async fn test_page_failure_leaves_state_retryable() {
        let catalog = Arc::new(FakeCatalog::failing_pages());
        let mut feed = feed_over(Arc::clone(&catalog), 10);
        let mut events = feed.subscribe();

        feed.request_next_page();
        assert!(feed.process_next().await);

        assert!(matches!(
            events.try_recv().unwrap(),
            FeedEvent::PageFailed { .. }
        ));
        assert_eq!(feed.loaded_count(), 0);
        assert!(!feed.all_loaded());

        // Back to idle: a retry dispatches a fresh fetch.
        feed.request_next_page();
        assert!(feed.process_next().await);
        assert_eq!(catalog.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_asset_requests_deduplicate() {
        let catalog = Arc::new(FakeCatalog::with_items(0));
        let mut feed = feed_over(Arc::clone(&catalog), 10);
        let mut first = feed.subscribe();
        let mut second = feed.subscribe();

        // Three callers ask before the fetch resolves.
        assert!(feed.request_asset("abc", Some(0)).is_none());
        assert!(feed.request_asset("abc", Some(0)).is_none());
        assert!(feed.request_asset("abc", Some(0)).is_none());

        assert!(feed.process_next().await);

        // Exactly one underlying fetch, one broadcast per subscriber.
        assert_eq!(catalog.asset_calls_for("abc"), 1);
        for events in [&mut first, &mut second] {
            match events.try_recv().unwrap() {
                FeedEvent::AssetReady { key, position } => {
                    assert_eq!(key, "abc");
                    assert_eq!(position, Some(0));
                }
                other => panic!("unexpected event: {other:?}"),
            }
            assert!(events.try_recv().is_err());
        }

        // Now a synchronous hit.
        assert!(feed.request_asset("abc", Some(0)).is_some());
        assert_eq!(catalog.asset_calls_for("abc"), 1);
    }

    #[tokio::test]
    async fn test_failed_asset_fetch_is_not_deduplicated_afterwards() {
        let catalog = Arc::new(FakeCatalog::with_items(0));
        catalog.set_asset_error(FetchError::Transport("reset by peer".to_string()));
        let mut feed = feed_over(Arc::clone(&catalog), 10);
        let mut events = feed.subscribe();

        assert!(feed.request_asset("abc", None).is_none());
        assert!(feed.process_next().await);

        match events.try_recv().unwrap() {
            FeedEvent::AssetFailed { key } => assert_eq!(key, "abc"),
            other => panic!("unexpected event: {other:?}"),
        }

        // Nothing cached, and the next request dispatches a new fetch.
        assert!(feed.request_asset("abc", None).is_none());
        assert!(feed.process_next().await);
        assert_eq!(catalog.asset_calls_for("abc"), 2);
        assert!(matches!(
            events.try_recv().unwrap(),
            FeedEvent::AssetReady { .. }
        ));
    }

    #[tokio::test]
    async fn test_resource_exhausted_does_not_poison_the_key() {
        let catalog = Arc::new(FakeCatalog::with_items(0));
        catalog.set_asset_error(FetchError::ResourceExhausted {
            declared: 1 << 30,
            available: 1 << 20,
        });
        let mut feed = feed_over(Arc::clone(&catalog), 10);
        let mut events = feed.subscribe();

        assert!(feed.request_asset("big", None).is_none());
        assert!(feed.process_next().await);
        assert!(matches!(
            events.try_recv().unwrap(),
            FeedEvent::AssetFailed { .. }
        ));

        // Immediately eligible again, no backoff.
        assert!(feed.request_asset("big", None).is_none());
        assert!(feed.process_next().await);
        assert_eq!(catalog.asset_calls_for("big"), 2);
        assert!(feed.request_asset("big", None).is_some());
    }

    #[tokio::test]
    async fn test_run_applies_results_on_a_dedicated_task() {
        let catalog = Arc::new(FakeCatalog::with_items(5));
        let mut feed = feed_over(Arc::clone(&catalog), 15);
        let mut events = feed.subscribe();

        feed.request_next_page();
        assert!(feed.request_asset("abc", Some(0)).is_none());
        tokio::spawn(async move { feed.run().await });

        // The parked feed keeps applying worker results; both notifications
        // arrive without the test driving process_next itself.
        let mut saw_items = false;
        let mut saw_asset = false;
        while !(saw_items && saw_asset) {
            match events.recv().await.unwrap() {
                FeedEvent::ItemsInserted { offset, count } => {
                    assert_eq!((offset, count), (0, 5));
                    saw_items = true;
                }
                FeedEvent::AssetReady { key, .. } => {
                    assert_eq!(key, "abc");
                    saw_asset = true;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let catalog = Arc::new(FakeCatalog::with_items(0));
        let mut feed = feed_over(Arc::clone(&catalog), 10);

        let events = feed.subscribe();
        drop(events);

        // Emitting to a dead subscriber must not fail or leak.
        feed.request_asset("abc", None);
        assert!(feed.process_next().await);
        assert!(feed.subscribers.is_empty());
    }
}
