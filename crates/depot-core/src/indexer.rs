//! The storage indexer.
//!
//! [`Indexer`] keeps the current catalog in memory and refreshes it from the
//! package storage bucket. A refresh first reads the small cursor object; the
//! full `search-index-all` document is only downloaded when the cursor moved.
//! A new catalog is published with a single pointer swap, so readers calling
//! [`Indexer::get`] never block on a refresh and never see a partial catalog.

use std::{
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use depot_events::{EventSinkHandle, IndexEvent, RefreshStage};
use depot_registry::{
    load_cursor, load_search_index_all, BucketRef, GetOptions, ObjectStore, Packages,
    RegistryError, RemoteResolver, StorageResolver,
};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

use crate::{
    error::{IndexerError, Result},
    snapshot::Snapshot,
    transform::transform_search_index_all,
};

/// Options of the storage indexer.
#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// Location of the index, `gs://<bucket>/<root path>`.
    pub package_storage_bucket_internal: String,
    /// Public base URL artifacts are downloaded from.
    pub package_storage_endpoint: String,
    /// Time between refreshes. Zero disables the background loop.
    pub watch_interval: Duration,
}

/// Result of a refresh cycle that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The remote cursor matched the published one.
    Unchanged { cursor: String },
    /// A new catalog was published.
    Updated { cursor: String, package_count: usize },
}

struct Remote {
    bucket: BucketRef,
    resolver: Arc<dyn RemoteResolver>,
}

pub struct Indexer {
    options: IndexerOptions,
    store: Arc<dyn ObjectStore>,
    events: EventSinkHandle,
    remote: OnceLock<Remote>,
    current: ArcSwap<Snapshot>,
    update_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        options: IndexerOptions,
        events: EventSinkHandle,
    ) -> Self {
        Self {
            options,
            store,
            events,
            remote: OnceLock::new(),
            current: ArcSwap::from_pointee(Snapshot::empty()),
            update_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    /// Validates the options, loads the index once and starts watching it.
    ///
    /// Fails if the options are invalid, if the first load fails or if the
    /// indexer was initialized before. On success the watcher runs until
    /// `shutdown` is cancelled; the returned handle completes when it stops.
    pub async fn init(self: &Arc<Self>, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
        debug!("Initialize storage indexer");

        let remote = validate_options(&self.options)?;
        self.remote
            .set(remote)
            .map_err(|_| IndexerError::AlreadyInitialized)?;

        self.update_index()
            .await
            .map_err(|err| IndexerError::InitialUpdate(Box::new(err)))?;

        let indexer = Arc::clone(self);
        Ok(tokio::spawn(async move {
            indexer.watch_indices(shutdown).await;
        }))
    }

    async fn watch_indices(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = self.options.watch_interval;
        if interval.is_zero() {
            debug!("No watch interval configured, indices will not be updated (use only for testing purposes)");
            return;
        }

        debug!(watch_interval = ?interval, "Watch indices for changes");
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Stop watching indices");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.update_index().await {
                error!(
                    error = %err.chain(),
                    stage = err.stage().as_str(),
                    "can't update index file"
                );
            }
        }
    }

    /// Runs one refresh cycle.
    ///
    /// Cycles are serialized. A failed cycle leaves the published catalog
    /// untouched; the next cycle retries from the cursor.
    pub async fn update_index(&self) -> Result<RefreshOutcome> {
        let remote = self.remote.get().ok_or(IndexerError::NotInitialized)?;
        let _guard = self.update_lock.lock().await;

        let start = Instant::now();
        let result = self.refresh(remote).await;
        self.events.emit(IndexEvent::RefreshDuration(start.elapsed()));

        if let Err(err) = &result {
            self.events.emit(IndexEvent::RefreshFailed {
                stage: err.stage(),
                message: err.chain(),
            });
        }
        result
    }

    async fn refresh(&self, remote: &Remote) -> Result<RefreshOutcome> {
        let store = Arc::clone(&self.store);
        let bucket = remote.bucket.clone();
        let storage_cursor = run_blocking(RefreshStage::Cursor, move || {
            load_cursor(store.as_ref(), &bucket)
        })
        .await?
        .map_err(IndexerError::LoadCursor)?;

        let current_cursor = self.current.load().cursor().to_string();
        if storage_cursor.current == current_cursor {
            debug!(cursor.current = %current_cursor, "Cursor is up-to-date");
            self.events.emit(IndexEvent::RefreshSkipped {
                cursor: current_cursor.clone(),
            });
            return Ok(RefreshOutcome::Unchanged {
                cursor: current_cursor,
            });
        }

        info!(
            cursor.current = %current_cursor,
            cursor.next = %storage_cursor.current,
            "Cursor will be updated"
        );

        let cursor = storage_cursor.current.clone();
        let store = Arc::clone(&self.store);
        let bucket = remote.bucket.clone();
        let index = run_blocking(RefreshStage::Manifest, move || {
            load_search_index_all(store.as_ref(), &bucket, &storage_cursor)
        })
        .await?
        .map_err(|source| {
            IndexerError::LoadIndex {
                cursor: cursor.clone(),
                source,
            }
        })?;
        debug!(index.packages = index.packages.len(), "Downloaded new search-index-all index");

        let packages = transform_search_index_all(index, &remote.resolver).map_err(|source| {
            IndexerError::Transform {
                cursor: cursor.clone(),
                source,
            }
        })?;
        let package_count = packages.len();

        self.current
            .store(Arc::new(Snapshot::new(cursor.clone(), packages)));
        info!(cursor.current = %cursor, packages = package_count, "Published new index");

        self.events.emit(IndexEvent::RefreshSucceeded {
            cursor: cursor.clone(),
            package_count,
        });
        Ok(RefreshOutcome::Updated {
            cursor,
            package_count,
        })
    }

    /// Returns the current packages, narrowed by the filter in `opts` if any.
    pub fn get(&self, opts: Option<&GetOptions>) -> Packages {
        let start = Instant::now();
        let snapshot = self.current.load();

        let packages = match opts.and_then(|opts| opts.filter.as_deref()) {
            Some(filter) => filter.apply(snapshot.packages()),
            None => Arc::clone(snapshot.packages()),
        };

        self.events.emit(IndexEvent::QueryDuration(start.elapsed()));
        packages
    }

    /// The currently published cursor and packages.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }
}

fn validate_options(options: &IndexerOptions) -> Result<Remote> {
    let bucket = BucketRef::parse(&options.package_storage_bucket_internal).map_err(|source| {
        IndexerError::Validation {
            reason: "invalid package_storage_bucket_internal".to_string(),
            source,
        }
    })?;

    let endpoint = Url::parse(&options.package_storage_endpoint).map_err(|err| {
        IndexerError::Validation {
            reason: "invalid package_storage_endpoint".to_string(),
            source: RegistryError::Url(
                options.package_storage_endpoint.clone(),
                err,
            ),
        }
    })?;
    let resolver = StorageResolver::new(&endpoint).map_err(|source| {
        IndexerError::Validation {
            reason: "invalid package_storage_endpoint".to_string(),
            source,
        }
    })?;

    Ok(Remote {
        bucket,
        resolver: Arc::new(resolver),
    })
}

async fn run_blocking<T, F>(stage: RefreshStage, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|source| {
            IndexerError::Task {
                stage,
                source,
            }
        })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::{mpsc, Mutex as StdMutex},
    };

    use depot_events::CollectorSink;
    use depot_registry::NameVersionFilter;

    use super::*;

    const BUCKET: &str = "gs://packages/root";
    const CURSOR_PATH: &str = "root/v2/metadata/cursor.json";

    fn index_path(cursor: &str) -> String {
        format!("root/v2/metadata/{cursor}/search-index-all.json")
    }

    /// In-memory object store recording every fetch.
    #[derive(Default)]
    struct MockStore {
        objects: StdMutex<HashMap<String, Vec<u8>>>,
        failing: StdMutex<HashSet<String>>,
        fetches: StdMutex<Vec<String>>,
        stall: StdMutex<Option<Stall>>,
    }

    struct Stall {
        path: String,
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl MockStore {
        fn put(&self, path: &str, content: String) {
            self.objects
                .lock()
                .unwrap()
                .insert(path.to_string(), content.into_bytes());
        }

        fn set_cursor(&self, cursor: &str) {
            self.put(CURSOR_PATH, format!(r#"{{"current": "{cursor}"}}"#));
        }

        fn set_index(&self, cursor: &str, entries: &[(&str, &str)]) {
            let packages: Vec<_> = entries
                .iter()
                .map(|(name, version)| {
                    serde_json::json!({"package_manifest": {"name": name, "version": version}})
                })
                .collect();
            self.put(
                &index_path(cursor),
                serde_json::json!({ "packages": packages }).to_string(),
            );
        }

        fn fail(&self, path: &str, failing: bool) {
            let mut set = self.failing.lock().unwrap();
            if failing {
                set.insert(path.to_string());
            } else {
                set.remove(path);
            }
        }

        fn fetch_count(&self, path: &str) -> usize {
            self.fetches
                .lock()
                .unwrap()
                .iter()
                .filter(|p| *p == path)
                .count()
        }
    }

    impl ObjectStore for MockStore {
        fn fetch_object(&self, bucket: &str, path: &str) -> depot_registry::Result<Vec<u8>> {
            self.fetches.lock().unwrap().push(path.to_string());

            let stall = self.stall.lock().unwrap().take();
            match stall {
                Some(stall) if stall.path == path => {
                    stall.entered.send(()).unwrap();
                    stall.release.recv().unwrap();
                }
                Some(stall) => *self.stall.lock().unwrap() = Some(stall),
                None => {}
            }

            if self.failing.lock().unwrap().contains(path) {
                return Err(RegistryError::FetchFailed {
                    url: path.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            self.objects
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| {
                    RegistryError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        path: path.to_string(),
                    }
                })
        }
    }

    fn options(watch_interval: Duration) -> IndexerOptions {
        IndexerOptions {
            package_storage_bucket_internal: BUCKET.to_string(),
            package_storage_endpoint: "https://packages.example.com/".to_string(),
            watch_interval,
        }
    }

    fn indexer(store: &Arc<MockStore>, watch_interval: Duration) -> (Arc<Indexer>, Arc<CollectorSink>) {
        let events = Arc::new(CollectorSink::default());
        let indexer = Indexer::new(
            store.clone(),
            options(watch_interval),
            events.clone(),
        );
        (Arc::new(indexer), events)
    }

    fn seeded_store() -> Arc<MockStore> {
        let store = Arc::new(MockStore::default());
        store.set_cursor("a");
        store.set_index("a", &[("foo", "1.2.3"), ("bar", "0.1.0")]);
        store
    }

    #[tokio::test]
    async fn test_init_loads_index() {
        let store = seeded_store();
        let (indexer, events) = indexer(&store, Duration::ZERO);

        let handle = indexer.init(CancellationToken::new()).await.unwrap();
        handle.await.unwrap();

        let snapshot = indexer.snapshot();
        assert_eq!(snapshot.cursor(), "a");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.packages()[0].base_path, "foo-1.2.3.zip");
        assert!(events.events().iter().any(|event| {
            matches!(
                event,
                IndexEvent::RefreshSucceeded {
                    package_count: 2,
                    ..
                }
            )
        }));
    }

    #[tokio::test]
    async fn test_unchanged_cursor_skips_download() {
        let store = seeded_store();
        let (indexer, events) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();
        let before = indexer.snapshot();

        let outcome = indexer.update_index().await.unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Unchanged {
                cursor: "a".to_string()
            }
        );
        assert_eq!(store.fetch_count(&index_path("a")), 1);
        assert_eq!(store.fetch_count(CURSOR_PATH), 2);
        assert!(Arc::ptr_eq(&before, &indexer.snapshot()));
        assert!(events
            .events()
            .iter()
            .any(|event| matches!(event, IndexEvent::RefreshSkipped { .. })));
    }

    #[tokio::test]
    async fn test_new_cursor_publishes_new_snapshot() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();

        store.set_index("b", &[("foo", "1.2.3"), ("foo", "1.3.0"), ("baz", "2.0.0")]);
        store.set_cursor("b");

        let outcome = indexer.update_index().await.unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Updated {
                cursor: "b".to_string(),
                package_count: 3
            }
        );
        let snapshot = indexer.snapshot();
        assert_eq!(snapshot.cursor(), "b");
        assert_eq!(snapshot.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot_and_recovers() {
        let store = seeded_store();
        let (indexer, events) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();
        let before = indexer.snapshot();

        store.set_index("b", &[("baz", "2.0.0")]);
        store.set_cursor("b");
        store.fail(&index_path("b"), true);

        for _ in 0..3 {
            let err = indexer.update_index().await.unwrap_err();
            assert!(matches!(err, IndexerError::LoadIndex { .. }));
            assert!(Arc::ptr_eq(&before, &indexer.snapshot()));
            assert_eq!(indexer.get(None).len(), 2);
        }
        assert!(events.events().iter().any(|event| {
            matches!(
                event,
                IndexEvent::RefreshFailed {
                    stage: RefreshStage::Manifest,
                    ..
                }
            )
        }));

        store.fail(&index_path("b"), false);
        indexer.update_index().await.unwrap();
        let snapshot = indexer.snapshot();
        assert_eq!(snapshot.cursor(), "b");
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_failure_keeps_snapshot() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();

        store.fail(CURSOR_PATH, true);
        let err = indexer.update_index().await.unwrap_err();
        assert_eq!(err.stage(), RefreshStage::Cursor);
        assert_eq!(indexer.snapshot().cursor(), "a");
    }

    #[tokio::test]
    async fn test_invalid_entry_aborts_cycle() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();

        store.set_index("b", &[("foo", "1.2.3"), ("bad", "latest")]);
        store.set_cursor("b");

        let err = indexer.update_index().await.unwrap_err();
        assert!(matches!(err, IndexerError::Transform { .. }));
        assert_eq!(indexer.snapshot().cursor(), "a");
    }

    #[tokio::test]
    async fn test_get_with_filter() {
        let store = seeded_store();
        let (indexer, events) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();

        let opts = GetOptions::with_filter(NameVersionFilter::new("foo", "1.2.3"));
        let found = indexer.get(Some(&opts));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "foo");

        let opts = GetOptions::with_filter(NameVersionFilter::new("foo", "9.9.9"));
        assert!(indexer.get(Some(&opts)).is_empty());
        assert_eq!(indexer.get(None).len(), 2);
        assert!(events
            .events()
            .iter()
            .any(|event| matches!(event, IndexEvent::QueryDuration(_))));
    }

    #[tokio::test]
    async fn test_get_before_init_is_empty() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        assert!(indexer.get(None).is_empty());
        assert_eq!(indexer.snapshot().cursor(), "");
        assert!(matches!(
            indexer.update_index().await,
            Err(IndexerError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_init_fails_on_invalid_options() {
        let store = seeded_store();
        let events: EventSinkHandle = Arc::new(CollectorSink::default());

        let mut opts = options(Duration::ZERO);
        opts.package_storage_bucket_internal = "s3://packages/root".to_string();
        let indexer = Arc::new(Indexer::new(store.clone(), opts, events.clone()));
        let err = indexer.init(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, IndexerError::Validation { .. }));

        let mut opts = options(Duration::ZERO);
        opts.package_storage_endpoint = "not a url".to_string();
        let indexer = Arc::new(Indexer::new(store.clone(), opts, events));
        let err = indexer.init(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, IndexerError::Validation { .. }));

        assert_eq!(store.fetch_count(CURSOR_PATH), 0);
    }

    #[tokio::test]
    async fn test_init_fails_when_first_load_fails() {
        let store = Arc::new(MockStore::default());
        let (indexer, _) = indexer(&store, Duration::ZERO);

        let err = indexer.init(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, IndexerError::InitialUpdate(_)));
        assert_eq!(err.stage(), RefreshStage::Cursor);
        assert!(indexer.get(None).is_empty());
    }

    #[tokio::test]
    async fn test_second_init_fails() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();

        let err = indexer.init(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, IndexerError::AlreadyInitialized));
    }

    #[tokio::test]
    async fn test_watcher_picks_up_changes_and_stops() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::from_millis(20));
        let shutdown = CancellationToken::new();
        let handle = indexer.init(shutdown.clone()).await.unwrap();

        store.set_index("b", &[("baz", "2.0.0")]);
        store.set_cursor("b");

        let updated = time::timeout(Duration::from_secs(5), async {
            while indexer.snapshot().cursor() != "b" {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(updated.is_ok(), "watcher did not publish the new cursor");

        shutdown.cancel();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_lets_in_flight_refresh_finish() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::from_millis(20));
        let shutdown = CancellationToken::new();
        let handle = indexer.init(shutdown.clone()).await.unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        store.set_index("b", &[("baz", "2.0.0")]);
        *store.stall.lock().unwrap() = Some(Stall {
            path: index_path("b"),
            entered: entered_tx,
            release: release_rx,
        });
        store.set_cursor("b");

        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .expect("watcher did not start a refresh");

        shutdown.cancel();
        time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(indexer.snapshot().cursor(), "a");

        release_tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
        assert_eq!(indexer.snapshot().cursor(), "b");
        assert_eq!(indexer.snapshot().len(), 1);

        let cursor_fetches = store.fetch_count(CURSOR_PATH);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.fetch_count(CURSOR_PATH), cursor_fetches);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_watcher() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        let handle = indexer.init(CancellationToken::new()).await.unwrap();

        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watcher should return immediately")
            .unwrap();

        store.set_index("b", &[("baz", "2.0.0")]);
        store.set_cursor("b");
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(indexer.snapshot().cursor(), "a");
        assert_eq!(store.fetch_count(CURSOR_PATH), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_see_previous_snapshot_during_refresh() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();

        store.set_index("b", &[("foo", "1.2.3"), ("bar", "0.1.0"), ("baz", "2.0.0")]);
        store.set_cursor("b");

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *store.stall.lock().unwrap() = Some(Stall {
            path: index_path("b"),
            entered: entered_tx,
            release: release_rx,
        });

        let refresh = {
            let indexer = indexer.clone();
            tokio::spawn(async move { indexer.update_index().await })
        };
        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .unwrap()
            .unwrap();

        let mut readers = Vec::new();
        for _ in 0..16 {
            let indexer = indexer.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let snapshot = indexer.snapshot();
                    assert_eq!(snapshot.cursor(), "a");
                    assert_eq!(snapshot.len(), 2);
                    let opts = GetOptions::with_filter(NameVersionFilter::new("baz", "2.0.0"));
                    assert!(indexer.get(Some(&opts)).is_empty());
                    tokio::task::yield_now().await;
                }
            }));
        }
        for reader in readers {
            reader.await.unwrap();
        }

        release_tx.send(()).unwrap();
        let outcome = refresh.await.unwrap().unwrap();
        assert!(matches!(
            outcome,
            RefreshOutcome::Updated {
                package_count: 3,
                ..
            }
        ));

        let snapshot = indexer.snapshot();
        assert_eq!(snapshot.cursor(), "b");
        assert_eq!(snapshot.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_see_consistent_pairs() {
        let store = seeded_store();
        let (indexer, _) = indexer(&store, Duration::ZERO);
        indexer.init(CancellationToken::new()).await.unwrap();

        let stop = CancellationToken::new();
        let mut readers = Vec::new();
        for _ in 0..8 {
            let indexer = indexer.clone();
            let stop = stop.clone();
            readers.push(tokio::spawn(async move {
                while !stop.is_cancelled() {
                    let snapshot = indexer.snapshot();
                    let expected = match snapshot.cursor() {
                        "a" => 2,
                        "b" => 3,
                        "c" => 1,
                        other => panic!("unexpected cursor {other}"),
                    };
                    assert_eq!(snapshot.len(), expected);
                    tokio::task::yield_now().await;
                }
            }));
        }

        store.set_index("b", &[("foo", "1.2.3"), ("bar", "0.1.0"), ("baz", "2.0.0")]);
        store.set_index("c", &[("qux", "3.0.0")]);
        for cursor in ["b", "c", "b", "c"] {
            store.set_cursor(cursor);
            indexer.update_index().await.unwrap();
        }

        stop.cancel();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(indexer.snapshot().cursor(), "c");
    }
}
