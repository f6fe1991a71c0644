//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Notify};

use folio::adapters::{
    CacheError, CacheStore, FetchError, LocalBundles, ManifestSource, MapLocalizer, MemoryStore,
    NotificationContent, Notifier, NotifyError, OracleError, PriceMetadata, PurchaseOracle,
    Services, WholeBundleExtractor,
};
use folio::domain::{bundle_id, Bundle, BundleOrigin, VersionHash};
use folio::{Chapter, ChapterConfig, ChapterEvent, ChapterEventKind, EventBus, NetworkSettings, RemoteLocation};

pub const VERSION_A: &str = "0123456789abcdef0123456789abcdef";
pub const VERSION_B: &str = "fedcba9876543210fedcba9876543210";

/// Manifest source answering with a settable body
pub struct StubManifests {
    body: Mutex<String>,
    fail: AtomicBool,
    calls: AtomicUsize,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl StubManifests {
    fn new() -> Self {
        Self {
            body: Mutex::new(VERSION_A.to_string()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            hold: Mutex::new(None),
        }
    }

    pub fn set_body(&self, body: &str) {
        *self.body.lock().unwrap() = body.to_string();
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next manifest call wait until the returned gate is notified
    pub fn hold_next(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl ManifestSource for StubManifests {
    async fn fetch_manifest(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.hold.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: 503,
            });
        }
        Ok(self.body.lock().unwrap().clone())
    }
}

/// In-memory version cache counting network transfers
pub struct StubCache {
    ready: AtomicBool,
    entries: Mutex<HashSet<(String, VersionHash)>>,
    transfers: AtomicUsize,
    fail: AtomicBool,
    evict_ok: AtomicBool,
    clears: AtomicUsize,
    pace: Mutex<Option<(usize, Duration)>>,
}

impl StubCache {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            entries: Mutex::new(HashSet::new()),
            transfers: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            evict_ok: AtomicBool::new(true),
            clears: AtomicUsize::new(0),
            pace: Mutex::new(None),
        }
    }

    /// Spread later transfers over `steps` progress updates, `gap` apart
    pub fn set_pace(&self, pace: Option<(usize, Duration)>) {
        *self.pace.lock().unwrap() = pace;
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_eviction_succeeds(&self, ok: bool) {
        self.evict_ok.store(ok, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn cached_urls(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap();
        entries.iter().map(|(url, _)| url.clone()).collect()
    }
}

#[async_trait]
impl CacheStore for StubCache {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn fetch_or_cache_hit(
        &self,
        url: &str,
        version: &VersionHash,
        progress: &watch::Sender<f32>,
    ) -> Result<Bundle, CacheError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Fetch(FetchError::Http {
                url: url.to_string(),
                status: 500,
            }));
        }

        let pace = *self.pace.lock().unwrap();
        let data = format!("payload {} {}", url, version).into_bytes();
        let hit = self
            .entries
            .lock()
            .unwrap()
            .contains(&(url.to_string(), *version));

        let origin = if hit {
            BundleOrigin::Cache
        } else {
            self.transfers.fetch_add(1, Ordering::SeqCst);
            match pace {
                Some((steps, gap)) => {
                    for step in 1..steps {
                        tokio::time::sleep(gap).await;
                        progress.send_replace(step as f32 / steps as f32);
                    }
                    tokio::time::sleep(gap).await;
                }
                None => {
                    progress.send_replace(0.5);
                }
            }
            self.entries
                .lock()
                .unwrap()
                .insert((url.to_string(), *version));
            BundleOrigin::Network
        };
        progress.send_replace(1.0);

        Ok(Bundle::new(bundle_id(url), *version, origin, data))
    }

    async fn clear_versions(&self, id: &str) -> bool {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if !self.evict_ok.load(Ordering::SeqCst) {
            return false;
        }
        self.entries
            .lock()
            .unwrap()
            .retain(|(url, _)| bundle_id(url) != id);
        true
    }

    async fn is_version_cached(&self, url: &str, version: &VersionHash) -> bool {
        self.entries
            .lock()
            .unwrap()
            .contains(&(url.to_string(), *version))
    }
}

/// Bundled payloads served from memory
#[derive(Default)]
pub struct StubLocal {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl StubLocal {
    pub fn insert(&self, relative: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(self.resolve(relative), data.to_vec());
    }
}

#[async_trait]
impl LocalBundles for StubLocal {
    fn resolve(&self, relative: &str) -> PathBuf {
        Path::new("/bundled").join(relative)
    }

    async fn open(&self, path: &Path) -> Result<Bundle, CacheError> {
        let data = self.files.lock().unwrap().get(path).cloned();
        match data {
            Some(data) => Ok(Bundle::new(
                bundle_id(&path.to_string_lossy()),
                VersionHash::ZERO,
                BundleOrigin::Local,
                data,
            )),
            None => Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            ))),
        }
    }
}

/// Purchase oracle whose initialization the test controls
pub struct StubOracle {
    initialized: AtomicBool,
    owned: Mutex<HashSet<String>>,
    prices: Mutex<HashMap<String, Option<PriceMetadata>>>,
}

impl StubOracle {
    fn new() -> Self {
        Self {
            initialized: AtomicBool::new(true),
            owned: Mutex::new(HashSet::new()),
            prices: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn own(&self, product_id: &str) {
        self.owned.lock().unwrap().insert(product_id.to_string());
    }

    pub fn set_price(&self, product_id: &str, metadata: Option<PriceMetadata>) {
        self.prices
            .lock()
            .unwrap()
            .insert(product_id.to_string(), metadata);
    }
}

#[async_trait]
impl PurchaseOracle for StubOracle {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn is_owned(&self, product_id: &str) -> bool {
        self.owned.lock().unwrap().contains(product_id)
    }

    async fn localized_price(&self, product_id: &str) -> Result<PriceMetadata, OracleError> {
        match self.prices.lock().unwrap().get(product_id) {
            Some(Some(metadata)) => Ok(metadata.clone()),
            Some(None) => Err(OracleError::NoMetadata(product_id.to_string())),
            None => Err(OracleError::UnknownProduct(product_id.to_string())),
        }
    }
}

/// Notifier recording every schedule and cancel
pub struct StubNotifier {
    initialized: AtomicBool,
    next_id: AtomicUsize,
    scheduled: Mutex<Vec<(String, DateTime<Utc>, NotificationContent)>>,
    cancelled: Mutex<Vec<String>>,
}

impl StubNotifier {
    fn new() -> Self {
        Self {
            initialized: AtomicBool::new(true),
            next_id: AtomicUsize::new(1),
            scheduled: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn scheduled(&self) -> Vec<(String, DateTime<Utc>, NotificationContent)> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn schedule(
        &self,
        deliver_at: DateTime<Utc>,
        content: NotificationContent,
    ) -> Result<String, NotifyError> {
        let id = format!("n-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.scheduled
            .lock()
            .unwrap()
            .push((id.clone(), deliver_at, content));
        Ok(id)
    }

    async fn cancel(&self, notification_id: &str) -> Result<(), NotifyError> {
        self.cancelled
            .lock()
            .unwrap()
            .push(notification_id.to_string());
        Ok(())
    }
}

/// One set of stub collaborators; chapters built from the same harness
/// share the store and cache, as they would across an app restart
pub struct Harness {
    pub manifests: Arc<StubManifests>,
    pub cache: Arc<StubCache>,
    pub local: Arc<StubLocal>,
    pub oracle: Arc<StubOracle>,
    pub notifier: Arc<StubNotifier>,
    pub store: Arc<MemoryStore>,
    pub strings: HashMap<String, String>,
    pub network: NetworkSettings,
    pub events: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            manifests: Arc::new(StubManifests::new()),
            cache: Arc::new(StubCache::new()),
            local: Arc::new(StubLocal::default()),
            oracle: Arc::new(StubOracle::new()),
            notifier: Arc::new(StubNotifier::new()),
            store: Arc::new(MemoryStore::new()),
            strings: HashMap::new(),
            network: NetworkSettings {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(5),
            },
            events: EventBus::default(),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            manifests: self.manifests.clone(),
            cache: self.cache.clone(),
            extractor: Arc::new(WholeBundleExtractor),
            local: self.local.clone(),
            oracle: self.oracle.clone(),
            notifier: self.notifier.clone(),
            store: self.store.clone(),
            localizer: Arc::new(MapLocalizer::new(self.strings.clone())),
        }
    }

    /// Construct a chapter, restoring whatever the store holds
    pub fn chapter(&self, config: ChapterConfig) -> Chapter {
        self.chapter_in(config, "en")
    }

    pub fn chapter_in(&self, config: ChapterConfig, locale: &str) -> Chapter {
        Chapter::new(
            config,
            locale,
            self.services(),
            self.network,
            self.events.clone(),
        )
    }

    /// A chapter that is already unlocked
    pub fn unlocked(&self, config: ChapterConfig) -> Chapter {
        let chapter = self.chapter(config);
        chapter.unlock();
        chapter
    }

    pub fn flushed(&self) -> HashMap<String, String> {
        self.store.flushed()
    }
}

pub fn location(locale: &str, id: &str) -> RemoteLocation {
    RemoteLocation {
        name: format!("{} ({})", id, locale),
        manifest_url: format!("https://cdn.test/{}/{}.manifest", locale, id),
        bundle_url: format!("https://cdn.test/{}/{}.bundle?sig=1", locale, id),
        asset_name: "Settings".to_string(),
    }
}

/// A downloadable chapter with an `en` and a `ru` location
pub fn remote_chapter(id: &str) -> ChapterConfig {
    ChapterConfig {
        id: id.to_string(),
        preloaded: false,
        release_at: None,
        notification: None,
        locales: [("en", location("en", id)), ("ru", location("ru", id))]
            .into_iter()
            .map(|(code, location)| (code.to_string(), location))
            .collect(),
    }
}

pub fn version(hex: &str) -> VersionHash {
    VersionHash::parse(hex).unwrap()
}

pub fn usd(price: &str) -> PriceMetadata {
    PriceMetadata {
        iso_currency_code: "USD".to_string(),
        localized_price: price.to_string(),
        localized_price_string: format!("${}", price),
    }
}

/// Wait (bounded) until `condition` holds
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Every event currently queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<ChapterEvent>) -> Vec<ChapterEventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

pub fn count(kinds: &[ChapterEventKind], kind: ChapterEventKind) -> usize {
    kinds.iter().filter(|k| **k == kind).count()
}
