//! The set of chapters of one session.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use super::chapter::Chapter;
use super::event_bus::EventBus;
use crate::adapters::{
    CatalogOracle, DiskCacheStore, FsLocalBundles, HttpManifestSource, JournalNotifier,
    JsonFileStore, MapLocalizer, Services, WholeBundleExtractor,
};
use crate::config::{paths, ChapterConfig, NetworkSettings, ResolvedConfig};
use crate::domain::ChapterEvent;

/// Chapters sharing one set of collaborators and one event bus
pub struct Library {
    chapters: Vec<Chapter>,
    events: EventBus,
}

impl Library {
    /// Construct every chapter and restore its persisted state
    pub fn new(
        configs: impl IntoIterator<Item = ChapterConfig>,
        locale: &str,
        services: Services,
        network: NetworkSettings,
    ) -> Self {
        let events = EventBus::default();
        let chapters = configs
            .into_iter()
            .map(|config| {
                Chapter::new(config, locale, services.clone(), network, events.clone())
            })
            .collect();

        Self { chapters, events }
    }

    /// Wire the filesystem and network adapters described by `config`
    pub async fn open(config: &ResolvedConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.home)
            .await
            .with_context(|| format!("Failed to create {}", config.home.display()))?;

        let cache = DiskCacheStore::open(paths::cache_dir_in(&config.home), config.network.timeout)
            .await
            .context("Failed to open payload cache")?;
        let manifests = HttpManifestSource::new(config.network.timeout)
            .context("Failed to build HTTP client")?;
        let store = JsonFileStore::open(paths::prefs_file_in(&config.home))?;

        let services = Services {
            manifests: Arc::new(manifests),
            cache: Arc::new(cache),
            extractor: Arc::new(WholeBundleExtractor),
            local: Arc::new(FsLocalBundles::new(&config.bundled)),
            oracle: Arc::new(CatalogOracle::new(
                config.store.owned.iter().cloned(),
                config.store.prices.clone(),
            )),
            notifier: Arc::new(JournalNotifier::new(paths::notifications_journal_in(
                &config.home,
            ))),
            store: Arc::new(store),
            localizer: Arc::new(MapLocalizer::new(config.strings.clone())),
        };

        Ok(Self::new(
            config.chapters.iter().cloned(),
            &config.locale,
            services,
            config.network,
        ))
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn get(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == id)
    }

    /// Like [`Library::get`], failing with a readable error
    pub fn require(&self, id: &str) -> Result<&Chapter> {
        self.get(id)
            .with_context(|| format!("Unknown chapter: {}", id))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChapterEvent> {
        self.events.subscribe()
    }

    /// Start every chapter, returning the handles of the tasks started
    #[instrument(skip(self), fields(chapters = self.chapters.len()))]
    pub async fn start(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        for chapter in &self.chapters {
            tasks.extend(chapter.start().await);
        }
        info!(tasks = tasks.len(), "Library started");
        tasks
    }

    /// Switch every chapter to `locale`
    pub fn set_locale(&self, locale: &str) -> Vec<JoinHandle<()>> {
        self.chapters
            .iter()
            .map(|chapter| chapter.set_locale(locale))
            .collect()
    }

    /// Tick every release gate; returns the ids unlocked by this tick
    pub fn tick_at(&self, now: DateTime<Utc>) -> Vec<String> {
        self.chapters
            .iter()
            .filter(|chapter| chapter.tick_at(now))
            .map(|chapter| chapter.id().to_string())
            .collect()
    }
}
