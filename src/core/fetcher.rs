//! Content fetching for a [`Chapter`].
//!
//! A fetch resolves the manifest, serves the payload from the cache or
//! downloads it, and materializes the configured sub-asset. Every fetch
//! runs under a [`Flight`] ticket claimed synchronously when the fetch is
//! requested; after each suspension point the task checks that its ticket
//! is still current and silently drops its results when it was superseded.

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::chapter::{Chapter, ChapterError, ChapterState, Flight};
use super::wait::wait_until;
use crate::adapters::{AssetError, CacheError, FetchError};
use crate::domain::{
    ChapterEventKind, FetchMode, LoadState, LoadedPayload, RemoteLocation, VersionHash,
};

/// Why a fetch task stopped before committing
#[derive(Debug, Error)]
enum FetchFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("superseded by a newer fetch")]
    Superseded,
}

impl Chapter {
    /// Start fetching the payload for the active locale.
    ///
    /// Returns `None` without doing anything when the chapter is locked, a
    /// fetch is already in flight, a silent fetch finds the payload already
    /// loaded, or no payload URL is configured.
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub fn fetch(&self, mode: FetchMode) -> Option<JoinHandle<()>> {
        let location = self.fetch_target()?;

        let ticket = {
            let mut state = self.state();
            if !state.lock.is_unlocked() {
                debug!("Chapter is locked; fetch skipped");
                return None;
            }
            if state.flight.is_some() {
                debug!("Fetch already in flight");
                return None;
            }
            if mode == FetchMode::Silent && state.load_state == LoadState::Loaded {
                debug!("Payload already loaded");
                return None;
            }
            state.claim(mode)
        };

        Some(self.spawn_fetch(ticket, location))
    }

    /// Tear down the current payload and its cached versions, then fetch
    /// again. A fetch already in flight is superseded and its results are
    /// discarded.
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub async fn reload(&self) -> Option<JoinHandle<()>> {
        if !self.is_unlocked() {
            debug!("Chapter is locked; reload skipped");
            return None;
        }
        let location = self.fetch_target()?;

        if !self.is_preloaded() && self.has_payload() {
            if let Err(e) = self.clear_cache().await {
                debug!(error = %e, "Payload released concurrently");
            }
        }

        let ticket = {
            let mut state = self.state();
            if let Some(previous) = state.flight {
                debug!(generation = previous.generation, "Superseding fetch in flight");
            }
            state.claim(FetchMode::Explicit)
        };

        Some(self.spawn_fetch(ticket, location))
    }

    /// Release the active payload and evict every cached version of its
    /// bundle. Returns whether the eviction completed.
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub async fn clear_cache(&self) -> Result<bool, ChapterError> {
        let released = {
            let mut guard = self.state();
            let state = &mut *guard;
            state.payload.take().map(|payload| {
                match state.flight.as_mut() {
                    Some(flight) => flight.prior = LoadState::NotLoaded,
                    None => state.load_state = LoadState::NotLoaded,
                }
                payload.bundle.name().to_string()
            })
        };

        let Some(bundle) = released else {
            error!("No loaded payload to clear");
            return Err(ChapterError::PreconditionViolation(
                "clear_cache requires a loaded payload",
            ));
        };

        self.inner.progress.send_replace(0.0);
        let cleared = self.inner.services.cache.clear_versions(&bundle).await;

        {
            let mut state = self.state();
            if cleared {
                state.was_loaded = false;
            }
            self.persist(&state);
        }

        if cleared {
            info!(%bundle, "Cleared cached payload");
            self.emit(ChapterEventKind::SettingsChanged);
        } else {
            warn!(%bundle, "Cached versions were not fully evicted");
        }
        Ok(cleared)
    }

    /// Remote location of the active locale, if it names a payload
    fn fetch_target(&self) -> Option<RemoteLocation> {
        match self.location() {
            Some(location) if !location.bundle_url.is_empty() => Some(location),
            _ => {
                debug!(chapter = %self.id(), locale = %self.locale(), "No payload URL configured");
                None
            }
        }
    }

    fn spawn_fetch(&self, ticket: Flight, location: RemoteLocation) -> JoinHandle<()> {
        let chapter = self.clone();
        if self.is_preloaded() {
            tokio::spawn(async move {
                let result = chapter.read_local(&ticket, &location).await;
                chapter.finish(&ticket, result.map(|payload| (payload, None)));
            })
        } else {
            tokio::spawn(async move {
                let result = chapter.download(&ticket, &location).await;
                chapter.finish(&ticket, result.map(|(payload, version)| (payload, Some(version))));
            })
        }
    }

    fn advance(&self, ticket: &Flight, load_state: LoadState) -> Result<(), FetchFailure> {
        self.with_current(ticket, |state| state.load_state = load_state)
            .ok_or(FetchFailure::Superseded)
    }

    async fn download(
        &self,
        ticket: &Flight,
        location: &RemoteLocation,
    ) -> Result<(LoadedPayload, VersionHash), FetchFailure> {
        let services = &self.inner.services;
        let timeout = self.inner.network.timeout;

        let cache = &services.cache;
        wait_until(|| cache.is_ready(), self.poll_interval()).await;

        let explicit = ticket.mode == FetchMode::Explicit;
        self.with_current(ticket, |state| {
            state.load_state = LoadState::FetchingManifest;
            state.loading = explicit;
        })
        .ok_or(FetchFailure::Superseded)?;
        self.emit(ChapterEventKind::FetchStarted);

        let body = tokio::time::timeout(
            timeout,
            services.manifests.fetch_manifest(&location.manifest_url),
        )
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;
        let version = VersionHash::parse(&body).map_err(FetchError::from)?;
        debug!(%version, "Manifest resolved");

        self.with_current(ticket, |state| {
            state.load_state = LoadState::Downloading;
            self.inner.progress.send_replace(0.0);
        })
        .ok_or(FetchFailure::Superseded)?;

        // the cache bounds its own transfer by idle time, not a deadline
        let (progress, relay) = self.relay_progress(ticket);
        let bundle = services
            .cache
            .fetch_or_cache_hit(&location.bundle_url, &version, &progress)
            .await;
        drop(progress);
        if let Err(e) = relay.await {
            warn!(error = %e, "Progress relay failed");
        }
        let bundle = bundle?;

        self.advance(ticket, LoadState::MaterializingPayload)?;
        let asset = services.extractor.extract(&bundle, &location.asset_name).await?;

        Ok((LoadedPayload { bundle, asset }, version))
    }

    /// A progress sender private to one transfer. Its updates reach the
    /// chapter's observers only while `ticket` is current.
    fn relay_progress(&self, ticket: &Flight) -> (watch::Sender<f32>, JoinHandle<()>) {
        let (tx, mut rx) = watch::channel(0.0);
        let chapter = self.clone();
        let ticket = *ticket;

        let relay = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let value = *rx.borrow_and_update();
                let current = chapter.with_current(&ticket, |_| {
                    chapter.inner.progress.send_replace(value);
                });
                if current.is_none() {
                    break;
                }
            }
        });
        (tx, relay)
    }

    async fn read_local(
        &self,
        ticket: &Flight,
        location: &RemoteLocation,
    ) -> Result<LoadedPayload, FetchFailure> {
        let services = &self.inner.services;

        self.with_current(ticket, |state| {
            state.payload = None;
            if let Some(flight) = state.flight.as_mut() {
                flight.prior = LoadState::NotLoaded;
            }
            state.load_state = LoadState::MaterializingPayload;
        })
        .ok_or(FetchFailure::Superseded)?;
        self.emit(ChapterEventKind::FetchStarted);

        let path = services.local.resolve(&location.bundle_url);
        debug!(path = %path.display(), "Reading bundled payload");
        let bundle = services.local.open(&path).await?;

        self.advance(ticket, LoadState::MaterializingPayload)?;
        let asset = services.extractor.extract(&bundle, &location.asset_name).await?;

        Ok(LoadedPayload { bundle, asset })
    }

    fn finish(
        &self,
        ticket: &Flight,
        result: Result<(LoadedPayload, Option<VersionHash>), FetchFailure>,
    ) {
        match result {
            Ok((payload, version)) => self.commit(ticket, payload, version),
            Err(failure) => self.abandon(ticket, failure),
        }
    }

    fn commit(&self, ticket: &Flight, payload: LoadedPayload, version: Option<VersionHash>) {
        let committed = self.with_current(ticket, |state| {
            // previous handle goes before the replacement is stored
            state.payload = None;
            state.payload = Some(payload);
            state.load_state = LoadState::Loaded;
            state.was_loaded = true;
            if let Some(version) = version {
                state.version = version;
            }
            state.flight = None;
            state.loading = false;
            self.persist(state);
            state.version
        });

        let Some(version) = committed else {
            debug!(chapter = %self.id(), "Fetch superseded; payload discarded");
            return;
        };

        info!(chapter = %self.id(), %version, "Payload loaded");
        self.emit(ChapterEventKind::SettingsChanged);
        self.emit(ChapterEventKind::FetchFinished);
        self.spawn_price_refresh();
    }

    fn abandon(&self, ticket: &Flight, failure: FetchFailure) {
        if matches!(failure, FetchFailure::Superseded) {
            debug!(chapter = %self.id(), "Fetch superseded");
            return;
        }

        let restored = self.with_current(ticket, |state: &mut ChapterState| {
            let prior = state.flight.map(|f| f.prior).unwrap_or(ticket.prior);
            state.load_state = prior;
            state.flight = None;
            state.loading = false;
            prior
        });

        match restored {
            Some(prior) => {
                warn!(chapter = %self.id(), error = %failure, restored = %prior, "Fetch abandoned")
            }
            None => debug!(chapter = %self.id(), error = %failure, "Superseded fetch failed"),
        }
    }
}
