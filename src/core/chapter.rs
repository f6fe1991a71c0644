//! Chapter aggregate.
//!
//! A [`Chapter`] owns the lock state, load state, cached price and pending
//! notification of one purchasable unit of content. It is cheap to clone;
//! every clone shares the same state, so a clone can be moved into a
//! spawned task.
//!
//! State lives behind a synchronous mutex that is never held across an
//! await. Persistence happens while the lock is held so the stored keys
//! always describe one consistent state; events are published after the
//! lock is released.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::event_bus::EventBus;
use super::lock::LockCoordinator;
use super::persisted::PersistedChapter;
use super::pricing::format_price;
use super::release::{format_remaining, UnitLabels};
use super::wait::wait_until;
use crate::adapters::{NotificationContent, Services};
use crate::config::{ChapterConfig, NetworkSettings};
use crate::domain::{
    ChapterAsset, ChapterEvent, ChapterEventKind, ChapterSnapshot, FetchMode, LoadState,
    LoadedPayload, LockState, RemoteLocation, VersionHash,
};

/// Errors surfaced to callers of chapter operations
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),
}

/// Ticket of the fetch that currently owns the load state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Flight {
    pub generation: u64,
    pub mode: FetchMode,
    /// Load state to restore if the fetch is abandoned
    pub prior: LoadState,
}

pub(super) struct ChapterState {
    pub lock: LockCoordinator,
    pub load_state: LoadState,
    /// A payload was loaded in this or an earlier session
    pub was_loaded: bool,
    pub version: VersionHash,
    pub price: String,
    pub notification_id: Option<String>,
    pub locale: String,
    pub payload: Option<LoadedPayload>,
    pub flight: Option<Flight>,
    pub generation: u64,
    pub loading: bool,
}

impl ChapterState {
    fn persisted(&self) -> PersistedChapter {
        PersistedChapter {
            is_locked: !self.lock.is_unlocked(),
            is_loaded: self.was_loaded,
            version: self.version,
            price: self.price.clone(),
            notification_id: self.notification_id.clone(),
        }
    }

    /// Claim a new fetch ticket, superseding any ticket in flight
    pub fn claim(&mut self, mode: FetchMode) -> Flight {
        let prior = self.flight.map(|f| f.prior).unwrap_or(self.load_state);
        self.generation += 1;

        let flight = Flight {
            generation: self.generation,
            mode,
            prior,
        };
        self.flight = Some(flight);
        self.loading = false;
        flight
    }

    pub fn owns(&self, ticket: &Flight) -> bool {
        self.flight.map(|f| f.generation) == Some(ticket.generation)
    }
}

pub(super) struct Inner {
    pub config: ChapterConfig,
    pub services: Services,
    pub network: NetworkSettings,
    pub events: EventBus,
    pub progress: watch::Sender<f32>,
    pub state: Mutex<ChapterState>,
}

/// One purchasable, unlockable unit of downloadable content
#[derive(Clone)]
pub struct Chapter {
    pub(super) inner: Arc<Inner>,
}

impl std::fmt::Debug for Chapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chapter")
            .field("id", &self.id())
            .field("lock_state", &self.lock_state())
            .field("load_state", &self.load_state())
            .finish()
    }
}

impl Chapter {
    /// Build a chapter and restore its persisted keys from the store
    pub fn new(
        config: ChapterConfig,
        locale: impl Into<String>,
        services: Services,
        network: NetworkSettings,
        events: EventBus,
    ) -> Self {
        let persisted = PersistedChapter::load(services.store.as_ref(), &config.id);
        debug!(
            chapter = %config.id,
            locked = persisted.is_locked,
            loaded = persisted.is_loaded,
            version = %persisted.version,
            "Restored chapter state"
        );

        let state = ChapterState {
            lock: LockCoordinator::new(persisted.is_locked, config.release_at, Utc::now()),
            load_state: LoadState::NotLoaded,
            was_loaded: persisted.is_loaded,
            version: persisted.version,
            price: persisted.price,
            notification_id: persisted.notification_id,
            locale: locale.into(),
            payload: None,
            flight: None,
            generation: 0,
            loading: false,
        };
        let (progress, _) = watch::channel(0.0);

        Self {
            inner: Arc::new(Inner {
                config,
                services,
                network,
                events,
                progress,
                state: Mutex::new(state),
            }),
        }
    }

    pub(super) fn state(&self) -> MutexGuard<'_, ChapterState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write every persisted key. A failing store is logged, not fatal.
    pub(super) fn persist(&self, state: &ChapterState) {
        if let Err(e) = state.persisted().save(self.inner.services.store.as_ref(), self.id()) {
            warn!(chapter = %self.id(), error = %e, "Failed to persist chapter state");
        }
    }

    pub(super) fn emit(&self, kind: ChapterEventKind) {
        self.inner.events.publish(self.id(), kind);
    }

    /// Run `f` against the state only while `ticket` is still current
    pub(super) fn with_current<R>(
        &self,
        ticket: &Flight,
        f: impl FnOnce(&mut ChapterState) -> R,
    ) -> Option<R> {
        let mut state = self.state();
        if !state.owns(ticket) {
            return None;
        }
        Some(f(&mut *state))
    }

    pub(super) fn poll_interval(&self) -> Duration {
        self.inner.network.poll_interval
    }

    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    pub fn config(&self) -> &ChapterConfig {
        &self.inner.config
    }

    pub fn is_preloaded(&self) -> bool {
        self.inner.config.preloaded
    }

    pub fn locale(&self) -> String {
        self.state().locale.clone()
    }

    /// Remote locations for the active locale
    pub fn location(&self) -> Option<RemoteLocation> {
        let locale = self.locale();
        self.inner.config.location(&locale).cloned()
    }

    /// Localized display name, falling back to the product id
    pub fn name(&self) -> String {
        self.location()
            .map(|l| l.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.id().to_string())
    }

    pub fn lock_state(&self) -> LockState {
        self.lock_state_at(Utc::now())
    }

    pub fn lock_state_at(&self, now: DateTime<Utc>) -> LockState {
        self.state().lock.state(now)
    }

    pub fn is_unlocked(&self) -> bool {
        self.state().lock.is_unlocked()
    }

    pub fn load_state(&self) -> LoadState {
        self.state().load_state
    }

    /// Whether a payload was loaded in this or an earlier session
    pub fn was_loaded(&self) -> bool {
        self.state().was_loaded
    }

    pub fn version(&self) -> VersionHash {
        self.state().version
    }

    pub fn price(&self) -> String {
        self.state().price.clone()
    }

    pub fn notification_id(&self) -> Option<String> {
        self.state().notification_id.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.state().flight.is_some()
    }

    /// The "loading" indicator raised by explicit fetches
    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn has_payload(&self) -> bool {
        self.state().payload.is_some()
    }

    /// The materialized sub-asset of the active payload
    pub fn asset(&self) -> Option<ChapterAsset> {
        self.state().payload.as_ref().map(|p| p.asset.clone())
    }

    /// Transfer progress of the current fetch, in `[0, 1]`
    pub fn progress(&self) -> f32 {
        *self.inner.progress.borrow()
    }

    pub fn progress_percent(&self) -> u8 {
        (self.progress().clamp(0.0, 1.0) * 100.0).round() as u8
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f32> {
        self.inner.progress.subscribe()
    }

    /// Events of every chapter sharing this chapter's bus
    pub fn subscribe(&self) -> broadcast::Receiver<ChapterEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> ChapterSnapshot {
        let name = self.name();
        let progress_percent = self.progress_percent();
        let now = Utc::now();
        let state = self.state();

        ChapterSnapshot {
            id: self.id().to_string(),
            name,
            lock_state: state.lock.state(now),
            load_state: state.load_state,
            preloaded: self.is_preloaded(),
            version: state.version.to_string(),
            price: state.price.clone(),
            in_flight: state.flight.is_some(),
            loading: state.loading,
            progress_percent,
            notification_id: state.notification_id.clone(),
        }
    }

    /// Clear the lock flag permanently. Returns true on the transition.
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub fn unlock(&self) -> bool {
        let transitioned = {
            let mut state = self.state();
            let transitioned = state.lock.unlock();
            if transitioned {
                self.persist(&state);
            }
            transitioned
        };

        if transitioned {
            info!("Chapter unlocked");
            self.emit(ChapterEventKind::Unlocked);
            self.emit(ChapterEventKind::SettingsChanged);
        }
        transitioned
    }

    /// Wait for the purchase oracle, then unlock if the product is owned.
    /// Returns true if this call unlocked the chapter.
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub async fn check_ownership(&self) -> bool {
        if self.is_unlocked() {
            return false;
        }

        let oracle = Arc::clone(&self.inner.services.oracle);
        wait_until(|| oracle.is_initialized(), self.poll_interval()).await;

        if oracle.is_owned(self.id()).await {
            debug!("Product owned");
            self.unlock()
        } else {
            false
        }
    }

    /// Evaluate the release gate at `now`. Returns true on the tick that
    /// unlocked the chapter by time.
    pub fn tick_at(&self, now: DateTime<Utc>) -> bool {
        let released = {
            let mut state = self.state();
            let fired = state.lock.poll_release(now);
            fired && !state.lock.is_unlocked()
        };
        if !released {
            return false;
        }

        info!(chapter = %self.id(), "Release time reached");
        self.emit(ChapterEventKind::UnlockedByTime);
        self.unlock();
        true
    }

    pub fn tick(&self) -> bool {
        self.tick_at(Utc::now())
    }

    /// Whether the release gate can still unlock this chapter
    pub fn needs_release_polling(&self) -> bool {
        let state = self.state();
        !state.lock.is_unlocked() && state.lock.needs_polling()
    }

    /// Tick the release gate every `interval` until it can no longer fire
    pub fn watch_release(&self, interval: Duration) -> JoinHandle<()> {
        let chapter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while chapter.needs_release_polling() {
                ticker.tick().await;
                chapter.tick();
            }
            debug!(chapter = %chapter.id(), "Release watch finished");
        })
    }

    /// Countdown to the release time, empty unless locked by time
    pub fn release_time_string(&self) -> String {
        self.release_time_string_at(Utc::now())
    }

    pub fn release_time_string_at(&self, now: DateTime<Utc>) -> String {
        let remaining = {
            let state = self.state();
            if state.lock.state(now) != LockState::LockedByTime {
                return String::new();
            }
            match state.lock.gate() {
                Some(gate) => gate.remaining(now),
                None => return String::new(),
            }
        };

        let localizer = &self.inner.services.localizer;
        let labels = UnitLabels::new(
            localizer.translate("Months"),
            localizer.translate("Days"),
            localizer.translate("Hours"),
        );
        format_remaining(remaining, &labels)
    }

    /// Refresh the cached price label from the purchase oracle
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub async fn refresh_price(&self) {
        let oracle = Arc::clone(&self.inner.services.oracle);
        wait_until(|| oracle.is_initialized(), self.poll_interval()).await;

        let metadata = match oracle.localized_price(self.id()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(error = %e, "Failed to refresh price");
                return;
            }
        };

        let price = format_price(&metadata);
        if price.is_empty() {
            warn!(currency = %metadata.iso_currency_code, "Store returned an empty price");
            return;
        }

        let changed = {
            let mut state = self.state();
            if state.price == price {
                false
            } else {
                state.price = price.clone();
                self.persist(&state);
                true
            }
        };

        if changed {
            debug!(%price, "Price updated");
            self.emit(ChapterEventKind::SettingsChanged);
        }
    }

    pub(super) fn spawn_price_refresh(&self) -> JoinHandle<()> {
        let chapter = self.clone();
        tokio::spawn(async move { chapter.refresh_price().await })
    }

    /// Cancel a notification left by an earlier session, then schedule the
    /// release notification if the chapter is waiting for its release time
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub async fn reschedule_notification(&self) {
        let notifier = Arc::clone(&self.inner.services.notifier);
        let poll_interval = self.poll_interval();

        let stale = self.notification_id();
        if let Some(id) = stale {
            wait_until(|| notifier.is_initialized(), poll_interval).await;
            match notifier.cancel(&id).await {
                Ok(()) => debug!(notification_id = %id, "Cancelled pending notification"),
                Err(e) => warn!(notification_id = %id, error = %e, "Failed to cancel notification"),
            }

            let mut state = self.state();
            state.notification_id = None;
            self.persist(&state);
        }

        let (Some(template), Some(release_at)) = (
            self.inner.config.notification.clone(),
            self.inner.config.release_at,
        ) else {
            return;
        };
        if self.lock_state() != LockState::LockedByTime {
            return;
        }

        wait_until(|| notifier.is_initialized(), poll_interval).await;

        let localizer = &self.inner.services.localizer;
        let content = NotificationContent {
            title: localizer.translate(&template.title),
            body: localizer.translate(&template.body),
            small_icon: template.small_icon,
        };

        match notifier.schedule(release_at, content).await {
            Ok(id) => {
                info!(notification_id = %id, %release_at, "Scheduled release notification");
                let mut state = self.state();
                state.notification_id = Some(id);
                self.persist(&state);
            }
            Err(e) => error!(error = %e, "Failed to schedule release notification"),
        }
    }

    /// Switch the active locale. Transfers already in flight keep the
    /// locations they started with.
    pub fn set_locale(&self, locale: impl Into<String>) -> JoinHandle<()> {
        let locale = locale.into();
        debug!(chapter = %self.id(), %locale, "Locale changed");
        self.state().locale = locale;
        self.spawn_price_refresh()
    }

    /// Unlock without the time edge when the release passed while no
    /// session was watching. Returns whether the chapter was unlocked.
    pub fn settle_release(&self) -> bool {
        self.settle_release_at(Utc::now())
    }

    pub fn settle_release_at(&self, now: DateTime<Utc>) -> bool {
        let released = {
            let state = self.state();
            !state.lock.is_unlocked() && state.lock.is_past_release_time(now)
        };
        if !released {
            return false;
        }
        debug!(chapter = %self.id(), "Release time passed before this session");
        self.unlock()
    }

    /// Session start: unlock chapters whose release already passed, resume
    /// loaded payloads and kick off the ownership, price and notification
    /// refreshes. Returns the handles of every task started.
    #[instrument(skip(self), fields(chapter = %self.id()))]
    pub async fn start(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        self.settle_release_at(Utc::now());

        if self.is_unlocked() {
            tasks.extend(self.resume().await);
        }

        let chapter = self.clone();
        tasks.push(tokio::spawn(async move {
            if !chapter.check_ownership().await {
                return;
            }
            if let Some(handle) = chapter.resume().await {
                if let Err(e) = handle.await {
                    warn!(chapter = %chapter.id(), error = %e, "Resumed fetch task failed");
                }
            }
        }));

        tasks.push(self.spawn_price_refresh());

        let chapter = self.clone();
        tasks.push(tokio::spawn(async move { chapter.reschedule_notification().await }));

        tasks
    }

    /// Bring back the payload of an earlier session
    async fn resume(&self) -> Option<JoinHandle<()>> {
        if self.is_preloaded() {
            return self.reload().await;
        }

        let was_loaded = self.state().was_loaded;
        if was_loaded {
            self.fetch(FetchMode::Silent)
        } else {
            None
        }
    }
}
