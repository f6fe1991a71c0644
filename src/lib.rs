//! folio - Chapter lock and content coordinator
//!
//! Coordinates the lifecycle of purchasable, downloadable content
//! chapters: whether a chapter is locked (by purchase or by a release
//! time), fetching its payload through a versioned cache, and keeping
//! its price label and "now available" notification current.
//!
//! # Architecture
//!
//! Every external system sits behind a trait:
//! - Manifests and payloads come from a `ManifestSource` and a `CacheStore`
//! - Ownership and prices come from a `PurchaseOracle`
//! - State survives restarts through a `KeyValueStore`
//! - Release notifications go through a `Notifier`
//!
//! A `Chapter` composes these collaborators and publishes its changes on a
//! broadcast `EventBus`.
//!
//! # Modules
//!
//! - `adapters`: Collaborator traits and their reference implementations
//! - `core`: Chapter aggregate, fetcher, lock/release, event bus
//! - `domain`: Data structures (states, events, version hash, payloads)
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Show every chapter
//! folio status
//!
//! # Download a chapter
//! folio fetch chapter_2 --explicit
//!
//! # Stream events while release gates tick
//! folio watch
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::Services;
pub use config::{ChapterConfig, NetworkSettings, NotificationTemplate};
pub use crate::core::{Chapter, ChapterError, EventBus, Library};
pub use domain::{
    ChapterEvent, ChapterEventKind, ChapterSnapshot, FetchMode, LoadState, LockState,
    RemoteLocation, VersionHash,
};
