//! Core coordination logic.
//!
//! This module contains:
//! - Chapter: the per-chapter aggregate (lock, load, price, notification)
//! - Fetcher: manifest, cache-or-download and materialization
//! - Lock/Release: purchase and time unlock sources
//! - EventBus: broadcast of chapter events
//! - Library: the chapters of one session

pub mod chapter;
pub mod event_bus;
mod fetcher;
pub mod library;
pub mod lock;
pub mod persisted;
pub mod pricing;
pub mod release;
pub mod wait;

// Re-export commonly used types
pub use chapter::{Chapter, ChapterError};
pub use event_bus::EventBus;
pub use library::Library;
pub use lock::LockCoordinator;
pub use persisted::PersistedChapter;
pub use pricing::format_price;
pub use release::{format_remaining, ReleaseGate, UnitLabels};
