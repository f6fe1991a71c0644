//! Domain types for chapters.
//!
//! This module contains:
//! - Version hashes parsed from manifests
//! - Lock and load states
//! - Payload handles
//! - Events published to observers

pub mod events;
pub mod payload;
pub mod state;
pub mod version;

pub use events::{ChapterEvent, ChapterEventKind};
pub use payload::{bundle_id, Bundle, BundleOrigin, ChapterAsset, LoadedPayload};
pub use state::{ChapterSnapshot, FetchMode, LoadState, LockState, RemoteLocation};
pub use version::{VersionHash, VersionParseError};
