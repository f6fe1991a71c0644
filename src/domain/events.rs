//! Events published to chapter observers.
//!
//! Every state change a UI cares about is announced as a [`ChapterEvent`]
//! on the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single notification emitted by a chapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Product id of the emitting chapter
    pub chapter_id: String,

    /// What happened
    pub kind: ChapterEventKind,
}

impl ChapterEvent {
    /// Create a new event with the current timestamp
    pub fn new(chapter_id: impl Into<String>, kind: ChapterEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            chapter_id: chapter_id.into(),
            kind,
        }
    }
}

/// Types of chapter events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterEventKind {
    /// Lock, price or load state changed
    SettingsChanged,

    /// A fetch (or preloaded read) began
    FetchStarted,

    /// A fetch completed and the payload is loaded
    FetchFinished,

    /// The release time passed while the chapter was observed locked
    UnlockedByTime,

    /// The persisted lock flag was cleared
    Unlocked,
}
