//! Observable chapter state.

use serde::{Deserialize, Serialize};

/// Whether a chapter may be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Waiting for a purchase
    LockedByPurchase,

    /// Waiting for the configured release time
    LockedByTime,

    /// Accessible. Never reverts.
    Unlocked,
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockState::LockedByPurchase => write!(f, "locked (purchase)"),
            LockState::LockedByTime => write!(f, "locked (release time)"),
            LockState::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// Progress of the payload through the fetch sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    NotLoaded,

    FetchingManifest,

    Downloading,

    MaterializingPayload,

    Loaded,
}

impl LoadState {
    /// True while a fetch sequence owns the state
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LoadState::FetchingManifest | LoadState::Downloading | LoadState::MaterializingPayload
        )
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::NotLoaded => write!(f, "not loaded"),
            LoadState::FetchingManifest => write!(f, "fetching manifest"),
            LoadState::Downloading => write!(f, "downloading"),
            LoadState::MaterializingPayload => write!(f, "materializing"),
            LoadState::Loaded => write!(f, "loaded"),
        }
    }
}

/// How a fetch was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Background refresh; no loading indicator
    Silent,

    /// User-initiated; raises the loading indicator while downloading
    Explicit,
}

/// Remote locations of a chapter for one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    /// Display name in this locale
    #[serde(default)]
    pub name: String,

    /// Manifest document holding the current version hash
    #[serde(default)]
    pub manifest_url: String,

    /// Payload bundle URL (a relative path for preloaded chapters)
    pub bundle_url: String,

    /// Sub-asset to extract from the payload
    pub asset_name: String,
}

/// Point-in-time copy of a chapter's observable state
#[derive(Debug, Clone, Serialize)]
pub struct ChapterSnapshot {
    pub id: String,
    pub name: String,
    pub lock_state: LockState,
    pub load_state: LoadState,
    pub preloaded: bool,
    pub version: String,
    pub price: String,
    pub in_flight: bool,
    pub loading: bool,
    pub progress_percent: u8,
    pub notification_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_states() {
        assert!(!LoadState::NotLoaded.is_transient());
        assert!(LoadState::FetchingManifest.is_transient());
        assert!(LoadState::Downloading.is_transient());
        assert!(LoadState::MaterializingPayload.is_transient());
        assert!(!LoadState::Loaded.is_transient());
    }

    #[test]
    fn test_lock_state_serialization() {
        let json = serde_json::to_string(&LockState::LockedByTime).unwrap();
        assert_eq!(json, "\"locked_by_time\"");
    }
}
