//! Canonical paths for folio engine state.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio::config::paths;
//!
//! let prefs = paths::prefs_file()?;
//! let cache = paths::cache_dir()?;
//! ```
//!
//! ## Layout
//!
//! | Location | Purpose |
//! |----------|---------|
//! | `<home>/prefs.json` | Persisted chapter keys |
//! | `<home>/cache/` | Payload cache, one directory per bundle id |
//! | `<home>/notifications.jsonl` | Scheduled/cancelled notification journal |

use std::path::{Path, PathBuf};

use anyhow::Result;

const PREFS_FILE: &str = "prefs.json";
const CACHE_DIR: &str = "cache";
const NOTIFICATIONS_JOURNAL: &str = "notifications.jsonl";

/// Get the folio home directory (~/.folio)
pub fn folio_home() -> Result<PathBuf> {
    crate::config::folio_home()
}

/// Get the persisted preferences file (~/.folio/prefs.json)
pub fn prefs_file() -> Result<PathBuf> {
    Ok(prefs_file_in(&folio_home()?))
}

/// Get the payload cache directory (~/.folio/cache/)
pub fn cache_dir() -> Result<PathBuf> {
    Ok(cache_dir_in(&folio_home()?))
}

/// Get the notification journal (~/.folio/notifications.jsonl)
pub fn notifications_journal() -> Result<PathBuf> {
    Ok(notifications_journal_in(&folio_home()?))
}

pub fn prefs_file_in(home: &Path) -> PathBuf {
    home.join(PREFS_FILE)
}

pub fn cache_dir_in(home: &Path) -> PathBuf {
    home.join(CACHE_DIR)
}

pub fn notifications_journal_in(home: &Path) -> PathBuf {
    home.join(NOTIFICATIONS_JOURNAL)
}
