//! Persisted portion of chapter state.
//!
//! Keys are prefixed with the product id: `{id}_IsLocked`, `{id}_IsLoaded`,
//! `{id}_Version`, `{id}_PriceString`, `{id}_NotificationId`. Flags are
//! stored as `1`/`0`.

use crate::adapters::{KeyValueStore, StoreError};
use crate::domain::VersionHash;

/// Values restored at construction and written after every state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedChapter {
    pub is_locked: bool,
    pub is_loaded: bool,
    pub version: VersionHash,
    pub price: String,
    pub notification_id: Option<String>,
}

impl Default for PersistedChapter {
    fn default() -> Self {
        Self {
            is_locked: true,
            is_loaded: false,
            version: VersionHash::ZERO,
            price: String::new(),
            notification_id: None,
        }
    }
}

fn key(product_id: &str, field: &str) -> String {
    format!("{}_{}", product_id, field)
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("1") => true,
        Some("0") => false,
        _ => default,
    }
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

impl PersistedChapter {
    /// Read every key for `product_id`, falling back to defaults
    pub fn load(store: &dyn KeyValueStore, product_id: &str) -> Self {
        let defaults = Self::default();

        Self {
            is_locked: parse_flag(store.get(&key(product_id, "IsLocked")), defaults.is_locked),
            is_loaded: parse_flag(store.get(&key(product_id, "IsLoaded")), defaults.is_loaded),
            version: store
                .get(&key(product_id, "Version"))
                .map(|v| VersionHash::from_persisted(&v))
                .unwrap_or(defaults.version),
            price: store
                .get(&key(product_id, "PriceString"))
                .unwrap_or(defaults.price),
            notification_id: store
                .get(&key(product_id, "NotificationId"))
                .filter(|id| !id.is_empty()),
        }
    }

    /// Write every key together and flush
    pub fn save(&self, store: &dyn KeyValueStore, product_id: &str) -> Result<(), StoreError> {
        store.set(&key(product_id, "IsLocked"), flag(self.is_locked));
        store.set(&key(product_id, "IsLoaded"), flag(self.is_loaded));
        store.set(&key(product_id, "Version"), self.version.to_persisted());
        store.set(&key(product_id, "PriceString"), self.price.clone());
        store.set(
            &key(product_id, "NotificationId"),
            self.notification_id.clone().unwrap_or_default(),
        );
        store.flush()
    }
}
