//! Localized string lookup backed by a map.

use std::collections::HashMap;

use super::Localizer;

/// Looks keys up in a fixed table, falling back to the key itself
#[derive(Debug, Clone, Default)]
pub struct MapLocalizer {
    strings: HashMap<String, String>,
}

impl MapLocalizer {
    pub fn new(strings: HashMap<String, String>) -> Self {
        Self { strings }
    }
}

impl Localizer for MapLocalizer {
    fn translate(&self, key: &str) -> String {
        self.strings
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
