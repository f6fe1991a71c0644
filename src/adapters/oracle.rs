//! Purchase oracle backed by a static product catalog.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{OracleError, PurchaseOracle};

/// Localized price data reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMetadata {
    /// ISO 4217 currency code
    pub iso_currency_code: String,

    /// Bare amount, e.g. "199"
    pub localized_price: String,

    /// Store-formatted price, e.g. "$1.99"
    pub localized_price_string: String,
}

/// Oracle answering from a configured catalog.
///
/// Products present in `prices` exist; products in `owned` are owned.
#[derive(Debug, Clone, Default)]
pub struct CatalogOracle {
    owned: HashSet<String>,
    prices: HashMap<String, Option<PriceMetadata>>,
}

impl CatalogOracle {
    pub fn new(
        owned: impl IntoIterator<Item = String>,
        prices: HashMap<String, Option<PriceMetadata>>,
    ) -> Self {
        Self {
            owned: owned.into_iter().collect(),
            prices,
        }
    }

    /// Record a purchase
    pub fn with_owned(mut self, product_id: impl Into<String>) -> Self {
        self.owned.insert(product_id.into());
        self
    }
}

#[async_trait]
impl PurchaseOracle for CatalogOracle {
    fn is_initialized(&self) -> bool {
        true
    }

    async fn is_owned(&self, product_id: &str) -> bool {
        self.owned.contains(product_id)
    }

    async fn localized_price(&self, product_id: &str) -> Result<PriceMetadata, OracleError> {
        match self.prices.get(product_id) {
            None => Err(OracleError::UnknownProduct(product_id.to_string())),
            Some(None) => Err(OracleError::NoMetadata(product_id.to_string())),
            Some(Some(metadata)) => Ok(metadata.clone()),
        }
    }
}
