//! Price label formatting.

use crate::adapters::PriceMetadata;

/// Currencies rendered as `symbol amount` instead of the store's string
const SYMBOL_CURRENCIES: [(&str, &str); 2] = [("RUB", "₽"), ("UAH", "₴")];

/// Render the price label for a product
pub fn format_price(metadata: &PriceMetadata) -> String {
    SYMBOL_CURRENCIES
        .iter()
        .find(|(code, _)| *code == metadata.iso_currency_code)
        .map(|(_, symbol)| format!("{} {}", symbol, metadata.localized_price))
        .unwrap_or_else(|| metadata.localized_price_string.clone())
}
