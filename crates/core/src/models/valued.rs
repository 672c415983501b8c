use serde::{Deserialize, Serialize};

use super::position::Position;

/// A position joined with its effective price.
///
/// Derived on every recomputation, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWithPrice {
    #[serde(flatten)]
    pub position: Position,

    /// Effective unit price (custom override, else market, else 0)
    pub current_price: f64,

    /// amount × current_price, negative for debt
    pub value: f64,

    /// Value change over 24h in the base currency
    pub change_24h: f64,

    pub change_percent_24h: f64,

    /// Share of the positive total of the set this asset was valued in
    pub allocation: f64,

    /// The price came from a user override rather than the feed
    pub has_custom_price: bool,
}

impl AssetWithPrice {
    pub fn symbol(&self) -> &str {
        &self.position.symbol
    }

    pub fn is_debt(&self) -> bool {
        self.position.is_debt
    }
}
