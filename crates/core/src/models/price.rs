use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest market quote for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    /// Lowercase symbol, e.g. "btc"
    pub symbol: String,

    /// Price in the base currency
    pub price: f64,

    /// Absolute price change over the last 24h
    pub change_24h: f64,

    /// Percentage price change over the last 24h (5.0 = +5%)
    pub change_percent_24h: f64,

    pub last_updated: DateTime<Utc>,
}

impl PriceData {
    pub fn new(symbol: &str, price: f64, change_percent_24h: f64) -> Self {
        // Derive the absolute change from the percent move: p0 = p / (1 + pct/100)
        let base = 1.0 + change_percent_24h / 100.0;
        let change_24h = if base.abs() > f64::EPSILON {
            price - price / base
        } else {
            0.0
        };
        Self {
            symbol: symbol.trim().to_lowercase(),
            price,
            change_24h,
            change_percent_24h,
            last_updated: Utc::now(),
        }
    }
}

/// User-entered price that overrides the market quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPrice {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub note: Option<String>,
    pub set_at: DateTime<Utc>,
}

impl CustomPrice {
    pub fn new(symbol: &str, price: f64) -> Self {
        Self {
            symbol: symbol.trim().to_lowercase(),
            price,
            note: None,
            set_at: Utc::now(),
        }
    }
}

/// Market prices keyed by lowercase symbol.
pub type PriceMap = HashMap<String, PriceData>;

/// Custom price overrides keyed by lowercase symbol.
pub type CustomPriceMap = HashMap<String, CustomPrice>;
