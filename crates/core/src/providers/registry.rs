use std::collections::HashMap;

use crate::models::position::AssetType;

use super::alphavantage::AlphaVantageFeed;
use super::coincap::CoinCapFeed;
use super::frankfurter::FrankfurterFeed;
use super::traits::PriceFeed;

/// Registry of all available price feeds.
///
/// Routes requests to the right feed based on `AssetType`; registration
/// order is fallback priority.
pub struct PriceFeedRegistry {
    feeds: Vec<Box<dyn PriceFeed>>,
}

impl PriceFeedRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { feeds: Vec::new() }
    }

    /// Create a registry with all default feeds pre-configured.
    pub fn new_with_defaults(api_keys: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();

        // CoinCap: crypto, key optional
        registry.register(Box::new(CoinCapFeed::new(api_keys.get("coincap").cloned())));

        // Frankfurter: fiat cash, no API key needed
        registry.register(Box::new(FrankfurterFeed::new()));

        // Alpha Vantage: stocks and ETFs, requires API key
        if let Some(key) = api_keys.get("alphavantage") {
            registry.register(Box::new(AlphaVantageFeed::new(key.clone())));
        }

        registry
    }

    /// Register a new price feed.
    pub fn register(&mut self, feed: Box<dyn PriceFeed>) {
        self.feeds.push(feed);
    }

    /// Find the first feed that supports the given asset type.
    pub fn get_feed_for(&self, asset_type: &AssetType) -> Option<&dyn PriceFeed> {
        self.feeds
            .iter()
            .find(|f| f.supported_asset_types().contains(asset_type))
            .map(|f| f.as_ref())
    }

    /// Return ALL feeds that support the given asset type, in registration order.
    /// Used for fallback: if the first feed fails, try the next one.
    pub fn get_feeds_for(&self, asset_type: &AssetType) -> Vec<&dyn PriceFeed> {
        self.feeds
            .iter()
            .filter(|f| f.supported_asset_types().contains(asset_type))
            .map(|f| f.as_ref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl Default for PriceFeedRegistry {
    fn default() -> Self {
        Self::new()
    }
}
