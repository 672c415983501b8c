use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::models::position::{AssetType, Position};
use crate::models::price::{PriceData, PriceMap};
use crate::providers::registry::PriceFeedRegistry;

/// Fetches market prices for held positions from the registered feeds.
///
/// Refresh strategy:
/// - Symbols are grouped by asset type and each group goes to the feeds for
///   that type, in registration order, falling back on failure.
/// - Manual positions have no feed; they are valued through custom prices.
/// - The result is a complete new `PriceMap`. Applying it replaces the old
///   map wholesale, so a newer refresh always supersedes an older one.
///
/// **Note on precision**: prices are `f64` (~15-17 significant digits),
/// enough for display valuations; sums of many positions may accumulate
/// small floating-point error.
pub struct PriceService {
    registry: PriceFeedRegistry,
}

impl PriceService {
    pub fn new(registry: PriceFeedRegistry) -> Self {
        Self { registry }
    }

    /// Check if at least one feed is available for a given asset type.
    pub fn has_feed_for(&self, asset_type: &AssetType) -> bool {
        self.registry.get_feed_for(asset_type).is_some()
    }

    /// Get the names of all feeds available for a given asset type.
    pub fn get_feed_names(&self, asset_type: &AssetType) -> Vec<String> {
        self.registry
            .get_feeds_for(asset_type)
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Quote every distinct symbol held in `positions`.
    ///
    /// Fails only if no quote at all could be fetched while some feed was
    /// tried; individual missing symbols simply stay unpriced.
    pub async fn fetch_prices(
        &self,
        positions: &[Position],
        base_currency: &str,
    ) -> Result<PriceMap, CoreError> {
        let mut by_type: BTreeMap<String, (AssetType, Vec<String>)> = BTreeMap::new();
        for p in positions {
            if p.asset_type == AssetType::Manual {
                continue;
            }
            let (_, symbols) = by_type
                .entry(p.asset_type.to_string())
                .or_insert_with(|| (p.asset_type, Vec::new()));
            if !symbols.contains(&p.symbol) {
                symbols.push(p.symbol.clone());
            }
        }

        let mut prices = PriceMap::new();
        let mut last_error = None;
        let mut unpriced = Vec::new();

        for (asset_type, symbols) in by_type.values() {
            let feeds = self.registry.get_feeds_for(asset_type);
            if feeds.is_empty() {
                warn!(asset_type = %asset_type, count = symbols.len(), "no price feed registered");
                last_error = Some(CoreError::NoProvider(asset_type.to_string()));
                unpriced.push(asset_type.to_string());
                continue;
            }

            let mut answered = false;
            for feed in &feeds {
                match feed.fetch_prices(symbols, base_currency).await {
                    Ok(quotes) => {
                        let accepted = Self::merge_quotes(&mut prices, quotes, feed.name());
                        debug!(feed = feed.name(), accepted, "price feed answered");
                        answered = true;
                        break;
                    }
                    Err(e) => {
                        warn!(feed = feed.name(), error = %e, "price feed failed, trying next");
                        last_error = Some(e);
                    }
                }
            }
            if !answered {
                unpriced.push(asset_type.to_string());
            }
        }

        match last_error {
            Some(e) if prices.is_empty() => Err(e),
            _ => {
                if !unpriced.is_empty() {
                    // The refreshed map replaces the old one, so these drop to 0
                    warn!(asset_types = ?unpriced, "refresh left asset types unpriced");
                }
                info!(symbols = prices.len(), "prices refreshed");
                Ok(prices)
            }
        }
    }

    /// Replace the stored map with a freshly fetched one.
    pub fn apply_prices(current: &mut PriceMap, fresh: PriceMap) {
        *current = fresh;
    }

    /// Insert valid quotes keyed by lowercase symbol. Returns how many were kept.
    fn merge_quotes(prices: &mut PriceMap, quotes: Vec<PriceData>, feed: &str) -> usize {
        let mut accepted = 0;
        for mut quote in quotes {
            // Validate price is finite and non-negative
            if !quote.price.is_finite() || quote.price < 0.0 {
                warn!(feed, symbol = %quote.symbol, price = quote.price, "discarding invalid quote");
                continue;
            }
            quote.symbol = quote.symbol.to_lowercase();
            prices.insert(quote.symbol.clone(), quote);
            accepted += 1;
        }
        accepted
    }
}
