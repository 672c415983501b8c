use crate::models::position::Position;
use crate::models::price::{CustomPriceMap, PriceMap};
use crate::models::valued::AssetWithPrice;

/// Joins positions with prices into valued assets.
///
/// Pure business logic, no I/O. Price resolution order:
/// 1. custom override for the symbol
/// 2. market price from the feed
/// 3. zero (missing prices are not an error, the asset is just worth 0)
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Value every position. Output order matches input order.
    ///
    /// Allocation is relative to the positive total of this set, so debts
    /// carry a negative allocation and assets sum to 100.
    pub fn value_positions(
        &self,
        positions: &[Position],
        prices: &PriceMap,
        custom_prices: &CustomPriceMap,
    ) -> Vec<AssetWithPrice> {
        let mut assets: Vec<AssetWithPrice> = positions
            .iter()
            .map(|p| self.value_position(p, prices, custom_prices))
            .collect();
        Self::apply_allocations(&mut assets);
        assets
    }

    /// Value a single position. Its `allocation` is left at 0.
    pub fn value_position(
        &self,
        position: &Position,
        prices: &PriceMap,
        custom_prices: &CustomPriceMap,
    ) -> AssetWithPrice {
        let key = position.price_key();
        let sign = if position.is_debt { -1.0 } else { 1.0 };

        let (current_price, change_per_unit, change_percent_24h, has_custom_price) =
            if let Some(custom) = custom_prices.get(&key) {
                // Overrides carry no 24h history
                (custom.price, 0.0, 0.0, true)
            } else if let Some(market) = prices.get(&key) {
                (market.price, market.change_24h, market.change_percent_24h, false)
            } else {
                (0.0, 0.0, 0.0, false)
            };

        AssetWithPrice {
            position: position.clone(),
            current_price,
            value: sign * position.amount * current_price,
            change_24h: sign * position.amount * change_per_unit,
            change_percent_24h,
            allocation: 0.0,
            has_custom_price,
        }
    }

    /// Effective unit price for a symbol (custom, else market, else 0).
    pub fn effective_price(
        &self,
        symbol: &str,
        prices: &PriceMap,
        custom_prices: &CustomPriceMap,
    ) -> f64 {
        let key = symbol.trim().to_lowercase();
        custom_prices
            .get(&key)
            .map(|c| c.price)
            .or_else(|| prices.get(&key).map(|p| p.price))
            .unwrap_or(0.0)
    }

    /// Recompute allocations of a (possibly filtered) set against its own total.
    pub fn apply_allocations(assets: &mut [AssetWithPrice]) {
        let positive_total: f64 = assets.iter().map(|a| a.value).filter(|v| *v > 0.0).sum();
        for asset in assets.iter_mut() {
            asset.allocation = allocation_of(asset.value, positive_total);
        }
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

/// value / total × 100, or 0 for an empty total.
pub(crate) fn allocation_of(value: f64, positive_total: f64) -> f64 {
    if positive_total > 0.0 {
        value / positive_total * 100.0
    } else {
        0.0
    }
}
