use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::position::AssetType;
use crate::models::price::PriceData;

/// Trait abstraction for market price feeds.
///
/// Each upstream API (CoinCap, Frankfurter, Alpha Vantage) implements this
/// trait. The rest of the crate only sees `PriceData`, so a feed can be
/// swapped without touching the valuation pipeline.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PriceFeed: Send + Sync {
    /// Human-readable name of this feed (for logs/errors).
    fn name(&self) -> &str;

    /// Which asset types this feed can quote.
    fn supported_asset_types(&self) -> Vec<AssetType>;

    /// Latest quotes for `symbols`, priced in `base_currency`.
    ///
    /// Symbols the feed does not know are left out of the result rather
    /// than failing the whole batch. Returned `PriceData::symbol` is lowercase.
    async fn fetch_prices(
        &self,
        symbols: &[String],
        base_currency: &str,
    ) -> Result<Vec<PriceData>, CoreError>;
}
