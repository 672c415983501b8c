use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;
use tracing::debug;

use super::traits::PriceFeed;
use crate::errors::CoreError;
use crate::models::position::AssetType;
use crate::models::price::PriceData;

const BASE_URL: &str = "https://api.frankfurter.dev/v1";

/// Frankfurter API feed for fiat cash balances.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) reference rates.
/// - **Endpoint**: `/latest?base={base}&symbols=A,B`
///
/// A cash position in currency X is priced as the value of one X in the
/// base currency. ECB rates are daily, so the 24h change is reported as 0.
pub struct FrankfurterFeed {
    client: Client,
}

impl FrankfurterFeed {
    pub fn new() -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for FrankfurterFeed {
    fn default() -> Self {
        Self::new()
    }
}

// ── Frankfurter API response types ──────────────────────────────────

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Invert "1 base = rate X" into "1 X = 1/rate base".
fn unit_price(rate: f64) -> Option<f64> {
    (rate.is_finite() && rate > 0.0).then(|| 1.0 / rate)
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceFeed for FrankfurterFeed {
    fn name(&self) -> &str {
        "Frankfurter"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Cash]
    }

    async fn fetch_prices(
        &self,
        symbols: &[String],
        base_currency: &str,
    ) -> Result<Vec<PriceData>, CoreError> {
        let base = base_currency.to_uppercase();
        let mut quotes = Vec::new();
        let mut foreign: Vec<String> = Vec::new();

        for symbol in symbols {
            let upper = symbol.to_uppercase();
            if upper == base {
                // Same currency → price is 1.0
                quotes.push(PriceData::new(&upper, 1.0, 0.0));
            } else if !foreign.contains(&upper) {
                foreign.push(upper);
            }
        }
        if foreign.is_empty() {
            return Ok(quotes);
        }

        let url = format!("{BASE_URL}/latest?base={base}&symbols={}", foreign.join(","));
        let resp: RatesResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "Frankfurter".into(),
                message: format!("Failed to parse rates for base {base}: {e}"),
            })?;

        for symbol in &foreign {
            if let Some(price) = resp.rates.get(symbol).copied().and_then(unit_price) {
                quotes.push(PriceData::new(symbol, price, 0.0));
            }
        }
        debug!(base = %base, received = quotes.len(), "Frankfurter rates fetched");
        Ok(quotes)
    }
}
