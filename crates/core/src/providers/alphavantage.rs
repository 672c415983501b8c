use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;
use tracing::warn;

use super::traits::PriceFeed;
use crate::errors::CoreError;
use crate::models::position::AssetType;
use crate::models::price::PriceData;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage API feed for stock and ETF quotes.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key (set via settings as "alphavantage").
/// - **Coverage**: 100k+ global equity symbols.
///
/// One `GLOBAL_QUOTE` request per symbol. Quotes are in the listing
/// currency, which is USD for US tickers.
pub struct AlphaVantageFeed {
    client: Client,
    api_key: String,
}

impl AlphaVantageFeed {
    pub fn new(api_key: String) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceData, CoreError> {
        let upper = symbol.to_uppercase();
        let resp: GlobalQuoteResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", upper.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("Failed to parse quote for {upper}: {e}"),
            })?;

        let quote = resp.global_quote.ok_or_else(|| CoreError::Api {
            provider: "Alpha Vantage".into(),
            message: format!("No quote data for {upper}. API limit may be exceeded."),
        })?;
        quote.into_price_data(&upper)
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    /// e.g. "1.2345%"
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

impl GlobalQuote {
    fn into_price_data(self, symbol: &str) -> Result<PriceData, CoreError> {
        let price: f64 = self
            .price
            .as_deref()
            .ok_or_else(|| CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("Quote for {symbol} has no price"),
            })?
            .parse()
            .map_err(|e| CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("Invalid price format for {symbol}: {e}"),
            })?;

        let change_percent = self
            .change_percent
            .as_deref()
            .and_then(|s| s.trim_end_matches('%').parse::<f64>().ok())
            .unwrap_or(0.0);

        let mut data = PriceData::new(symbol, price, change_percent);
        if let Some(change) = self.change.as_deref().and_then(|s| s.parse::<f64>().ok()) {
            data.change_24h = change;
        }
        Ok(data)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceFeed for AlphaVantageFeed {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock, AssetType::Etf]
    }

    async fn fetch_prices(
        &self,
        symbols: &[String],
        _base_currency: &str,
    ) -> Result<Vec<PriceData>, CoreError> {
        let mut quotes = Vec::with_capacity(symbols.len());
        let mut last_error = None;
        for symbol in symbols {
            match self.fetch_quote(symbol).await {
                Ok(q) => quotes.push(q),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Alpha Vantage quote failed");
                    last_error = Some(e);
                }
            }
        }
        // Surface the failure only when nothing came back at all
        match last_error {
            Some(e) if quotes.is_empty() => Err(e),
            _ => Ok(quotes),
        }
    }
}
