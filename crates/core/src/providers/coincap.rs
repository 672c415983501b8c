use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::PriceFeed;
use crate::errors::CoreError;
use crate::models::position::AssetType;
use crate::models::price::PriceData;

const BASE_URL: &str = "https://rest.coincap.io/v3";

/// CoinCap API feed for cryptocurrency prices.
///
/// - **Data**: 2000+ assets, USD quotes with 24h percent change.
/// - **Auth**: optional API key (settings key "coincap"), sent as a bearer token.
/// - **Endpoints**: `/assets?ids=a,b,c`, `/assets?search={symbol}`
///
/// CoinCap identifies assets by slug ("bitcoin"), not ticker. Common tickers
/// are pre-mapped; unknown ones are resolved by search and cached.
pub struct CoinCapFeed {
    client: Client,
    api_key: Option<String>,
    /// Uppercase symbol (BTC) → CoinCap id (bitcoin)
    symbol_map: Mutex<HashMap<String, String>>,
}

impl CoinCapFeed {
    pub fn new(api_key: Option<String>) -> Self {
        let common = [
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("USDT", "tether"),
            ("USDC", "usd-coin"),
            ("BNB", "binance-coin"),
            ("XRP", "xrp"),
            ("ADA", "cardano"),
            ("SOL", "solana"),
            ("DOGE", "dogecoin"),
            ("DOT", "polkadot"),
            ("LTC", "litecoin"),
            ("AVAX", "avalanche"),
            ("LINK", "chainlink"),
            ("UNI", "uniswap"),
            ("ATOM", "cosmos"),
            ("NEAR", "near-protocol"),
            ("TRX", "tron"),
            ("DAI", "multi-collateral-dai"),
            ("AAVE", "aave"),
            ("WBTC", "wrapped-bitcoin"),
            ("MKR", "maker"),
            ("LDO", "lido-dao"),
            ("CRV", "curve-dao-token"),
            ("PAXG", "pax-gold"),
        ];
        let symbol_map = common
            .iter()
            .map(|(sym, id)| (sym.to_string(), id.to_string()))
            .collect();

        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_key,
            symbol_map: Mutex::new(symbol_map),
        }
    }

    /// Cached CoinCap id for a symbol, if known without a network call.
    pub fn cached_id(&self, symbol: &str) -> Option<String> {
        let map = self.symbol_map.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&symbol.to_uppercase()).cloned()
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Resolve a symbol like "BTC" to a CoinCap id like "bitcoin" by search.
    /// Caches the result for future lookups.
    async fn resolve_id(&self, symbol: &str) -> Result<String, CoreError> {
        let upper = symbol.to_uppercase();
        if let Some(id) = self.cached_id(&upper) {
            return Ok(id);
        }

        let url = format!("{BASE_URL}/assets?search={upper}&limit=5");
        let resp: AssetsResponse = self
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("Failed to search for {upper}: {e}"),
            })?;

        let matched = resp
            .data
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(&upper))
            .ok_or_else(|| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("No CoinCap asset found for symbol {upper}"),
            })?;

        let id = matched.id.clone();
        {
            let mut map = self.symbol_map.lock().unwrap_or_else(|e| e.into_inner());
            map.insert(upper, id.clone());
        }
        Ok(id)
    }
}

impl Default for CoinCapFeed {
    fn default() -> Self {
        Self::new(None)
    }
}

// ── CoinCap API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct AssetsResponse {
    data: Vec<AssetEntry>,
}

#[derive(Deserialize)]
struct AssetEntry {
    id: String,
    symbol: String,
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    #[serde(rename = "changePercent24Hr")]
    change_percent_24hr: Option<String>,
}

/// Turn one CoinCap asset entry into a quote. Entries without a usable
/// price yield `None`.
fn to_price_data(entry: &AssetEntry, symbol: &str) -> Option<PriceData> {
    let price: f64 = entry.price_usd.as_deref()?.parse().ok()?;
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    let change_pct: f64 = entry
        .change_percent_24hr
        .as_deref()
        .and_then(|s| s.parse().ok())
        .filter(|v: &f64| v.is_finite())
        .unwrap_or(0.0);
    Some(PriceData::new(symbol, price, change_pct))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceFeed for CoinCapFeed {
    fn name(&self) -> &str {
        "CoinCap"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Crypto]
    }

    async fn fetch_prices(
        &self,
        symbols: &[String],
        base_currency: &str,
    ) -> Result<Vec<PriceData>, CoreError> {
        if !base_currency.eq_ignore_ascii_case("USD") {
            return Err(CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("Quotes are only available in USD, not {base_currency}"),
            });
        }

        // id → requested symbol, so results map back to the caller's ticker
        let mut ids: HashMap<String, String> = HashMap::new();
        for symbol in symbols {
            match self.resolve_id(symbol).await {
                Ok(id) => {
                    ids.insert(id, symbol.to_uppercase());
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "skipping unresolvable CoinCap symbol"),
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut id_list: Vec<&str> = ids.keys().map(String::as_str).collect();
        id_list.sort_unstable();
        let url = format!("{BASE_URL}/assets?ids={}", id_list.join(","));

        let resp: AssetsResponse = self
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("Failed to parse asset quotes: {e}"),
            })?;

        let quotes: Vec<PriceData> = resp
            .data
            .iter()
            .filter_map(|entry| {
                let symbol = ids.get(&entry.id)?;
                to_price_data(entry, symbol)
            })
            .collect();
        debug!(requested = symbols.len(), received = quotes.len(), "CoinCap quotes fetched");
        Ok(quotes)
    }
}
