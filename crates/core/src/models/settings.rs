use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User-configurable settings, stored inside the portfolio document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// The currency all values are expressed in (e.g., "USD", "EUR").
    pub base_currency: String,

    /// Optional API keys for price feeds that require them.
    /// Keys: feed name (e.g., "coincap"). Values: the API key string.
    pub api_keys: HashMap<String, String>,

    /// How often prices are re-fetched, in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Non-debt assets worth less than this are hidden as dust.
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: f64,

    /// Minimum spacing between two net worth snapshots, in hours.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_hours: u32,
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_dust_threshold() -> f64 {
    1.0
}

fn default_snapshot_interval() -> u32 {
    24
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            api_keys: HashMap::new(),
            refresh_interval_secs: default_refresh_interval(),
            dust_threshold: default_dust_threshold(),
            snapshot_interval_hours: default_snapshot_interval(),
        }
    }
}
