use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Self-custodied wallet tracked by address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    /// Chains the address is scanned on (e.g., "ethereum", "arbitrum")
    pub chains: Vec<String>,
}

impl Wallet {
    pub fn new(name: impl Into<String>, address: impl Into<String>, chains: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            chains,
        }
    }
}

/// Supported centralized exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Coinbase,
    Binance,
    Kraken,
    Okx,
    Other,
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exchange::Coinbase => write!(f, "Coinbase"),
            Exchange::Binance => write!(f, "Binance"),
            Exchange::Kraken => write!(f, "Kraken"),
            Exchange::Okx => write!(f, "OKX"),
            Exchange::Other => write!(f, "Other"),
        }
    }
}

/// Exchange account whose balances are synced through an API key.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CexAccount {
    pub id: Uuid,
    pub name: String,
    pub exchange: Exchange,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl CexAccount {
    pub fn new(
        name: impl Into<String>,
        exchange: Exchange,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            exchange,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            is_active: true,
            last_sync: None,
        }
    }
}

// Credentials must never reach logs.
impl std::fmt::Debug for CexAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CexAccount")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("exchange", &self.exchange)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("is_active", &self.is_active)
            .field("last_sync", &self.last_sync)
            .finish()
    }
}

/// Bank or broker cash account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashAccount {
    pub id: Uuid,
    pub name: String,
    /// ISO currency code, uppercased (e.g., "USD")
    pub currency: String,
    #[serde(default)]
    pub institution: Option<String>,
}

impl CashAccount {
    pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            currency: currency.into().trim().to_uppercase(),
            institution: None,
        }
    }
}
