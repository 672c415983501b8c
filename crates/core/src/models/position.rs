use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::MainCategory;

/// What kind of instrument a position holds.
/// Drives the category fallback rules and which price feed is asked for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// Cryptocurrencies and tokens (BTC, ETH, USDC, ...)
    Crypto,
    /// Single equities (AAPL, MSFT, ...)
    Stock,
    /// Exchange-traded funds (SPY, GLD, ...)
    Etf,
    /// Fiat balances held in cash accounts
    Cash,
    /// Manually valued holdings (physical metals, collectibles, private assets)
    Manual,
}

impl AssetType {
    /// Parse a loose, user-typed asset type ("stocks", "ETF", "coin").
    pub fn parse_loose(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "crypto" | "cryptocurrency" | "coin" | "token" => Some(AssetType::Crypto),
            "stock" | "stocks" | "equity" | "share" | "shares" => Some(AssetType::Stock),
            "etf" | "etfs" | "fund" => Some(AssetType::Etf),
            "cash" | "fiat" => Some(AssetType::Cash),
            "manual" | "other" | "metal" | "metals" => Some(AssetType::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Crypto => write!(f, "Crypto"),
            AssetType::Stock => write!(f, "Stock"),
            AssetType::Etf => write!(f, "ETF"),
            AssetType::Cash => write!(f, "Cash"),
            AssetType::Manual => write!(f, "Manual"),
        }
    }
}

/// A single holding: one asset, one source.
///
/// Amounts are always stored as positive numbers. Liabilities (borrowed
/// funds, loans on a lending protocol) keep a positive `amount` and set
/// `is_debt`, which flips the sign of their value during valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unique identifier
    pub id: Uuid,

    pub asset_type: AssetType,

    /// Ticker symbol, uppercased (e.g., "BTC", "AAPL", "USD")
    pub symbol: String,

    /// Human-readable name (e.g., "Bitcoin", "Apple Inc.")
    pub name: String,

    /// Units held (always non-negative)
    pub amount: f64,

    /// Total amount paid for the current `amount`, if known
    #[serde(default)]
    pub cost_basis: Option<f64>,

    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,

    /// Owning wallet/exchange/cash account, if synced from one
    #[serde(default)]
    pub account_id: Option<Uuid>,

    #[serde(default)]
    pub wallet_address: Option<String>,

    #[serde(default)]
    pub chain: Option<String>,

    /// DeFi protocol the position sits in (e.g., "Aave", "Lido")
    #[serde(default)]
    pub protocol: Option<String>,

    /// Borrowed amount rather than an owned asset
    #[serde(default)]
    pub is_debt: bool,

    /// Explicit main category; wins over the symbol table
    #[serde(default)]
    pub asset_class_override: Option<MainCategory>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl Position {
    pub fn new(
        asset_type: AssetType,
        symbol: impl Into<String>,
        name: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asset_type,
            symbol: symbol.into().trim().to_uppercase(),
            name: name.into(),
            amount,
            cost_basis: None,
            purchase_date: None,
            account_id: None,
            wallet_address: None,
            chain: None,
            protocol: None,
            is_debt: false,
            asset_class_override: None,
            notes: None,
        }
    }

    /// Convenience constructors for common asset types
    pub fn crypto(symbol: impl Into<String>, name: impl Into<String>, amount: f64) -> Self {
        Self::new(AssetType::Crypto, symbol, name, amount)
    }

    pub fn stock(symbol: impl Into<String>, name: impl Into<String>, amount: f64) -> Self {
        Self::new(AssetType::Stock, symbol, name, amount)
    }

    pub fn cash(currency: impl Into<String>, name: impl Into<String>, amount: f64) -> Self {
        Self::new(AssetType::Cash, currency, name, amount)
    }

    pub fn with_cost_basis(mut self, cost_basis: f64) -> Self {
        self.cost_basis = Some(cost_basis);
        self
    }

    pub fn with_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_wallet(mut self, address: impl Into<String>, chain: impl Into<String>) -> Self {
        self.wallet_address = Some(address.into());
        self.chain = Some(chain.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_override(mut self, class: MainCategory) -> Self {
        self.asset_class_override = Some(class);
        self
    }

    pub fn as_debt(mut self) -> Self {
        self.is_debt = true;
        self
    }

    /// Lowercased symbol, the key used by the price and custom-price maps.
    pub fn price_key(&self) -> String {
        self.symbol.to_lowercase()
    }

    /// Average cost per unit, if a cost basis is recorded.
    pub fn cost_per_unit(&self) -> Option<f64> {
        match self.cost_basis {
            Some(cost) if self.amount > 0.0 => Some(cost / self.amount),
            _ => None,
        }
    }
}

/// Where a position is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustodyBucket {
    /// Self-custodied on-chain wallet
    Wallet,
    /// Centralized exchange account
    Exchange,
    /// Brokerage, bank or manually entered holding
    Manual,
}

impl std::fmt::Display for CustodyBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustodyBucket::Wallet => write!(f, "Wallet"),
            CustodyBucket::Exchange => write!(f, "Exchange"),
            CustodyBucket::Manual => write!(f, "Manual"),
        }
    }
}
