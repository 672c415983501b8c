use serde::{Deserialize, Serialize};

/// Top-level taxonomy bucket shown on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainCategory {
    Crypto,
    Stock,
    Cash,
    Metals,
    Other,
}

impl MainCategory {
    pub const ALL: [MainCategory; 5] = [
        MainCategory::Crypto,
        MainCategory::Stock,
        MainCategory::Cash,
        MainCategory::Metals,
        MainCategory::Other,
    ];
}

impl std::fmt::Display for MainCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainCategory::Crypto => write!(f, "Crypto"),
            MainCategory::Stock => write!(f, "Stocks"),
            MainCategory::Cash => write!(f, "Cash"),
            MainCategory::Metals => write!(f, "Metals"),
            MainCategory::Other => write!(f, "Other"),
        }
    }
}

/// Finer-grained bucket within a main category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubCategory {
    Btc,
    Eth,
    Sol,
    Stablecoins,
    Defi,
    /// Any other crypto token
    Tokens,
    Equities,
    Etfs,
    Fiat,
    Gold,
    Silver,
    Platinum,
    /// No table entry and no type rule applies
    Unclassified,
}

impl SubCategory {
    /// The main category a sub-category belongs to when no override applies.
    pub fn main(&self) -> MainCategory {
        match self {
            SubCategory::Btc
            | SubCategory::Eth
            | SubCategory::Sol
            | SubCategory::Stablecoins
            | SubCategory::Defi
            | SubCategory::Tokens => MainCategory::Crypto,
            SubCategory::Equities | SubCategory::Etfs => MainCategory::Stock,
            SubCategory::Fiat => MainCategory::Cash,
            SubCategory::Gold | SubCategory::Silver | SubCategory::Platinum => {
                MainCategory::Metals
            }
            SubCategory::Unclassified => MainCategory::Other,
        }
    }
}

impl std::fmt::Display for SubCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SubCategory::Btc => "BTC",
            SubCategory::Eth => "ETH",
            SubCategory::Sol => "SOL",
            SubCategory::Stablecoins => "Stablecoins",
            SubCategory::Defi => "DeFi",
            SubCategory::Tokens => "Tokens",
            SubCategory::Equities => "Equities",
            SubCategory::Etfs => "ETFs",
            SubCategory::Fiat => "Fiat",
            SubCategory::Gold => "Gold",
            SubCategory::Silver => "Silver",
            SubCategory::Platinum => "Platinum",
            SubCategory::Unclassified => "Unclassified",
        };
        write!(f, "{label}")
    }
}

/// Risk bucket used by the exposure calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureBucket {
    /// Volatile crypto (BTC, ETH, alt tokens)
    CryptoRisk,
    /// Fiat cash and stablecoins
    CashEquivalent,
    Equity,
    Commodity,
    Unclassified,
}

impl ExposureBucket {
    pub fn is_cash_like(&self) -> bool {
        matches!(self, ExposureBucket::CashEquivalent)
    }
}

impl std::fmt::Display for ExposureBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExposureBucket::CryptoRisk => write!(f, "Crypto"),
            ExposureBucket::CashEquivalent => write!(f, "Cash & Equivalents"),
            ExposureBucket::Equity => write!(f, "Equities"),
            ExposureBucket::Commodity => write!(f, "Commodities"),
            ExposureBucket::Unclassified => write!(f, "Unclassified"),
        }
    }
}

/// Full classification of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub main: MainCategory,
    pub sub: SubCategory,
    pub exposure: ExposureBucket,
}
