use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::position::AssetType;
use super::valued::AssetWithPrice;

/// Headline numbers for a valued set of positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Net worth: gross assets minus total debts
    pub total_value: f64,

    /// Sum of all positive values
    pub gross_assets: f64,

    /// Sum of |value| over debt positions
    pub total_debts: f64,

    /// 24h value change across the set
    pub change_24h: f64,

    /// 24h change relative to the value 24h ago
    pub change_percent_24h: f64,

    pub position_count: usize,

    pub unique_symbols: usize,
}

/// Positions sharing a symbol, merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedAsset {
    /// Uppercased symbol
    pub symbol: String,

    /// Name of the first position seen for the symbol
    pub name: String,

    pub asset_type: AssetType,

    pub amount: f64,

    pub value: f64,

    /// Blended price: value / amount
    pub current_price: f64,

    pub change_24h: f64,

    pub change_percent_24h: f64,

    pub allocation: f64,

    pub is_debt: bool,

    pub position_ids: Vec<Uuid>,
}

/// One slice of a grouped breakdown (by category, custody, chain, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBreakdown<K> {
    pub key: K,

    /// Net value of the group (debts subtract)
    pub value: f64,

    /// Share of the positive total of the whole set
    pub percentage: f64,

    pub position_count: usize,
}

/// Gross/net/long/short exposure of a valued set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureMetrics {
    pub gross_exposure: f64,
    pub net_exposure: f64,
    pub long_exposure: f64,
    pub short_exposure: f64,
    pub gross_assets: f64,
    pub total_debts: f64,
    pub net_worth: f64,
    /// gross / net worth; 0 when net worth is not positive
    pub leverage: f64,
    /// Cash-like value as a percentage of gross assets
    pub cash_percentage: f64,
}

/// How concentrated the set is in its largest holdings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationMetrics {
    pub top1_percentage: f64,
    pub top5_percentage: f64,
    pub top10_percentage: f64,
    /// Herfindahl-Hirschman index, 0..=10000
    pub herfindahl_index: u32,
    pub position_count: usize,
    /// Symbol of the largest holding by |value|
    pub largest_symbol: Option<String>,
}

/// Long and short value of one exposure bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketExposure<K> {
    pub bucket: K,
    pub long: f64,
    pub short: f64,
    pub net: f64,
    /// Net value as a percentage of gross exposure
    pub percentage_of_gross: f64,
}

/// Field to order asset tables by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Value,
    Amount,
    Symbol,
    Change24h,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Accessors the table sorter needs; implemented by both per-position and
/// per-symbol rows.
pub trait AssetRow {
    fn row_symbol(&self) -> &str;
    fn row_amount(&self) -> f64;
    fn row_value(&self) -> f64;
    fn row_change_24h(&self) -> f64;
    fn row_is_debt(&self) -> bool;
}

impl AssetRow for AssetWithPrice {
    fn row_symbol(&self) -> &str {
        &self.position.symbol
    }
    fn row_amount(&self) -> f64 {
        self.position.amount
    }
    fn row_value(&self) -> f64 {
        self.value
    }
    fn row_change_24h(&self) -> f64 {
        self.change_24h
    }
    fn row_is_debt(&self) -> bool {
        self.position.is_debt
    }
}

impl AssetRow for AggregatedAsset {
    fn row_symbol(&self) -> &str {
        &self.symbol
    }
    fn row_amount(&self) -> f64 {
        self.amount
    }
    fn row_value(&self) -> f64 {
        self.value
    }
    fn row_change_24h(&self) -> f64 {
        self.change_24h
    }
    fn row_is_debt(&self) -> bool {
        self.is_debt
    }
}
