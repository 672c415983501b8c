use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time net worth, broken down by main category.
///
/// Snapshots are append-only; none of the services ever edits one after
/// it has been recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthSnapshot {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_net_worth: f64,
    pub crypto_value: f64,
    pub stock_value: f64,
    pub cash_value: f64,
    pub metals_value: f64,
    pub other_value: f64,
    /// Sum of |value| over debt positions
    pub total_debts: f64,
}
