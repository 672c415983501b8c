use serde::{Deserialize, Serialize};

use super::account::{CashAccount, CexAccount, Wallet};
use super::position::Position;
use super::price::{CustomPriceMap, PriceMap};
use super::settings::Settings;
use super::snapshot::NetWorthSnapshot;

/// The main data container. Everything in here is written to the JSON
/// portfolio document.
///
/// Calculations borrow it immutably; mutations go through the named
/// operations on `PortfolioService` and `ActionService`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub positions: Vec<Position>,

    /// Latest market prices, replaced wholesale on each refresh.
    #[serde(default)]
    pub prices: PriceMap,

    /// User price overrides; take precedence over `prices`.
    #[serde(default)]
    pub custom_prices: CustomPriceMap,

    #[serde(default)]
    pub wallets: Vec<Wallet>,

    #[serde(default)]
    pub cex_accounts: Vec<CexAccount>,

    #[serde(default)]
    pub cash_accounts: Vec<CashAccount>,

    /// Net worth history, oldest first.
    #[serde(default)]
    pub snapshots: Vec<NetWorthSnapshot>,

    #[serde(default)]
    pub settings: Settings,
}

impl PortfolioState {
    pub fn new() -> Self {
        Self::default()
    }
}
