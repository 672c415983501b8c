use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::account::{CexAccount, Wallet};
use crate::models::analytics::{
    AggregatedAsset, AssetRow, GroupBreakdown, PortfolioSummary, SortDirection, SortField,
};
use crate::models::category::{ExposureBucket, MainCategory, SubCategory};
use crate::models::position::{CustodyBucket, Position};
use crate::models::valued::AssetWithPrice;

use super::category_service::CategoryService;
use super::valuation_service::{allocation_of, ValuationService};

/// Groups, sorts and summarizes valued assets.
///
/// Every percentage is computed against the positive total of the slice
/// passed in, so a filtered view gets its own 100%.
pub struct AggregationService {
    category_service: CategoryService,
}

impl AggregationService {
    pub fn new() -> Self {
        Self {
            category_service: CategoryService::new(),
        }
    }

    /// Merge positions sharing a symbol (case-insensitive).
    ///
    /// Debt and owned positions of the same symbol stay separate rows.
    /// Rows come out in first-seen order; sort afterwards if needed.
    pub fn aggregate_by_symbol(&self, assets: &[AssetWithPrice]) -> Vec<AggregatedAsset> {
        let mut index: HashMap<(String, bool), usize> = HashMap::new();
        let mut rows: Vec<AggregatedAsset> = Vec::new();

        for asset in assets {
            let key = (asset.position.symbol.to_uppercase(), asset.position.is_debt);
            match index.get(&key).copied() {
                Some(i) => {
                    let row = &mut rows[i];
                    row.amount += asset.position.amount;
                    row.value += asset.value;
                    row.change_24h += asset.change_24h;
                    row.position_ids.push(asset.position.id);
                }
                None => {
                    index.insert(key.clone(), rows.len());
                    rows.push(AggregatedAsset {
                        symbol: key.0,
                        name: asset.position.name.clone(),
                        asset_type: asset.position.asset_type,
                        amount: asset.position.amount,
                        value: asset.value,
                        current_price: 0.0,
                        change_24h: asset.change_24h,
                        change_percent_24h: 0.0,
                        allocation: 0.0,
                        is_debt: asset.position.is_debt,
                        position_ids: vec![asset.position.id],
                    });
                }
            }
        }

        let positive_total = positive_total(rows.iter().map(|r| r.value));
        for row in &mut rows {
            row.current_price = if row.amount.abs() > f64::EPSILON {
                row.value.abs() / row.amount
            } else {
                0.0
            };
            row.change_percent_24h = percent_change(row.value, row.change_24h);
            row.allocation = allocation_of(row.value, positive_total);
        }
        rows
    }

    /// Group by an arbitrary key. Groups are ordered by value, largest first;
    /// equal values keep first-seen order.
    pub fn group_by<K, F>(&self, assets: &[AssetWithPrice], key_fn: F) -> Vec<GroupBreakdown<K>>
    where
        K: Eq + std::hash::Hash + Clone,
        F: Fn(&AssetWithPrice) -> K,
    {
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut groups: Vec<GroupBreakdown<K>> = Vec::new();

        for asset in assets {
            let key = key_fn(asset);
            match index.get(&key).copied() {
                Some(i) => {
                    groups[i].value += asset.value;
                    groups[i].position_count += 1;
                }
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(GroupBreakdown {
                        key,
                        value: asset.value,
                        percentage: 0.0,
                        position_count: 1,
                    });
                }
            }
        }

        let total = positive_total(assets.iter().map(|a| a.value));
        for group in &mut groups {
            group.percentage = allocation_of(group.value, total);
        }
        groups.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
        groups
    }

    pub fn by_main_category(&self, assets: &[AssetWithPrice]) -> Vec<GroupBreakdown<MainCategory>> {
        self.group_by(assets, |a| self.category_service.classify_position(&a.position).main)
    }

    pub fn by_sub_category(&self, assets: &[AssetWithPrice]) -> Vec<GroupBreakdown<SubCategory>> {
        self.group_by(assets, |a| self.category_service.classify_position(&a.position).sub)
    }

    pub fn by_exposure_bucket(
        &self,
        assets: &[AssetWithPrice],
    ) -> Vec<GroupBreakdown<ExposureBucket>> {
        self.group_by(assets, |a| {
            self.category_service.classify_position(&a.position).exposure
        })
    }

    /// Group by where the asset is held.
    pub fn by_custody(
        &self,
        assets: &[AssetWithPrice],
        wallets: &[Wallet],
        cex_accounts: &[CexAccount],
    ) -> Vec<GroupBreakdown<CustodyBucket>> {
        let wallet_ids: HashSet<Uuid> = wallets.iter().map(|w| w.id).collect();
        let cex_ids: HashSet<Uuid> = cex_accounts.iter().map(|c| c.id).collect();
        self.group_by(assets, |a| {
            Self::custody_bucket(&a.position, &wallet_ids, &cex_ids)
        })
    }

    /// Group by chain (lowercased). Positions without a chain land under `None`.
    pub fn by_chain(&self, assets: &[AssetWithPrice]) -> Vec<GroupBreakdown<Option<String>>> {
        self.group_by(assets, |a| {
            a.position
                .chain
                .as_ref()
                .map(|c| c.trim().to_lowercase())
        })
    }

    /// Classify a position's custody: exchange accounts first, then wallets
    /// (by account or by a recorded address), everything else is manual.
    pub fn custody_bucket(
        position: &Position,
        wallet_ids: &HashSet<Uuid>,
        cex_ids: &HashSet<Uuid>,
    ) -> CustodyBucket {
        match position.account_id {
            Some(id) if cex_ids.contains(&id) => CustodyBucket::Exchange,
            Some(id) if wallet_ids.contains(&id) => CustodyBucket::Wallet,
            _ if position.wallet_address.is_some() => CustodyBucket::Wallet,
            _ => CustodyBucket::Manual,
        }
    }

    /// Stable sort of table rows.
    ///
    /// Debt rows sort by absolute value, so the largest loan comes first in a
    /// descending value sort. Ties keep their input order.
    pub fn sort_rows<R: AssetRow>(&self, rows: &mut [R], field: SortField, direction: SortDirection) {
        rows.sort_by(|a, b| {
            let ord = match field {
                SortField::Value => cmp_f64(sort_value(a), sort_value(b)),
                SortField::Amount => cmp_f64(a.row_amount(), b.row_amount()),
                SortField::Symbol => a
                    .row_symbol()
                    .to_lowercase()
                    .cmp(&b.row_symbol().to_lowercase()),
                SortField::Change24h => cmp_f64(a.row_change_24h(), b.row_change_24h()),
            };
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }

    /// Drop owned assets worth less than `threshold`; debts are always kept.
    /// Allocations are recomputed against the remaining set.
    pub fn filter_dust(&self, assets: &[AssetWithPrice], threshold: f64) -> Vec<AssetWithPrice> {
        let mut kept: Vec<AssetWithPrice> = assets
            .iter()
            .filter(|a| a.position.is_debt || a.value.abs() >= threshold)
            .cloned()
            .collect();
        ValuationService::apply_allocations(&mut kept);
        kept
    }

    /// Headline totals of a valued set.
    pub fn summarize(&self, assets: &[AssetWithPrice]) -> PortfolioSummary {
        let gross_assets = positive_total(assets.iter().map(|a| a.value));
        let total_debts: f64 = assets
            .iter()
            .map(|a| a.value)
            .filter(|v| *v < 0.0)
            .map(f64::abs)
            .sum();
        let total_value = gross_assets - total_debts;
        let change_24h: f64 = assets.iter().map(|a| a.change_24h).sum();
        let unique_symbols = assets
            .iter()
            .map(|a| a.position.symbol.to_uppercase())
            .collect::<HashSet<_>>()
            .len();

        PortfolioSummary {
            total_value,
            gross_assets,
            total_debts,
            change_24h,
            change_percent_24h: percent_change(total_value, change_24h),
            position_count: assets.len(),
            unique_symbols,
        }
    }
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new()
    }
}

fn positive_total(values: impl Iterator<Item = f64>) -> f64 {
    values.filter(|v| *v > 0.0).sum()
}

/// Percent change given the current value and the change that led to it.
fn percent_change(current: f64, change: f64) -> f64 {
    let previous = current - change;
    if previous.abs() > f64::EPSILON {
        change / previous.abs() * 100.0
    } else {
        0.0
    }
}

fn sort_value<R: AssetRow>(row: &R) -> f64 {
    if row.row_is_debt() {
        row.row_value().abs()
    } else {
        row.row_value()
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
