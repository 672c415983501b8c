use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::category::MainCategory;
use crate::models::snapshot::NetWorthSnapshot;
use crate::models::valued::AssetWithPrice;

use super::category_service::CategoryService;

/// Builds and appends net worth snapshots.
pub struct SnapshotService {
    category_service: CategoryService,
}

impl SnapshotService {
    pub fn new() -> Self {
        Self {
            category_service: CategoryService::new(),
        }
    }

    /// Compute a snapshot of the valued set at `timestamp`.
    /// Debts reduce the value of the category they are classified under.
    pub fn build_snapshot(&self, assets: &[AssetWithPrice], timestamp: DateTime<Utc>) -> NetWorthSnapshot {
        let mut snapshot = NetWorthSnapshot {
            id: Uuid::new_v4(),
            timestamp,
            total_net_worth: 0.0,
            crypto_value: 0.0,
            stock_value: 0.0,
            cash_value: 0.0,
            metals_value: 0.0,
            other_value: 0.0,
            total_debts: 0.0,
        };

        for asset in assets {
            let slot = match self.category_service.main_category(&asset.position) {
                MainCategory::Crypto => &mut snapshot.crypto_value,
                MainCategory::Stock => &mut snapshot.stock_value,
                MainCategory::Cash => &mut snapshot.cash_value,
                MainCategory::Metals => &mut snapshot.metals_value,
                MainCategory::Other => &mut snapshot.other_value,
            };
            *slot += asset.value;
            snapshot.total_net_worth += asset.value;
            if asset.value < 0.0 {
                snapshot.total_debts += asset.value.abs();
            }
        }
        snapshot
    }

    /// Append a snapshot if the last one is older than `interval_hours`.
    /// Returns the new snapshot, or `None` when it is not due yet.
    pub fn record_if_due(
        &self,
        snapshots: &mut Vec<NetWorthSnapshot>,
        assets: &[AssetWithPrice],
        interval_hours: u32,
        now: DateTime<Utc>,
    ) -> Option<NetWorthSnapshot> {
        if !self.is_due(snapshots, interval_hours, now) {
            debug!(count = snapshots.len(), "net worth snapshot not due yet");
            return None;
        }
        let snapshot = self.build_snapshot(assets, now);
        info!(
            net_worth = snapshot.total_net_worth,
            at = %snapshot.timestamp,
            "recorded net worth snapshot"
        );
        Self::append(snapshots, snapshot.clone());
        Some(snapshot)
    }

    /// Whether enough time has passed since the newest snapshot.
    pub fn is_due(&self, snapshots: &[NetWorthSnapshot], interval_hours: u32, now: DateTime<Utc>) -> bool {
        match snapshots.iter().map(|s| s.timestamp).max() {
            Some(last) => now - last >= Duration::hours(i64::from(interval_hours)),
            None => true,
        }
    }

    /// Snapshots within `[from, to]`, oldest first.
    pub fn history<'a>(
        &self,
        snapshots: &'a [NetWorthSnapshot],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&'a NetWorthSnapshot> {
        snapshots
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .collect()
    }

    /// Insert keeping timestamp order; equal timestamps append after existing ones.
    pub fn append(snapshots: &mut Vec<NetWorthSnapshot>, snapshot: NetWorthSnapshot) {
        let pos = snapshots.partition_point(|s| s.timestamp <= snapshot.timestamp);
        snapshots.insert(pos, snapshot);
    }
}

impl Default for SnapshotService {
    fn default() -> Self {
        Self::new()
    }
}
