pub mod errors;
pub mod models;
pub mod parsing;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{DateTime, Utc};
use models::{
    account::{CashAccount, CexAccount, Wallet},
    action::{ExecutionReport, MutationPreview, ParsedPositionAction, ToolCall},
    analytics::{
        AggregatedAsset, BucketExposure, ConcentrationMetrics, ExposureMetrics, GroupBreakdown,
        PortfolioSummary, SortDirection, SortField,
    },
    category::{ExposureBucket, MainCategory, SubCategory},
    portfolio::PortfolioState,
    position::{AssetType, CustodyBucket, Position},
    price::PriceMap,
    settings::Settings,
    snapshot::NetWorthSnapshot,
    valued::AssetWithPrice,
};
use parsing::traits::ActionParser;
use providers::registry::PriceFeedRegistry;
use services::{
    action_service::{fmt_amount, ActionService},
    aggregation_service::AggregationService,
    exposure_service::ExposureService,
    portfolio_service::{is_currency_code, PortfolioService, PositionUpdate},
    price_service::PriceService,
    snapshot_service::SnapshotService,
    valuation_service::ValuationService,
};
use storage::manager::StorageManager;
use tracing::{debug, info};
use uuid::Uuid;

use errors::CoreError;

/// Main entry point for the portfolio tracker core library.
/// Holds the portfolio state and all services needed to operate on it.
#[must_use]
pub struct PortfolioTracker {
    state: PortfolioState,
    portfolio_service: PortfolioService,
    valuation_service: ValuationService,
    aggregation_service: AggregationService,
    exposure_service: ExposureService,
    snapshot_service: SnapshotService,
    action_service: ActionService,
    price_service: PriceService,
    /// Tracks whether any mutation has occurred since the last save/load.
    dirty: bool,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("positions", &self.state.positions.len())
            .field("prices", &self.state.prices.len())
            .field("custom_prices", &self.state.custom_prices.len())
            .field("settings", &self.state.settings)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl PortfolioTracker {
    /// Create a brand new empty portfolio with default settings.
    pub fn create_new() -> Self {
        Self::build(PortfolioState::new())
    }

    /// Wrap an existing state (e.g., one assembled by an external sync).
    pub fn from_state(state: PortfolioState) -> Self {
        Self::build(state)
    }

    /// Load a portfolio from document bytes.
    /// Use this for WASM / Tauri where the frontend handles file I/O.
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        let state = StorageManager::load_from_bytes(data)?;
        Ok(Self::build(state))
    }

    /// Save the current portfolio to document bytes.
    /// Clears the unsaved-changes flag on success.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, CoreError> {
        let bytes = StorageManager::save_to_bytes(&self.state)?;
        self.dirty = false;
        Ok(bytes)
    }

    /// Load from a document file on disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        let state = StorageManager::load_from_file(path)?;
        Ok(Self::build(state))
    }

    /// Save to a document file on disk (native only, not WASM).
    /// Clears the unsaved-changes flag on success.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(&mut self, path: &str) -> Result<(), CoreError> {
        StorageManager::save_to_file(&self.state, path)?;
        self.dirty = false;
        Ok(())
    }

    /// Read-only view of the whole state container.
    #[must_use]
    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    // ── Position Management ─────────────────────────────────────────

    /// Add a position to the portfolio.
    pub fn add_position(&mut self, position: Position) -> Result<Uuid, CoreError> {
        let id = self.portfolio_service.add_position(&mut self.state, position)?;
        self.dirty = true;
        Ok(id)
    }

    /// Update an existing position by its ID.
    /// Validates the updated position before committing.
    pub fn update_position(&mut self, position_id: Uuid, update: PositionUpdate) -> Result<(), CoreError> {
        self.portfolio_service
            .update_position(&mut self.state, position_id, update)?;
        self.dirty = true;
        Ok(())
    }

    /// Remove a position by its ID and return it.
    pub fn remove_position(&mut self, position_id: Uuid) -> Result<Position, CoreError> {
        let removed = self
            .portfolio_service
            .remove_position(&mut self.state, position_id)?;
        self.dirty = true;
        Ok(removed)
    }

    /// Get a single position by its ID.
    #[must_use]
    pub fn get_position(&self, position_id: Uuid) -> Option<&Position> {
        self.portfolio_service
            .get_position(&self.state, position_id)
            .ok()
    }

    /// All positions in insertion order.
    #[must_use]
    pub fn get_positions(&self) -> &[Position] {
        &self.state.positions
    }

    /// Search positions by symbol, name, protocol and notes (case-insensitive).
    #[must_use]
    pub fn search_positions(&self, query: &str) -> Vec<&Position> {
        let q = query.trim().to_lowercase();
        self.state
            .positions
            .iter()
            .filter(|p| {
                p.symbol.to_lowercase().contains(&q)
                    || p.name.to_lowercase().contains(&q)
                    || p.protocol.as_deref().unwrap_or("").to_lowercase().contains(&q)
                    || p.notes.as_deref().unwrap_or("").to_lowercase().contains(&q)
            })
            .collect()
    }

    // ── Accounts ────────────────────────────────────────────────────

    pub fn add_wallet(&mut self, wallet: Wallet) -> Result<Uuid, CoreError> {
        let id = self.portfolio_service.add_wallet(&mut self.state, wallet)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn add_cex_account(&mut self, account: CexAccount) -> Result<Uuid, CoreError> {
        let id = self.portfolio_service.add_cex_account(&mut self.state, account)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn add_cash_account(&mut self, account: CashAccount) -> Result<Uuid, CoreError> {
        let id = self.portfolio_service.add_cash_account(&mut self.state, account)?;
        self.dirty = true;
        Ok(id)
    }

    /// Remove any kind of account. Fails while positions still reference it.
    pub fn remove_account(&mut self, account_id: Uuid) -> Result<(), CoreError> {
        self.portfolio_service.remove_account(&mut self.state, account_id)?;
        self.dirty = true;
        Ok(())
    }

    #[must_use]
    pub fn get_wallets(&self) -> &[Wallet] {
        &self.state.wallets
    }

    #[must_use]
    pub fn get_cex_accounts(&self) -> &[CexAccount] {
        &self.state.cex_accounts
    }

    #[must_use]
    pub fn get_cash_accounts(&self) -> &[CashAccount] {
        &self.state.cash_accounts
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Effective unit price for a symbol (custom, else market, else 0).
    #[must_use]
    pub fn get_price(&self, symbol: &str) -> f64 {
        self.valuation_service
            .effective_price(symbol, &self.state.prices, &self.state.custom_prices)
    }

    /// Replace the market price map wholesale (e.g., prices fetched elsewhere).
    pub fn set_prices(&mut self, prices: PriceMap) {
        PriceService::apply_prices(&mut self.state.prices, prices);
        self.dirty = true;
    }

    /// Set a custom price that overrides the market price for `symbol`.
    pub fn set_custom_price(&mut self, symbol: &str, price: f64, note: Option<String>) -> Result<(), CoreError> {
        self.portfolio_service
            .set_custom_price(&mut self.state, symbol, price, note)?;
        self.dirty = true;
        Ok(())
    }

    /// Remove a custom price; the market price applies again.
    pub fn remove_custom_price(&mut self, symbol: &str) -> Result<(), CoreError> {
        self.portfolio_service
            .remove_custom_price(&mut self.state, symbol)?;
        self.dirty = true;
        Ok(())
    }

    /// Refresh market prices for all held symbols from the registered feeds.
    /// The new map replaces the old one. Returns the number of quotes received.
    pub async fn refresh_prices(&mut self) -> Result<usize, CoreError> {
        let currency = self.state.settings.base_currency.clone();
        let fresh = self
            .price_service
            .fetch_prices(&self.state.positions, &currency)
            .await?;
        let count = fresh.len();
        PriceService::apply_prices(&mut self.state.prices, fresh);
        self.dirty = true;
        Ok(count)
    }

    /// Swap in a custom feed registry (e.g., offline or test feeds).
    pub fn set_price_feeds(&mut self, registry: PriceFeedRegistry) {
        self.price_service = PriceService::new(registry);
    }

    /// Check if at least one price feed is available for a given asset type.
    #[must_use]
    pub fn is_feed_available(&self, asset_type: &AssetType) -> bool {
        self.price_service.has_feed_for(asset_type)
    }

    /// Get the names of available feeds for a given asset type.
    #[must_use]
    pub fn get_feed_names(&self, asset_type: &AssetType) -> Vec<String> {
        self.price_service.get_feed_names(asset_type)
    }

    // ── Valuation & Aggregation ─────────────────────────────────────

    /// Every position joined with its effective price, in insertion order.
    #[must_use]
    pub fn valued_assets(&self) -> Vec<AssetWithPrice> {
        self.valuation_service.value_positions(
            &self.state.positions,
            &self.state.prices,
            &self.state.custom_prices,
        )
    }

    /// Valued assets without dust (per the configured threshold).
    #[must_use]
    pub fn visible_assets(&self) -> Vec<AssetWithPrice> {
        self.aggregation_service
            .filter_dust(&self.valued_assets(), self.state.settings.dust_threshold)
    }

    /// One row per symbol (debts separate), sorted as requested.
    #[must_use]
    pub fn aggregated_assets(&self, field: SortField, direction: SortDirection) -> Vec<AggregatedAsset> {
        let mut rows = self
            .aggregation_service
            .aggregate_by_symbol(&self.valued_assets());
        self.aggregation_service.sort_rows(&mut rows, field, direction);
        rows
    }

    /// Valued assets sorted as requested.
    #[must_use]
    pub fn sorted_assets(&self, field: SortField, direction: SortDirection) -> Vec<AssetWithPrice> {
        let mut rows = self.valued_assets();
        self.aggregation_service.sort_rows(&mut rows, field, direction);
        rows
    }

    #[must_use]
    pub fn breakdown_by_main_category(&self) -> Vec<GroupBreakdown<MainCategory>> {
        self.aggregation_service
            .by_main_category(&self.valued_assets())
    }

    #[must_use]
    pub fn breakdown_by_sub_category(&self) -> Vec<GroupBreakdown<SubCategory>> {
        self.aggregation_service
            .by_sub_category(&self.valued_assets())
    }

    #[must_use]
    pub fn breakdown_by_exposure_bucket(&self) -> Vec<GroupBreakdown<ExposureBucket>> {
        self.aggregation_service
            .by_exposure_bucket(&self.valued_assets())
    }

    #[must_use]
    pub fn breakdown_by_custody(&self) -> Vec<GroupBreakdown<CustodyBucket>> {
        self.aggregation_service.by_custody(
            &self.valued_assets(),
            &self.state.wallets,
            &self.state.cex_accounts,
        )
    }

    #[must_use]
    pub fn breakdown_by_chain(&self) -> Vec<GroupBreakdown<Option<String>>> {
        self.aggregation_service.by_chain(&self.valued_assets())
    }

    /// Headline totals: net worth, gross assets, debts, 24h change.
    #[must_use]
    pub fn summary(&self) -> PortfolioSummary {
        self.aggregation_service.summarize(&self.valued_assets())
    }

    // ── Risk ────────────────────────────────────────────────────────

    #[must_use]
    pub fn exposure_metrics(&self) -> ExposureMetrics {
        self.exposure_service.exposure(&self.valued_assets())
    }

    #[must_use]
    pub fn concentration_metrics(&self) -> ConcentrationMetrics {
        self.exposure_service.concentration(&self.valued_assets())
    }

    #[must_use]
    pub fn exposure_by_bucket(&self) -> Vec<BucketExposure<ExposureBucket>> {
        self.exposure_service
            .exposure_by_bucket(&self.valued_assets())
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Record a net worth snapshot now, regardless of the interval.
    pub fn take_snapshot(&mut self) -> NetWorthSnapshot {
        let snapshot = self
            .snapshot_service
            .build_snapshot(&self.valued_assets(), Utc::now());
        SnapshotService::append(&mut self.state.snapshots, snapshot.clone());
        self.dirty = true;
        snapshot
    }

    /// Record a snapshot only if the configured interval has elapsed.
    pub fn record_snapshot_if_due(&mut self, now: DateTime<Utc>) -> Option<NetWorthSnapshot> {
        let assets = self.valued_assets();
        let interval = self.state.settings.snapshot_interval_hours;
        let recorded =
            self.snapshot_service
                .record_if_due(&mut self.state.snapshots, &assets, interval, now);
        if recorded.is_some() {
            self.dirty = true;
        }
        recorded
    }

    /// Snapshots within `[from, to]`, oldest first.
    #[must_use]
    pub fn snapshot_history(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&NetWorthSnapshot> {
        self.snapshot_service
            .history(&self.state.snapshots, from, to)
    }

    #[must_use]
    pub fn get_snapshots(&self) -> &[NetWorthSnapshot] {
        &self.state.snapshots
    }

    // ── Actions ─────────────────────────────────────────────────────

    /// Validate a typed action (e.g., from a menu) and describe its effect.
    /// Never modifies state.
    pub fn preview_action(&self, action: ParsedPositionAction) -> Result<MutationPreview, CoreError> {
        self.action_service.preview(&self.state, action)
    }

    /// Validate a raw tool call and describe its effect.
    pub fn preview_tool_call(&self, call: &ToolCall) -> Result<MutationPreview, CoreError> {
        self.action_service.preview_tool_call(&self.state, call)
    }

    /// Parse free text with `parser` and preview the result.
    pub async fn preview_command(
        &self,
        parser: &dyn ActionParser,
        text: &str,
    ) -> Result<MutationPreview, CoreError> {
        let call = parser.parse(text).await?;
        debug!(parser = parser.name(), tool = %call.tool, "command parsed");
        self.preview_tool_call(&call)
    }

    /// Apply a confirmed preview. Stale previews are rejected.
    pub fn execute_action(&mut self, preview: &MutationPreview) -> Result<ExecutionReport, CoreError> {
        let report = self.action_service.execute(&mut self.state, preview)?;
        self.dirty = true;
        Ok(report)
    }

    // ── Settings ────────────────────────────────────────────────────

    /// Get current settings.
    #[must_use]
    pub fn get_settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Set the base currency all values are expressed in (e.g., "USD", "EUR").
    /// Currency code must be a 3-letter alphabetic string.
    pub fn set_base_currency(&mut self, currency: &str) -> Result<(), CoreError> {
        let trimmed = currency.trim().to_uppercase();
        if !is_currency_code(&trimmed) {
            return Err(CoreError::ValidationError(format!(
                "Invalid currency code '{currency}': must be exactly 3 ASCII letters (e.g., USD, EUR)"
            )));
        }
        self.state.settings.base_currency = trimmed;
        self.dirty = true;
        Ok(())
    }

    /// Price refresh interval in seconds; must be positive.
    pub fn set_refresh_interval(&mut self, seconds: u64) -> Result<(), CoreError> {
        if seconds == 0 {
            return Err(CoreError::ValidationError(
                "Refresh interval must be at least 1 second".into(),
            ));
        }
        self.state.settings.refresh_interval_secs = seconds;
        self.dirty = true;
        Ok(())
    }

    /// Value below which non-debt assets are hidden; must be >= 0.
    pub fn set_dust_threshold(&mut self, threshold: f64) -> Result<(), CoreError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Dust threshold must be non-negative (got {threshold})"
            )));
        }
        self.state.settings.dust_threshold = threshold;
        self.dirty = true;
        Ok(())
    }

    /// Minimum hours between automatic snapshots; must be positive.
    pub fn set_snapshot_interval(&mut self, hours: u32) -> Result<(), CoreError> {
        if hours == 0 {
            return Err(CoreError::ValidationError(
                "Snapshot interval must be at least 1 hour".into(),
            ));
        }
        self.state.settings.snapshot_interval_hours = hours;
        self.dirty = true;
        Ok(())
    }

    /// Set an API key for a feed (e.g., "coincap", "alphavantage").
    /// Rebuilds the feed registry so the new key takes effect immediately.
    pub fn set_api_key(&mut self, feed: String, key: String) {
        self.state.settings.api_keys.insert(feed, key);
        self.rebuild_feeds();
        self.dirty = true;
    }

    /// Remove an API key for a feed.
    /// Rebuilds the feed registry so the removal takes effect immediately.
    pub fn remove_api_key(&mut self, feed: &str) -> bool {
        let removed = self.state.settings.api_keys.remove(feed).is_some();
        if removed {
            self.rebuild_feeds();
            self.dirty = true;
        }
        removed
    }

    /// Returns `true` if the portfolio has been modified since the last save or load.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    // ── Export ──────────────────────────────────────────────────────

    /// Export the full state as pretty JSON (no envelope; for debugging/display).
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&self.state)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize portfolio: {e}")))
    }

    /// Export valued positions as a CSV string.
    /// Columns: id, symbol, name, asset_type, amount, price, value, allocation, is_debt
    #[must_use]
    pub fn export_positions_to_csv(&self) -> String {
        let mut csv = String::from("id,symbol,name,asset_type,amount,price,value,allocation,is_debt\n");
        for asset in self.valued_assets() {
            let p = &asset.position;
            // Quote names that would break the row
            let name = if p.name.contains(',') || p.name.contains('"') || p.name.contains('\n') {
                format!("\"{}\"", p.name.replace('"', "\"\""))
            } else {
                p.name.clone()
            };
            csv.push_str(&format!(
                "{},{},{},{},{},{:.2},{:.2},{:.2},{}\n",
                p.id,
                p.symbol,
                name,
                p.asset_type,
                fmt_amount(p.amount),
                asset.current_price,
                asset.value,
                asset.allocation,
                p.is_debt,
            ));
        }
        csv
    }

    // ── Internal ────────────────────────────────────────────────────

    fn rebuild_feeds(&mut self) {
        let registry = PriceFeedRegistry::new_with_defaults(&self.state.settings.api_keys);
        self.price_service = PriceService::new(registry);
    }

    fn build(state: PortfolioState) -> Self {
        let registry = PriceFeedRegistry::new_with_defaults(&state.settings.api_keys);
        info!(
            positions = state.positions.len(),
            feeds = registry.len(),
            "portfolio tracker ready"
        );

        Self {
            state,
            portfolio_service: PortfolioService::new(),
            valuation_service: ValuationService::new(),
            aggregation_service: AggregationService::new(),
            exposure_service: ExposureService::new(),
            snapshot_service: SnapshotService::new(),
            action_service: ActionService::new(),
            price_service: PriceService::new(registry),
            dirty: false,
        }
    }
}
