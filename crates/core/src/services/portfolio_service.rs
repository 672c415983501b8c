use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::account::{CashAccount, CexAccount, Wallet};
use crate::models::portfolio::PortfolioState;
use crate::models::position::Position;
use crate::models::price::CustomPrice;

/// Field changes for `update_position`; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionUpdate {
    pub name: Option<String>,
    pub amount: Option<f64>,
    /// `Some(None)` clears the cost basis
    pub cost_basis: Option<Option<f64>>,
    pub purchase_date: Option<Option<NaiveDate>>,
    pub account_id: Option<Option<Uuid>>,
    pub notes: Option<Option<String>>,
}

impl PositionUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Named add/update/remove operations on positions, accounts and custom
/// prices.
///
/// Pure business logic with no I/O. Every operation validates
/// first and leaves the state untouched on error.
pub struct PortfolioService;

impl PortfolioService {
    pub fn new() -> Self {
        Self
    }

    // ── Positions ───────────────────────────────────────────────────

    /// Add a position after validating it.
    pub fn add_position(
        &self,
        state: &mut PortfolioState,
        position: Position,
    ) -> Result<Uuid, CoreError> {
        if state.positions.iter().any(|p| p.id == position.id) {
            return Err(CoreError::ValidationError(format!(
                "Position {} already exists",
                position.id
            )));
        }
        self.validate_position(state, &position)?;
        let id = position.id;
        state.positions.push(position);
        Ok(id)
    }

    /// Update an existing position. Validates the new state before committing.
    pub fn update_position(
        &self,
        state: &mut PortfolioState,
        position_id: Uuid,
        update: PositionUpdate,
    ) -> Result<(), CoreError> {
        if update.is_empty() {
            return Err(CoreError::ValidationError("No fields to update".into()));
        }
        let idx = Self::index_of(state, position_id)?;

        // Apply to a copy, validate, then commit
        let mut updated = state.positions[idx].clone();
        if let Some(name) = update.name {
            updated.name = name;
        }
        if let Some(amount) = update.amount {
            updated.amount = amount;
        }
        if let Some(cost_basis) = update.cost_basis {
            updated.cost_basis = cost_basis;
        }
        if let Some(purchase_date) = update.purchase_date {
            updated.purchase_date = purchase_date;
        }
        if let Some(account_id) = update.account_id {
            updated.account_id = account_id;
        }
        if let Some(notes) = update.notes {
            updated.notes = notes;
        }

        self.validate_position(state, &updated)?;
        state.positions[idx] = updated;
        Ok(())
    }

    /// Remove a position by its UUID and return it.
    pub fn remove_position(
        &self,
        state: &mut PortfolioState,
        position_id: Uuid,
    ) -> Result<Position, CoreError> {
        let idx = Self::index_of(state, position_id)?;
        Ok(state.positions.remove(idx))
    }

    pub fn get_position<'a>(
        &self,
        state: &'a PortfolioState,
        position_id: Uuid,
    ) -> Result<&'a Position, CoreError> {
        state
            .positions
            .iter()
            .find(|p| p.id == position_id)
            .ok_or_else(|| CoreError::not_found("position", position_id.to_string()))
    }

    /// Positions linked to an account.
    pub fn positions_for_account<'a>(
        &self,
        state: &'a PortfolioState,
        account_id: Uuid,
    ) -> Vec<&'a Position> {
        state
            .positions
            .iter()
            .filter(|p| p.account_id == Some(account_id))
            .collect()
    }

    /// Validate a position before it enters the state.
    ///
    /// Rules:
    /// - Symbol must be non-empty
    /// - Amount must be finite and non-negative
    /// - Cost basis, if set, must be finite and non-negative
    /// - Purchase date can't be in the future (one day of timezone slack)
    /// - A linked account must exist
    pub(crate) fn validate_position(&self, state: &PortfolioState, position: &Position) -> Result<(), CoreError> {
        if position.symbol.trim().is_empty() {
            return Err(CoreError::ValidationError("Position symbol is empty".into()));
        }
        if !position.amount.is_finite() || position.amount < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Position amount must be non-negative (got {})",
                position.amount
            )));
        }
        if let Some(cost) = position.cost_basis {
            if !cost.is_finite() || cost < 0.0 {
                return Err(CoreError::ValidationError(format!(
                    "Cost basis must be non-negative (got {cost})"
                )));
            }
        }

        let today = Utc::now().date_naive();
        if let (Some(date), Some(tomorrow)) = (position.purchase_date, today.succ_opt()) {
            if date > tomorrow {
                return Err(CoreError::ValidationError(format!(
                    "Purchase date {date} is in the future"
                )));
            }
        }

        if let Some(account_id) = position.account_id {
            if !Self::account_exists(state, account_id) {
                return Err(CoreError::not_found("account", account_id.to_string()));
            }
        }
        Ok(())
    }

    fn index_of(state: &PortfolioState, position_id: Uuid) -> Result<usize, CoreError> {
        state
            .positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or_else(|| CoreError::not_found("position", position_id.to_string()))
    }

    // ── Accounts ────────────────────────────────────────────────────

    pub fn add_wallet(&self, state: &mut PortfolioState, wallet: Wallet) -> Result<Uuid, CoreError> {
        Self::require_name(&wallet.name)?;
        if wallet.address.trim().is_empty() {
            return Err(CoreError::ValidationError("Wallet address is empty".into()));
        }
        if state
            .wallets
            .iter()
            .any(|w| w.address.eq_ignore_ascii_case(wallet.address.trim()))
        {
            return Err(CoreError::ValidationError(format!(
                "Wallet {} is already tracked",
                wallet.address
            )));
        }
        let id = wallet.id;
        state.wallets.push(wallet);
        Ok(id)
    }

    pub fn add_cex_account(
        &self,
        state: &mut PortfolioState,
        account: CexAccount,
    ) -> Result<Uuid, CoreError> {
        Self::require_name(&account.name)?;
        if account.api_key.trim().is_empty() {
            return Err(CoreError::ValidationError("Exchange API key is empty".into()));
        }
        let id = account.id;
        state.cex_accounts.push(account);
        Ok(id)
    }

    pub fn add_cash_account(
        &self,
        state: &mut PortfolioState,
        account: CashAccount,
    ) -> Result<Uuid, CoreError> {
        Self::require_name(&account.name)?;
        if !is_currency_code(&account.currency) {
            return Err(CoreError::ValidationError(format!(
                "Invalid currency code '{}'",
                account.currency
            )));
        }
        let id = account.id;
        state.cash_accounts.push(account);
        Ok(id)
    }

    /// Remove a wallet, exchange or cash account.
    /// Refused while positions are still linked to it.
    pub fn remove_account(&self, state: &mut PortfolioState, account_id: Uuid) -> Result<(), CoreError> {
        if !Self::account_exists(state, account_id) {
            return Err(CoreError::not_found("account", account_id.to_string()));
        }
        let linked = self.positions_for_account(state, account_id).len();
        if linked > 0 {
            return Err(CoreError::ValidationError(format!(
                "Account still holds {linked} position(s); remove them first"
            )));
        }
        state.wallets.retain(|w| w.id != account_id);
        state.cex_accounts.retain(|c| c.id != account_id);
        state.cash_accounts.retain(|c| c.id != account_id);
        Ok(())
    }

    fn account_exists(state: &PortfolioState, account_id: Uuid) -> bool {
        state.wallets.iter().any(|w| w.id == account_id)
            || state.cex_accounts.iter().any(|c| c.id == account_id)
            || state.cash_accounts.iter().any(|c| c.id == account_id)
    }

    fn require_name(name: &str) -> Result<(), CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::ValidationError("Account name is empty".into()));
        }
        Ok(())
    }

    // ── Custom prices ───────────────────────────────────────────────

    /// Set (or replace) the custom price for a symbol.
    pub fn set_custom_price(
        &self,
        state: &mut PortfolioState,
        symbol: &str,
        price: f64,
        note: Option<String>,
    ) -> Result<(), CoreError> {
        if symbol.trim().is_empty() {
            return Err(CoreError::ValidationError("Symbol is empty".into()));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Custom price must be positive (got {price})"
            )));
        }
        let mut custom = CustomPrice::new(symbol, price);
        custom.note = note;
        state.custom_prices.insert(custom.symbol.clone(), custom);
        Ok(())
    }

    /// Drop a custom price; the market price applies again.
    pub fn remove_custom_price(&self, state: &mut PortfolioState, symbol: &str) -> Result<(), CoreError> {
        let key = symbol.trim().to_lowercase();
        state
            .custom_prices
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("custom price", symbol.trim()))
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}

/// Three ASCII letters, e.g. "USD".
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}
