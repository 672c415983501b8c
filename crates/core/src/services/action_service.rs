use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::action::{
    ActionType, ExecutionReport, FieldChange, MutationPreview, ParsedPositionAction,
    ResolvedMutation, ToolCall,
};
use crate::models::portfolio::PortfolioState;
use crate::models::position::{AssetType, Position};

use super::category_service::CategoryService;
use super::portfolio_service::PortfolioService;
use super::valuation_service::ValuationService;

/// Amounts closer than this are treated as equal (sell-all, stale checks).
const AMOUNT_EPSILON: f64 = 1e-9;

/// Which kind of account a free-text name resolved to.
#[derive(Debug, Clone, PartialEq)]
enum AccountRef {
    Wallet { id: Uuid, name: String },
    Exchange { id: Uuid, name: String },
    Cash { id: Uuid, name: String, currency: String },
}

impl AccountRef {
    fn id(&self) -> Uuid {
        match self {
            AccountRef::Wallet { id, .. }
            | AccountRef::Exchange { id, .. }
            | AccountRef::Cash { id, .. } => *id,
        }
    }

    fn name(&self) -> &str {
        match self {
            AccountRef::Wallet { name, .. }
            | AccountRef::Exchange { name, .. }
            | AccountRef::Cash { name, .. } => name,
        }
    }
}

/// Turns parsed intents into validated previews, and confirmed previews into
/// state changes.
///
/// Preview never touches state. Execute re-checks the preview against the
/// current state and then applies it in a single step, so a failed action
/// leaves the portfolio exactly as it was.
pub struct ActionService {
    category_service: CategoryService,
    valuation_service: ValuationService,
    portfolio_service: PortfolioService,
}

impl ActionService {
    pub fn new() -> Self {
        Self {
            category_service: CategoryService::new(),
            valuation_service: ValuationService::new(),
            portfolio_service: PortfolioService::new(),
        }
    }

    /// Type a raw tool call and preview it.
    pub fn preview_tool_call(
        &self,
        state: &PortfolioState,
        call: &ToolCall,
    ) -> Result<MutationPreview, CoreError> {
        let action = ParsedPositionAction::from_tool_call(call)?;
        self.preview(state, action)
    }

    /// Validate an intent against the state and describe the change.
    pub fn preview(
        &self,
        state: &PortfolioState,
        action: ParsedPositionAction,
    ) -> Result<MutationPreview, CoreError> {
        debug!(action = %action.action, symbol = ?action.symbol, "previewing action");
        match action.action {
            ActionType::Buy => self.preview_buy(state, action),
            ActionType::Sell => self.preview_sell(state, action),
            ActionType::UpdateCash => self.preview_update_cash(state, action),
            ActionType::UpdatePosition => self.preview_update_position(state, action),
            ActionType::Remove => self.preview_remove(state, action),
            ActionType::SetPrice => self.preview_set_price(state, action),
        }
    }

    /// Apply a confirmed preview.
    pub fn execute(
        &self,
        state: &mut PortfolioState,
        preview: &MutationPreview,
    ) -> Result<ExecutionReport, CoreError> {
        let position_id = match &preview.mutation {
            ResolvedMutation::AddPosition { position } => {
                if state.positions.iter().any(|p| p.id == position.id) {
                    return Err(CoreError::ValidationError(
                        "This preview was already executed".into(),
                    ));
                }
                if let Some(existing) = Self::conflicting_position(state, position) {
                    return Err(CoreError::ValidationError(format!(
                        "{} changed since this preview was made (now {}); preview again",
                        existing.symbol,
                        fmt_amount(existing.amount)
                    )));
                }
                self.portfolio_service.validate_position(state, position)?;
                state.positions.push(position.clone());
                Some(position.id)
            }
            ResolvedMutation::UpdatePosition {
                position_id,
                expected_amount,
                amount,
                cost_basis,
                purchase_date,
            } => {
                let idx = Self::checked_index(state, *position_id, *expected_amount)?;
                let mut updated = state.positions[idx].clone();
                updated.amount = *amount;
                updated.cost_basis = *cost_basis;
                updated.purchase_date = *purchase_date;
                self.portfolio_service.validate_position(state, &updated)?;
                state.positions[idx] = updated;
                Some(*position_id)
            }
            ResolvedMutation::RemovePosition {
                position_id,
                expected_amount,
            } => {
                let idx = Self::checked_index(state, *position_id, *expected_amount)?;
                state.positions.remove(idx);
                Some(*position_id)
            }
            ResolvedMutation::SetCustomPrice { symbol, price } => {
                let note = state
                    .custom_prices
                    .get(&symbol.trim().to_lowercase())
                    .and_then(|c| c.note.clone());
                self.portfolio_service
                    .set_custom_price(state, symbol, *price, note)?;
                None
            }
        };

        info!(action = %preview.action.action, summary = %preview.summary, "action executed");
        Ok(ExecutionReport {
            summary: preview.summary.clone(),
            position_id,
        })
    }

    // ── Previews ────────────────────────────────────────────────────

    fn preview_buy(
        &self,
        state: &PortfolioState,
        action: ParsedPositionAction,
    ) -> Result<MutationPreview, CoreError> {
        let currency = state.settings.base_currency.clone();
        let symbol = Self::require_symbol(&action)?;
        let amount = Self::require_positive("amount", action.amount)?;
        let unit_price = Self::unit_price(&action, amount)?;
        let total_cost = unit_price.map(|p| p * amount);

        let account = match action.account_name.as_deref() {
            Some(name) => Some(Self::resolve_account(state, name, false)?),
            None => None,
        };
        let account_id = account.as_ref().map(AccountRef::id);

        let existing: Vec<&Position> = state
            .positions
            .iter()
            .filter(|p| !p.is_debt && p.symbol.eq_ignore_ascii_case(&symbol))
            .filter(|p| p.account_id == account_id)
            .collect();

        let mut summary = format!("Buy {} {}", fmt_amount(amount), symbol);
        if let (Some(price), Some(total)) = (unit_price, total_cost) {
            summary.push_str(&format!(
                " at {} ({} total)",
                fmt_money(price, &currency),
                fmt_money(total, &currency)
            ));
        }
        if let Some(acc) = &account {
            summary.push_str(&format!(" in {}", acc.name()));
        }

        match existing.as_slice() {
            [] => {
                let asset_type = action
                    .asset_type
                    .unwrap_or_else(|| self.category_service.infer_asset_type(&symbol));
                let name = action.name.clone().unwrap_or_else(|| symbol.clone());
                let mut position = Position::new(asset_type, &symbol, name, amount);
                position.cost_basis = total_cost;
                position.purchase_date = action.date;
                position.account_id = account_id;

                let mut changes = vec![
                    FieldChange::new("Position", None, Some(format!("new {asset_type} position"))),
                    FieldChange::new("Amount", None, Some(format!("{} {symbol}", fmt_amount(amount)))),
                ];
                if let Some(total) = total_cost {
                    changes.push(FieldChange::new(
                        "Cost basis",
                        None,
                        Some(fmt_money(total, &currency)),
                    ));
                }
                Ok(MutationPreview {
                    action,
                    summary,
                    changes,
                    mutation: ResolvedMutation::AddPosition { position },
                })
            }
            [position] => {
                let new_amount = position.amount + amount;
                // Unknown + known cost stays unknown
                let new_cost = match (position.cost_basis, total_cost) {
                    (Some(old), Some(added)) => Some(old + added),
                    (None, Some(added)) if position.amount <= AMOUNT_EPSILON => Some(added),
                    _ => None,
                };
                let mut changes = vec![FieldChange::new(
                    "Amount",
                    Some(format!("{} {symbol}", fmt_amount(position.amount))),
                    Some(format!("{} {symbol}", fmt_amount(new_amount))),
                )];
                if position.cost_basis != new_cost {
                    changes.push(FieldChange::new(
                        "Cost basis",
                        position.cost_basis.map(|c| fmt_money(c, &currency)),
                        new_cost.map(|c| fmt_money(c, &currency)),
                    ));
                }
                Ok(MutationPreview {
                    mutation: ResolvedMutation::UpdatePosition {
                        position_id: position.id,
                        expected_amount: position.amount,
                        amount: new_amount,
                        cost_basis: new_cost,
                        purchase_date: position.purchase_date.or(action.date),
                    },
                    action,
                    summary,
                    changes,
                })
            }
            many => Err(CoreError::Ambiguous {
                query: symbol.clone(),
                candidates: many.iter().map(|p| Self::position_label(state, p)).collect(),
            }),
        }
    }

    fn preview_sell(
        &self,
        state: &PortfolioState,
        action: ParsedPositionAction,
    ) -> Result<MutationPreview, CoreError> {
        let currency = state.settings.base_currency.clone();
        let position = self.resolve_position(state, &action, false)?;
        let symbol = position.symbol.clone();

        let amount = if action.sell_all {
            position.amount
        } else {
            Self::require_positive("amount", action.amount)?
        };
        if amount > position.amount + AMOUNT_EPSILON {
            return Err(CoreError::ValidationError(format!(
                "Cannot sell {} {}: only {} held",
                fmt_amount(amount),
                symbol,
                fmt_amount(position.amount)
            )));
        }
        let unit_price = Self::unit_price(&action, amount)?;

        let remaining = position.amount - amount;
        let mut changes = vec![FieldChange::new(
            "Amount",
            Some(format!("{} {symbol}", fmt_amount(position.amount))),
            Some(format!("{} {symbol}", fmt_amount(remaining.max(0.0)))),
        )];
        let mut summary = format!("Sell {} {}", fmt_amount(amount), symbol);
        if let Some(price) = unit_price {
            summary.push_str(&format!(" at {}", fmt_money(price, &currency)));
            changes.push(FieldChange::new(
                "Proceeds",
                None,
                Some(fmt_money(price * amount, &currency)),
            ));
        }

        let mutation = if remaining <= AMOUNT_EPSILON {
            changes.push(FieldChange::new("Position", Some("open".into()), Some("closed".into())));
            ResolvedMutation::RemovePosition {
                position_id: position.id,
                expected_amount: position.amount,
            }
        } else {
            // Cost basis shrinks pro rata with the amount sold
            let cost_basis = position
                .cost_basis
                .map(|c| c * remaining / position.amount);
            if let (Some(before), Some(after)) = (position.cost_basis, cost_basis) {
                changes.push(FieldChange::new(
                    "Cost basis",
                    Some(fmt_money(before, &currency)),
                    Some(fmt_money(after, &currency)),
                ));
            }
            ResolvedMutation::UpdatePosition {
                position_id: position.id,
                expected_amount: position.amount,
                amount: remaining,
                cost_basis,
                purchase_date: position.purchase_date,
            }
        };

        Ok(MutationPreview {
            action,
            summary,
            changes,
            mutation,
        })
    }

    fn preview_update_cash(
        &self,
        state: &PortfolioState,
        action: ParsedPositionAction,
    ) -> Result<MutationPreview, CoreError> {
        let account_name = action.account_name.as_deref().ok_or_else(|| {
            CoreError::ValidationError("A cash account name is required".into())
        })?;
        let balance = action
            .amount
            .ok_or_else(|| CoreError::ValidationError("A cash balance is required".into()))?;
        if !balance.is_finite() {
            return Err(CoreError::ValidationError(format!("Invalid cash balance {balance}")));
        }
        if balance < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Cash balance cannot be negative (got {})",
                fmt_amount(balance)
            )));
        }

        let account = Self::resolve_account(state, account_name, true)?;
        let (account_id, account_name, account_currency) = match &account {
            AccountRef::Cash { id, name, currency } => (*id, name.clone(), currency.clone()),
            // resolve_account with cash_only never yields other kinds
            other => {
                return Err(CoreError::not_found("cash account", other.name()));
            }
        };

        let existing = state
            .positions
            .iter()
            .find(|p| p.asset_type == AssetType::Cash && p.account_id == Some(account_id));

        let summary = format!(
            "Set {} balance to {}",
            account_name,
            fmt_money(balance, &account_currency)
        );

        let (mutation, before) = match existing {
            Some(position) => (
                ResolvedMutation::UpdatePosition {
                    position_id: position.id,
                    expected_amount: position.amount,
                    amount: balance,
                    cost_basis: position.cost_basis,
                    purchase_date: position.purchase_date,
                },
                Some(fmt_money(position.amount, &account_currency)),
            ),
            None => {
                let position = Position::cash(&account_currency, &account_name, balance)
                    .with_account(account_id);
                (ResolvedMutation::AddPosition { position }, None)
            }
        };

        Ok(MutationPreview {
            action,
            summary,
            changes: vec![FieldChange::new(
                "Balance",
                before,
                Some(fmt_money(balance, &account_currency)),
            )],
            mutation,
        })
    }

    fn preview_update_position(
        &self,
        state: &PortfolioState,
        action: ParsedPositionAction,
    ) -> Result<MutationPreview, CoreError> {
        let currency = state.settings.base_currency.clone();
        let position = self.resolve_position(state, &action, true)?;

        if action.amount.is_none()
            && action.total_cost.is_none()
            && action.price_per_unit.is_none()
            && action.date.is_none()
        {
            return Err(CoreError::ValidationError(format!(
                "No fields to update for {}",
                position.symbol
            )));
        }

        let amount = match action.amount {
            Some(a) => Self::require_positive("amount", Some(a))?,
            None => position.amount,
        };
        let cost_basis = match (action.total_cost, action.price_per_unit) {
            (Some(total), _) => Some(Self::require_positive("total cost", Some(total))?),
            (None, Some(price)) => Some(Self::require_positive("price", Some(price))? * amount),
            (None, None) => position.cost_basis,
        };
        let purchase_date = action.date.or(position.purchase_date);

        let symbol = &position.symbol;
        let mut changes = Vec::new();
        if (amount - position.amount).abs() > AMOUNT_EPSILON {
            changes.push(FieldChange::new(
                "Amount",
                Some(format!("{} {symbol}", fmt_amount(position.amount))),
                Some(format!("{} {symbol}", fmt_amount(amount))),
            ));
        }
        if cost_basis != position.cost_basis {
            changes.push(FieldChange::new(
                "Cost basis",
                position.cost_basis.map(|c| fmt_money(c, &currency)),
                cost_basis.map(|c| fmt_money(c, &currency)),
            ));
        }
        if purchase_date != position.purchase_date {
            changes.push(FieldChange::new(
                "Purchase date",
                position.purchase_date.map(|d| d.to_string()),
                purchase_date.map(|d| d.to_string()),
            ));
        }

        Ok(MutationPreview {
            summary: format!("Update {symbol} position"),
            changes,
            mutation: ResolvedMutation::UpdatePosition {
                position_id: position.id,
                expected_amount: position.amount,
                amount,
                cost_basis,
                purchase_date,
            },
            action,
        })
    }

    fn preview_remove(
        &self,
        state: &PortfolioState,
        action: ParsedPositionAction,
    ) -> Result<MutationPreview, CoreError> {
        let position = self.resolve_position(state, &action, true)?;
        let label = Self::position_label(state, position);
        Ok(MutationPreview {
            summary: format!("Remove {} position", position.symbol),
            changes: vec![FieldChange::new("Position", Some(label), None)],
            mutation: ResolvedMutation::RemovePosition {
                position_id: position.id,
                expected_amount: position.amount,
            },
            action,
        })
    }

    fn preview_set_price(
        &self,
        state: &PortfolioState,
        action: ParsedPositionAction,
    ) -> Result<MutationPreview, CoreError> {
        let currency = state.settings.base_currency.clone();
        let symbol = Self::require_symbol(&action)?;
        let price = Self::require_positive("price", action.price_per_unit)?;
        let before =
            self.valuation_service
                .effective_price(&symbol, &state.prices, &state.custom_prices);

        Ok(MutationPreview {
            summary: format!("Set {symbol} price to {}", fmt_money(price, &currency)),
            changes: vec![FieldChange::new(
                "Price",
                (before > 0.0).then(|| fmt_money(before, &currency)),
                Some(format!("{} (custom)", fmt_money(price, &currency))),
            )],
            mutation: ResolvedMutation::SetCustomPrice { symbol, price },
            action,
        })
    }

    // ── Resolution helpers ──────────────────────────────────────────

    fn require_symbol(action: &ParsedPositionAction) -> Result<String, CoreError> {
        action
            .symbol
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::ValidationError("A symbol is required".into()))
    }

    fn require_positive(field: &str, value: Option<f64>) -> Result<f64, CoreError> {
        match value {
            None => Err(CoreError::ValidationError(format!("{field} is required"))),
            Some(v) if !v.is_finite() || v <= 0.0 => Err(CoreError::ValidationError(format!(
                "{field} must be positive (got {v})"
            ))),
            Some(v) => Ok(v),
        }
    }

    /// Unit price from an explicit price or from total cost / amount.
    fn unit_price(action: &ParsedPositionAction, amount: f64) -> Result<Option<f64>, CoreError> {
        match (action.price_per_unit, action.total_cost) {
            (Some(p), _) => Self::require_positive("price", Some(p)).map(Some),
            (None, Some(total)) => {
                Self::require_positive("total cost", Some(total)).map(|t| Some(t / amount))
            }
            (None, None) => Ok(None),
        }
    }

    /// Match an account name (case-insensitive).
    ///
    /// An exact name match wins; otherwise substring matches are collected
    /// and anything but exactly one is an error.
    fn resolve_account(
        state: &PortfolioState,
        query: &str,
        cash_only: bool,
    ) -> Result<AccountRef, CoreError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(CoreError::ValidationError("Account name is empty".into()));
        }

        let mut accounts: Vec<AccountRef> = state
            .cash_accounts
            .iter()
            .map(|a| AccountRef::Cash {
                id: a.id,
                name: a.name.clone(),
                currency: a.currency.clone(),
            })
            .collect();
        if !cash_only {
            accounts.extend(state.wallets.iter().map(|w| AccountRef::Wallet {
                id: w.id,
                name: w.name.clone(),
            }));
            accounts.extend(state.cex_accounts.iter().map(|c| AccountRef::Exchange {
                id: c.id,
                name: c.name.clone(),
            }));
        }

        let exact: Vec<&AccountRef> = accounts
            .iter()
            .filter(|a| a.name().to_lowercase() == needle)
            .collect();
        if let [only] = exact.as_slice() {
            return Ok((*only).clone());
        }

        let partial: Vec<&AccountRef> = accounts
            .iter()
            .filter(|a| a.name().to_lowercase().contains(&needle))
            .collect();
        match partial.as_slice() {
            [] => Err(CoreError::not_found(
                if cash_only { "cash account" } else { "account" },
                query.trim(),
            )),
            [only] => Ok((*only).clone()),
            many => Err(CoreError::Ambiguous {
                query: query.trim().to_string(),
                candidates: many.iter().map(|a| a.name().to_string()).collect(),
            }),
        }
    }

    /// Find the single position an action refers to: by id, else by symbol
    /// (narrowed by account when one is named).
    fn resolve_position<'a>(
        &self,
        state: &'a PortfolioState,
        action: &ParsedPositionAction,
        include_debt: bool,
    ) -> Result<&'a Position, CoreError> {
        if let Some(id) = action.position_id {
            return state
                .positions
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| CoreError::not_found("position", id.to_string()));
        }

        let symbol = Self::require_symbol(action)?;
        let account_id = match action.account_name.as_deref() {
            Some(name) => Some(Self::resolve_account(state, name, false)?.id()),
            None => None,
        };

        let matches: Vec<&Position> = state
            .positions
            .iter()
            .filter(|p| p.symbol.eq_ignore_ascii_case(&symbol))
            .filter(|p| include_debt || !p.is_debt)
            .filter(|p| account_id.is_none() || p.account_id == account_id)
            .collect();

        match matches.as_slice() {
            [] => Err(CoreError::not_found("position", symbol)),
            [only] => Ok(*only),
            many => Err(CoreError::Ambiguous {
                query: symbol,
                candidates: many.iter().map(|p| Self::position_label(state, p)).collect(),
            }),
        }
    }

    /// "0.5 BTC in Ledger (1a2b3c4d)"
    fn position_label(state: &PortfolioState, position: &Position) -> String {
        let location = position
            .account_id
            .and_then(|id| {
                state
                    .wallets
                    .iter()
                    .find(|w| w.id == id)
                    .map(|w| w.name.clone())
                    .or_else(|| state.cex_accounts.iter().find(|c| c.id == id).map(|c| c.name.clone()))
                    .or_else(|| state.cash_accounts.iter().find(|c| c.id == id).map(|c| c.name.clone()))
            })
            .or_else(|| position.protocol.clone())
            .unwrap_or_else(|| "manual".to_string());
        let short_id: String = position.id.to_string().chars().take(8).collect();
        let debt = if position.is_debt { " debt" } else { "" };
        format!(
            "{} {}{} in {} ({})",
            fmt_amount(position.amount),
            position.symbol,
            debt,
            location,
            short_id
        )
    }

    /// A position a new-position preview would now duplicate: an owned
    /// same-symbol holding in the same account, or the cash position
    /// already backing the account.
    fn conflicting_position<'a>(state: &'a PortfolioState, new: &Position) -> Option<&'a Position> {
        if new.is_debt {
            return None;
        }
        state.positions.iter().find(|p| {
            let same_holding = !p.is_debt
                && p.account_id == new.account_id
                && p.symbol.eq_ignore_ascii_case(&new.symbol);
            let same_cash_account = new.asset_type == AssetType::Cash
                && new.account_id.is_some()
                && p.asset_type == AssetType::Cash
                && p.account_id == new.account_id;
            same_holding || same_cash_account
        })
    }

    /// Index of a position whose amount still matches what the preview saw.
    fn checked_index(
        state: &PortfolioState,
        position_id: Uuid,
        expected_amount: f64,
    ) -> Result<usize, CoreError> {
        let idx = state
            .positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or_else(|| CoreError::not_found("position", position_id.to_string()))?;
        let current = state.positions[idx].amount;
        let tolerance = AMOUNT_EPSILON * expected_amount.abs().max(1.0);
        if (current - expected_amount).abs() > tolerance {
            return Err(CoreError::ValidationError(format!(
                "{} changed since this preview was made (now {}); preview again",
                state.positions[idx].symbol,
                fmt_amount(current)
            )));
        }
        Ok(idx)
    }
}

impl Default for ActionService {
    fn default() -> Self {
        Self::new()
    }
}

/// Up to 8 decimals, trailing zeros trimmed: 0.50000000 → "0.5".
pub fn fmt_amount(value: f64) -> String {
    let s = format!("{value:.8}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Two decimals with thousands separators: 1234.5 → "1,234.50 USD".
pub fn fmt_money(value: f64, currency: &str) -> String {
    let s = format!("{:.2}", value.abs());
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part} {currency}")
}
