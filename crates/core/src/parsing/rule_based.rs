use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use super::traits::ActionParser;
use crate::errors::CoreError;
use crate::models::action::{ActionType, ToolCall};
use crate::models::position::AssetType;

/// Words carrying no meaning for any command.
const FILLER: &[&str] = &[
    "of", "my", "the", "a", "an", "units", "unit", "coins", "tokens", "worth", "each", "per",
    "apiece", "total", "is", "=", "please", "account", "basis",
];

/// Prepositions that introduce an account name.
const ACCOUNT_MARKERS: &[&str] = &["in", "from", "to", "into", "via", "on"];

/// Words that end an account name.
const STOP_WORDS: &[&str] = &["at", "@", "for", "on", "price", "amount", "cost"];

const BASE_CONFIDENCE: f64 = 0.9;
const PENALTY_PER_UNKNOWN: f64 = 0.15;
const MIN_CONFIDENCE: f64 = 0.3;

/// Keyword parser for short imperative commands.
///
/// Understands phrasings such as:
/// - `buy 0.5 btc at 50000 in Ledger`
/// - `sold 10 shares of aapl @ $190 on 2024-03-01`
/// - `sell all eth from Binance`
/// - `update cash Revolut 5,000`
/// - `set price btc 60000`, `set btc price to 60k`
/// - `update eth amount 2 cost 4000`
/// - `remove doge`
///
/// Tokens it cannot place lower the confidence of the resulting call.
pub struct RuleBasedParser;

impl RuleBasedParser {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous entry point; `ActionParser::parse` delegates here.
    pub fn parse_command(&self, text: &str) -> Result<ToolCall, CoreError> {
        let tokens = tokenize(text);
        let Some((verb, rest)) = tokens.split_first() else {
            return Err(CoreError::ValidationError("Empty command".into()));
        };

        let call = match verb.to_lowercase().as_str() {
            "buy" | "bought" | "add" | "added" | "purchase" | "purchased" => {
                parse_trade(ActionType::Buy, rest)
            }
            "sell" | "sold" => parse_trade(ActionType::Sell, rest),
            "remove" | "delete" | "drop" => parse_remove(rest),
            "cash" | "balance" => parse_cash(rest),
            "price" => parse_price(rest),
            "set" | "update" | "change" => parse_update(rest),
            _ => None,
        };

        let call = call.ok_or_else(|| {
            CoreError::ValidationError(format!("Could not understand '{}'", text.trim()))
        })?;
        debug!(tool = %call.tool, confidence = call.confidence, "command parsed");
        Ok(call.with_arg("raw_text", text.trim()))
    }
}

impl Default for RuleBasedParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ActionParser for RuleBasedParser {
    fn name(&self) -> &str {
        "rule-based"
    }

    async fn parse(&self, text: &str) -> Result<ToolCall, CoreError> {
        self.parse_command(text)
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// buy / sell: amount, symbol, optional price, total, date and account.
fn parse_trade(action: ActionType, rest: &[String]) -> Option<ToolCall> {
    let mut call = ToolCall::new(action.tool_name());
    let mut amount = None;
    let mut symbol: Option<String> = None;
    let mut sell_all = false;
    let mut unknown = 0usize;

    let mut i = 0;
    while i < rest.len() {
        let token = &rest[i];
        let word = token.to_lowercase();
        match word.as_str() {
            "at" | "@" => {
                if let Some(price) = rest.get(i + 1).and_then(|t| parse_number(t)) {
                    call = call.with_arg("price", price);
                    i += 1;
                }
            }
            "for" => {
                if let Some(total) = rest.get(i + 1).and_then(|t| parse_number(t)) {
                    call = call.with_arg("total_cost", total);
                    i += 1;
                }
            }
            "all" | "everything" if action == ActionType::Sell => sell_all = true,
            w if ACCOUNT_MARKERS.contains(&w) => {
                if let Some(date) = rest.get(i + 1).and_then(|t| parse_date(t)) {
                    call = call.with_arg("date", date.to_string());
                    i += 1;
                } else {
                    let (account, consumed) = take_account(&rest[i + 1..]);
                    if let Some(account) = account {
                        call = call.with_arg("account", account);
                    }
                    i += consumed;
                }
            }
            w if FILLER.contains(&w) => {}
            _ => {
                if let Some(date) = parse_date(token) {
                    call = call.with_arg("date", date.to_string());
                } else if let Some(n) = parse_number(token) {
                    if amount.is_none() {
                        amount = Some(n);
                    } else if !call.args.contains_key("price") {
                        // "buy 2 eth 3000": a trailing bare number is the price
                        call = call.with_arg("price", n);
                    } else {
                        unknown += 1;
                    }
                } else if let Some(asset_type) = asset_type_word(&word) {
                    call = call.with_arg("asset_type", asset_type_arg(asset_type));
                } else if symbol.is_none() {
                    symbol = parse_symbol(token);
                    if symbol.is_none() {
                        unknown += 1;
                    }
                } else {
                    unknown += 1;
                }
            }
        }
        i += 1;
    }

    let symbol = symbol?;
    call = call.with_arg("symbol", symbol);
    if let Some(amount) = amount {
        call = call.with_arg("amount", amount);
    }
    if sell_all {
        call = call.with_arg("sell_all", true);
    }
    let missing_amount = amount.is_none() && !sell_all;
    Some(call.with_confidence(confidence(unknown, missing_amount)))
}

/// remove <symbol | position id> [from <account>]
fn parse_remove(rest: &[String]) -> Option<ToolCall> {
    let mut call = ToolCall::new(ActionType::Remove.tool_name());
    let mut found = false;
    let mut unknown = 0usize;

    let mut i = 0;
    while i < rest.len() {
        let token = &rest[i];
        let word = token.to_lowercase();
        match word.as_str() {
            w if ACCOUNT_MARKERS.contains(&w) => {
                let (account, consumed) = take_account(&rest[i + 1..]);
                if let Some(account) = account {
                    call = call.with_arg("account", account);
                }
                i += consumed;
            }
            "position" | "holding" => {}
            w if FILLER.contains(&w) => {}
            _ if !found => {
                if let Ok(id) = Uuid::parse_str(token) {
                    call = call.with_arg("position_id", id.to_string());
                    found = true;
                } else if let Some(symbol) = parse_symbol(token) {
                    call = call.with_arg("symbol", symbol);
                    found = true;
                } else {
                    unknown += 1;
                }
            }
            _ => unknown += 1,
        }
        i += 1;
    }

    if !found {
        return None;
    }
    Some(call.with_confidence(confidence(unknown, false)))
}

/// cash <account words> [to] <balance>
fn parse_cash(rest: &[String]) -> Option<ToolCall> {
    let mut call = ToolCall::new(ActionType::UpdateCash.tool_name());
    let mut words = Vec::new();
    let mut balance = None;

    for token in rest {
        let word = token.to_lowercase();
        if matches!(word.as_str(), "cash" | "balance" | "to" | "in" | "at")
            || FILLER.contains(&word.as_str())
        {
            continue;
        }
        match parse_number(token) {
            // Last number wins: "set cash in N26 2 to 300"
            Some(n) => balance = Some(n),
            None => words.push(token.as_str()),
        }
    }

    if words.is_empty() {
        return None;
    }
    call = call.with_arg("account", words.join(" "));
    let missing = balance.is_none();
    if let Some(balance) = balance {
        call = call.with_arg("amount", balance);
    }
    Some(call.with_confidence(confidence(0, missing)))
}

/// price <symbol> [to] <price>
fn parse_price(rest: &[String]) -> Option<ToolCall> {
    let mut call = ToolCall::new(ActionType::SetPrice.tool_name());
    let mut symbol = None;
    let mut price = None;
    let mut unknown = 0usize;

    for token in rest {
        let word = token.to_lowercase();
        if matches!(word.as_str(), "price" | "to" | "at" | "@" | "custom")
            || FILLER.contains(&word.as_str())
        {
            continue;
        }
        if let Some(n) = parse_number(token) {
            if price.is_none() {
                price = Some(n);
            } else {
                unknown += 1;
            }
        } else if symbol.is_none() {
            symbol = parse_symbol(token);
        } else {
            unknown += 1;
        }
    }

    call = call.with_arg("symbol", symbol?);
    let missing = price.is_none();
    if let Some(price) = price {
        call = call.with_arg("price", price);
    }
    Some(call.with_confidence(confidence(unknown, missing)))
}

/// set / update: dispatches to cash, price or a position field update.
fn parse_update(rest: &[String]) -> Option<ToolCall> {
    let has = |needle: &str| rest.iter().any(|t| t.eq_ignore_ascii_case(needle));
    if has("cash") || has("balance") {
        return parse_cash(rest);
    }
    if has("price") {
        return parse_price(rest);
    }
    parse_position_update(rest)
}

/// update <symbol> [amount|to] N [cost] N [date|on] YYYY-MM-DD [in <account>]
fn parse_position_update(rest: &[String]) -> Option<ToolCall> {
    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        Amount,
        Cost,
        Date,
    }

    let mut call = ToolCall::new(ActionType::UpdatePosition.tool_name());
    let mut symbol = None;
    let mut pending: Option<Field> = None;
    let mut unknown = 0usize;

    let mut i = 0;
    while i < rest.len() {
        let token = &rest[i];
        let word = token.to_lowercase();
        match word.as_str() {
            "amount" | "quantity" | "qty" | "to" => pending = Some(Field::Amount),
            "cost" | "cost_basis" | "invested" => pending = Some(Field::Cost),
            "date" | "on" | "bought" | "purchased" => pending = Some(Field::Date),
            "in" | "from" | "via" => {
                let (account, consumed) = take_account(&rest[i + 1..]);
                if let Some(account) = account {
                    call = call.with_arg("account", account);
                }
                i += consumed;
            }
            w if FILLER.contains(&w) => {}
            _ => {
                if let Some(date) = parse_date(token) {
                    call = call.with_arg("date", date.to_string());
                    pending = None;
                } else if let Some(n) = parse_number(token) {
                    match pending.take() {
                        Some(Field::Cost) => call = call.with_arg("total_cost", n),
                        Some(Field::Amount) | None if !call.args.contains_key("amount") => {
                            call = call.with_arg("amount", n)
                        }
                        _ => unknown += 1,
                    }
                } else if symbol.is_none() {
                    symbol = parse_symbol(token);
                    if symbol.is_none() {
                        unknown += 1;
                    }
                } else {
                    unknown += 1;
                }
            }
        }
        i += 1;
    }

    call = call.with_arg("symbol", symbol?);
    Some(call.with_confidence(confidence(unknown, false)))
}

// ── Token helpers ───────────────────────────────────────────────────

/// Split on whitespace, peel a leading `@` off prices, strip trailing
/// punctuation.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split_whitespace() {
        let mut token = raw.trim_end_matches(|c: char| matches!(c, ',' | ';' | '!' | '?'));
        if token.len() > 1 && token.ends_with('.') {
            token = &token[..token.len() - 1];
        }
        if let Some(rest) = token.strip_prefix('@').filter(|r| !r.is_empty()) {
            tokens.push("@".to_string());
            tokens.push(rest.to_string());
        } else if !token.is_empty() {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Collect an account name up to the next stop word, number or date.
/// Returns the name and how many tokens it used.
fn take_account(tokens: &[String]) -> (Option<String>, usize) {
    let mut words = Vec::new();
    for token in tokens {
        let word = token.to_lowercase();
        if STOP_WORDS.contains(&word.as_str())
            || parse_number(token).is_some()
            || parse_date(token).is_some()
        {
            break;
        }
        words.push(token.as_str());
    }
    let consumed = words.len();
    let name = (!words.is_empty()).then(|| words.join(" "));
    (name, consumed)
}

/// "$50,000" → 50000, "60k" → 60000, "1.2m" → 1200000, "-5" → -5.
fn parse_number(token: &str) -> Option<f64> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let body = body.strip_prefix('$').unwrap_or(body);
    let cleaned: String = body.chars().filter(|c| !matches!(c, ',' | '_')).collect();
    let lower = cleaned.to_lowercase();
    let (digits, multiplier) = if let Some(d) = lower.strip_suffix('k') {
        (d, 1_000.0)
    } else if let Some(d) = lower.strip_suffix('m') {
        (d, 1_000_000.0)
    } else {
        (lower.as_str(), 1.0)
    };
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value = digits.parse::<f64>().ok()? * multiplier;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

/// Ticker-shaped token, uppercased. Accepts cashtags (`$BTC`) and dotted
/// tickers (`BRK.B`).
fn parse_symbol(token: &str) -> Option<String> {
    let token = token.strip_prefix('$').unwrap_or(token);
    let valid = !token.is_empty()
        && token.len() <= 12
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'));
    valid.then(|| token.to_uppercase())
}

/// Asset-type hints that may appear in a trade ("10 shares of aapl").
fn asset_type_word(word: &str) -> Option<AssetType> {
    match word {
        "shares" | "share" | "stock" | "stocks" | "etf" | "crypto" => AssetType::parse_loose(word),
        _ => None,
    }
}

fn asset_type_arg(asset_type: AssetType) -> &'static str {
    match asset_type {
        AssetType::Crypto => "crypto",
        AssetType::Stock => "stock",
        AssetType::Etf => "etf",
        AssetType::Cash => "cash",
        AssetType::Manual => "manual",
    }
}

fn confidence(unknown: usize, missing_required: bool) -> f64 {
    let mut score = BASE_CONFIDENCE - PENALTY_PER_UNKNOWN * unknown as f64;
    if missing_required {
        score -= 0.3;
    }
    score.max(MIN_CONFIDENCE)
}
