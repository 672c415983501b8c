use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::CoreError;

use super::position::{AssetType, Position};

/// Kind of change a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Buy,
    Sell,
    UpdateCash,
    UpdatePosition,
    Remove,
    SetPrice,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::Buy,
        ActionType::Sell,
        ActionType::UpdateCash,
        ActionType::UpdatePosition,
        ActionType::Remove,
        ActionType::SetPrice,
    ];

    /// Tool name used on the parser boundary.
    pub fn tool_name(&self) -> &'static str {
        match self {
            ActionType::Buy => "buy_position",
            ActionType::Sell => "sell_position",
            ActionType::UpdateCash => "update_cash",
            ActionType::UpdatePosition => "update_position",
            ActionType::Remove => "remove_position",
            ActionType::SetPrice => "set_custom_price",
        }
    }

    pub fn from_tool_name(tool: &str) -> Option<Self> {
        let tool = tool.trim();
        Self::ALL.into_iter().find(|a| a.tool_name() == tool)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Buy => write!(f, "Buy"),
            ActionType::Sell => write!(f, "Sell"),
            ActionType::UpdateCash => write!(f, "Update cash"),
            ActionType::UpdatePosition => write!(f, "Update position"),
            ActionType::Remove => write!(f, "Remove"),
            ActionType::SetPrice => write!(f, "Set price"),
        }
    }
}

/// Raw parser output: a tool name plus loosely typed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    /// Argument name → JSON primitive (string, number, bool)
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Parser confidence, 0..=1
    #[serde(default = "full_confidence")]
    pub confidence: f64,
}

fn full_confidence() -> f64 {
    1.0
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: Map::new(),
            confidence: 1.0,
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// String argument; numbers are rendered, empty strings count as missing.
    pub fn arg_str(&self, key: &str) -> Option<String> {
        match self.args.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Numeric argument. Accepts JSON numbers and strings like "$1,250.50".
    pub fn arg_f64(&self, key: &str) -> Result<Option<f64>, CoreError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | '_' | ' '))
                    .collect();
                if cleaned.is_empty() {
                    return Ok(None);
                }
                cleaned.parse::<f64>().map(Some).map_err(|_| {
                    CoreError::ValidationError(format!("'{key}' is not a number: {s}"))
                })
            }
            Some(other) => Err(CoreError::ValidationError(format!(
                "'{key}' is not a number: {other}"
            ))),
        }
    }

    pub fn arg_bool(&self, key: &str) -> bool {
        match self.args.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
            _ => false,
        }
    }
}

/// Typed intent produced from a tool call or a menu selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPositionAction {
    pub action: ActionType,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub price_per_unit: Option<f64>,
    pub total_cost: Option<f64>,
    pub asset_type: Option<AssetType>,
    pub date: Option<NaiveDate>,
    /// Free-text account reference, matched by substring
    pub account_name: Option<String>,
    pub position_id: Option<Uuid>,
    /// Sell the full held amount
    #[serde(default)]
    pub sell_all: bool,
    pub confidence: f64,
    pub raw_text: Option<String>,
}

impl ParsedPositionAction {
    pub fn new(action: ActionType) -> Self {
        Self {
            action,
            symbol: None,
            name: None,
            amount: None,
            price_per_unit: None,
            total_cost: None,
            asset_type: None,
            date: None,
            account_name: None,
            position_id: None,
            sell_all: false,
            confidence: 1.0,
            raw_text: None,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.trim().to_uppercase());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_price(mut self, price_per_unit: f64) -> Self {
        self.price_per_unit = Some(price_per_unit);
        self
    }

    pub fn with_account(mut self, account_name: &str) -> Self {
        self.account_name = Some(account_name.to_string());
        self
    }

    pub fn with_position(mut self, position_id: Uuid) -> Self {
        self.position_id = Some(position_id);
        self
    }

    /// Type the loose arguments of a tool call.
    pub fn from_tool_call(call: &ToolCall) -> Result<Self, CoreError> {
        let action = ActionType::from_tool_name(&call.tool)
            .ok_or_else(|| CoreError::UnsupportedTool(call.tool.clone()))?;

        if let Some((key, _)) = call
            .args
            .iter()
            .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
        {
            return Err(CoreError::ValidationError(format!(
                "Argument '{key}' must be a string, number or boolean"
            )));
        }

        let asset_type = match call.arg_str("asset_type") {
            Some(raw) => Some(AssetType::parse_loose(&raw).ok_or_else(|| {
                CoreError::ValidationError(format!("Unknown asset type '{raw}'"))
            })?),
            None => None,
        };

        let date = match call.arg_str("date") {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                CoreError::ValidationError(format!("Invalid date '{raw}', expected YYYY-MM-DD"))
            })?),
            None => None,
        };

        let position_id = match call.arg_str("position_id") {
            Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| {
                CoreError::ValidationError(format!("Invalid position id '{raw}'"))
            })?),
            None => None,
        };

        Ok(Self {
            action,
            symbol: call.arg_str("symbol").map(|s| s.to_uppercase()),
            name: call.arg_str("name"),
            amount: call.arg_f64("amount")?,
            price_per_unit: call.arg_f64("price")?,
            total_cost: call.arg_f64("total_cost")?,
            asset_type,
            date,
            account_name: call.arg_str("account"),
            position_id,
            sell_all: call.arg_bool("sell_all"),
            confidence: call.confidence,
            raw_text: call.arg_str("raw_text"),
        })
    }
}

/// One before/after line of a preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub label: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FieldChange {
    pub fn new(label: &str, before: Option<String>, after: Option<String>) -> Self {
        Self {
            label: label.to_string(),
            before,
            after,
        }
    }
}

/// Fully validated state change, ready to apply.
///
/// `expected_amount` records the position amount the preview was computed
/// against, so executing a stale preview is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedMutation {
    AddPosition {
        position: Position,
    },
    UpdatePosition {
        position_id: Uuid,
        expected_amount: f64,
        amount: f64,
        cost_basis: Option<f64>,
        purchase_date: Option<NaiveDate>,
    },
    RemovePosition {
        position_id: Uuid,
        expected_amount: f64,
    },
    SetCustomPrice {
        symbol: String,
        price: f64,
    },
}

/// Human-readable description of a pending change awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationPreview {
    pub action: ParsedPositionAction,
    pub summary: String,
    pub changes: Vec<FieldChange>,
    pub mutation: ResolvedMutation,
}

/// Result of applying a confirmed preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub summary: String,
    pub position_id: Option<Uuid>,
}
