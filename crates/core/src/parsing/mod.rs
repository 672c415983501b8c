pub mod rule_based;
pub mod traits;

use crate::errors::CoreError;
use crate::models::action::ToolCall;

/// Decode a tool call emitted as JSON by an external parser.
///
/// Accepts `{"tool": ..., "args": {...}, "confidence": ...}`, optionally
/// wrapped in a fenced code block.
pub fn decode_tool_call(raw: &str) -> Result<ToolCall, CoreError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    let call: ToolCall = serde_json::from_str(body)?;
    if call.tool.trim().is_empty() {
        return Err(CoreError::ValidationError("Tool call has no tool name".into()));
    }
    let confidence = call.confidence;
    Ok(call.with_confidence(confidence))
}
