use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::action::ToolCall;

/// Turns a free-text command into a tool call.
///
/// An LLM-backed parser lives outside this crate and plugs in here; the
/// built-in `RuleBasedParser` covers the common phrasings without one.
/// Parsers only describe intent. Validation happens in `ActionService`.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ActionParser: Send + Sync {
    /// Human-readable name of this parser (for logs).
    fn name(&self) -> &str;

    async fn parse(&self, text: &str) -> Result<ToolCall, CoreError>;
}
