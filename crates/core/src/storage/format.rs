use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CoreError;
use crate::models::portfolio::PortfolioState;

/// Tag identifying a portfolio document.
pub const FORMAT_NAME: &str = "portfolio-tracker";

/// Current document version.
pub const CURRENT_VERSION: u16 = 1;

/// On-disk envelope around the portfolio state.
///
/// Layout:
/// ```text
/// {
///   "format": "portfolio-tracker",
///   "version": 1,
///   "saved_at": "2024-05-01T12:00:00Z",
///   "state": { "positions": [...], "prices": {...}, ... }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<S> {
    pub format: String,
    pub version: u16,
    pub saved_at: DateTime<Utc>,
    pub state: S,
}

/// Serialize a state into envelope bytes (pretty-printed JSON).
pub fn write_document(state: &PortfolioState, saved_at: DateTime<Utc>) -> Result<Vec<u8>, CoreError> {
    let envelope = Envelope {
        format: FORMAT_NAME.to_string(),
        version: CURRENT_VERSION,
        saved_at,
        state,
    };
    serde_json::to_vec_pretty(&envelope)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize portfolio: {e}")))
}

/// Parse and check the envelope, then decode the state.
///
/// The header is checked before the state is decoded, so a foreign or
/// newer document fails with a format/version error rather than a
/// field-level one.
pub fn read_document(data: &[u8]) -> Result<(Envelope<()>, PortfolioState), CoreError> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(CoreError::InvalidFileFormat("Document is empty".into()));
    }

    let raw: Envelope<Value> = serde_json::from_slice(data).map_err(|e| {
        CoreError::InvalidFileFormat(format!("Not a portfolio document: {e}"))
    })?;

    if raw.format != FORMAT_NAME {
        return Err(CoreError::InvalidFileFormat(format!(
            "Unexpected document format '{}'",
            raw.format
        )));
    }
    if raw.version == 0 || raw.version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(raw.version));
    }

    let state: PortfolioState = serde_json::from_value(raw.state)
        .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize portfolio: {e}")))?;

    let header = Envelope {
        format: raw.format,
        version: raw.version,
        saved_at: raw.saved_at,
        state: (),
    };
    Ok((header, state))
}
