use chrono::Utc;
use tracing::{debug, info};

use crate::errors::CoreError;
use crate::models::portfolio::PortfolioState;

use super::format;

/// High-level storage operations: save/load the portfolio state to/from
/// JSON document bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// Serialize the state into document bytes (portable, platform-independent).
    ///
    /// Flow: PortfolioState → envelope { format, version, saved_at } → JSON bytes
    pub fn save_to_bytes(state: &PortfolioState) -> Result<Vec<u8>, CoreError> {
        let bytes = format::write_document(state, Utc::now())?;
        debug!(bytes = bytes.len(), positions = state.positions.len(), "portfolio serialized");
        Ok(bytes)
    }

    /// Decode the state from document bytes.
    ///
    /// Flow: JSON bytes → check format tag and version → PortfolioState
    pub fn load_from_bytes(data: &[u8]) -> Result<PortfolioState, CoreError> {
        let (header, state) = format::read_document(data)?;
        debug!(
            version = header.version,
            saved_at = %header.saved_at,
            positions = state.positions.len(),
            "portfolio decoded"
        );
        Ok(state)
    }

    /// Save the state to a file on disk (native only).
    ///
    /// Writes to a sibling temp file first and renames it into place, so an
    /// interrupted save never truncates the previous document.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(state: &PortfolioState, path: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(state)?;
        let tmp = format!("{path}.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        info!(path, "portfolio saved");
        Ok(())
    }

    /// Load the state from a file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<PortfolioState, CoreError> {
        let bytes = std::fs::read(path)?;
        let state = Self::load_from_bytes(&bytes)?;
        info!(path, positions = state.positions.len(), "portfolio loaded");
        Ok(state)
    }
}
