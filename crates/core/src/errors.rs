use thiserror::Error;

/// Unified error type for the entire portfolio-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
///
/// Action previews and executions hand these back as values, so a caller
/// can render them directly without any unwinding.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage / File ──────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── File I/O (native only) ──────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No price feed available for asset type: {0}")]
    NoProvider(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("No {kind} found matching '{query}'")]
    NotFound { kind: String, query: String },

    #[error("'{query}' is ambiguous; candidates: {}", .candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },

    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),
}

impl CoreError {
    /// Shorthand for a not-found error of a given record kind.
    pub fn not_found(kind: &str, query: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind: kind.to_string(),
            query: query.into(),
        }
    }

    /// True for errors that describe bad user input rather than a failed
    /// collaborator (network, storage).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError(_)
                | CoreError::NotFound { .. }
                | CoreError::Ambiguous { .. }
                | CoreError::UnsupportedTool(_)
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // Strip query parameters: reqwest errors carry full URLs, and
        // feed API keys travel in the query string.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
