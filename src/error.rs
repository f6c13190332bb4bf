//! Unified error handling for the cost simulator
//!
//! One crate-wide error type so failures carry their category across module
//! boundaries instead of `Box<dyn Error>`.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for the simulator
#[derive(Debug, Error)]
pub enum SimError {
    /// Transport failure or abnormal close; triggers the reconnect policy
    /// unless the close was intentional
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed inbound payload. Non-fatal: the current snapshot stays
    /// authoritative until a valid frame arrives.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Degenerate book input (missing best ask/bid). Handled by skipping
    /// recomputation, never raised across the snapshot boundary.
    #[error("Computation input error: {0}")]
    ComputationInput(String),

    /// Retry budget exhausted; terminal for the feed until `connect()` is
    /// called again
    #[error("Reconnect budget exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SimError {
    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SimError::Connection(_) => "connection",
            SimError::Parse(_) => "parse",
            SimError::ComputationInput(_) => "computation",
            SimError::ReconnectExhausted { .. } => "connection",
            SimError::InvalidParameter { .. } => "validation",
            SimError::Config(_) => "config",
        }
    }

    /// Whether retrying the same operation can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SimError::Connection(_) | SimError::Parse(_))
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Parse(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SimError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SimError::Connection(err.to_string())
    }
}

/// Result type alias using SimError
pub type SimResult<T> = Result<T, SimError>;
