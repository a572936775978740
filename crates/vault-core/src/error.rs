//! Error types for the vault spend protocol.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for vault operations.
///
/// Serializes adjacently tagged (`{"kind": ..., "detail": ...}`) so the node
/// can ship it to clients without losing structure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VaultError {
    /// Neither the primary nor the fallback price source produced a quote.
    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    /// The covenant has not been compiled yet, or the last compile failed.
    #[error("Covenant not initialized: {0}")]
    CovenantUninitialized(String),

    /// The vault address holds no spendable coins.
    #[error("Vault has no funded UTXOs at {address}")]
    NoFundsAvailable { address: String },

    /// The selected coin does not cover the fee.
    #[error("Insufficient funds: coin value {value_sats} does not cover fee {fee_sats}")]
    InsufficientFunds { value_sats: u64, fee_sats: u64 },

    /// Malformed or missing request data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external collaborator (explorer, compiler) failed or timed out.
    #[error("Upstream {service} unavailable: {message}")]
    UpstreamUnavailable { service: String, message: String },
}

/// Programmatic discriminant of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PriceUnavailable,
    CovenantUninitialized,
    NoFundsAvailable,
    InsufficientFunds,
    InvalidInput,
    UpstreamUnavailable,
}

impl VaultError {
    /// Shorthand for an upstream failure.
    pub fn upstream(service: impl Into<String>, message: impl ToString) -> Self {
        VaultError::UpstreamUnavailable {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        VaultError::InvalidInput(message.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::PriceUnavailable(_) => ErrorKind::PriceUnavailable,
            VaultError::CovenantUninitialized(_) => ErrorKind::CovenantUninitialized,
            VaultError::NoFundsAvailable { .. } => ErrorKind::NoFundsAvailable,
            VaultError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            VaultError::InvalidInput(_) => ErrorKind::InvalidInput,
            VaultError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
        }
    }

    /// Returns true if the same request may succeed when repeated later.
    ///
    /// Nothing in this workspace retries on its own; this is a hint for
    /// callers and transports.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::PriceUnavailable(_)
                | VaultError::UpstreamUnavailable { .. }
                | VaultError::NoFundsAvailable { .. }
        )
    }
}

/// Convenience Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::InvalidInput(err.to_string())
    }
}

impl From<hex::FromHexError> for VaultError {
    fn from(err: hex::FromHexError) -> Self {
        VaultError::InvalidInput(format!("bad hex: {}", err))
    }
}
