//! Error types for tollgate storage.

use tollgate_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Domain-level rejection (insufficient balance, quota, ...).
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl StoreError {
    /// The inner ledger error, if this is a domain-level rejection.
    #[must_use]
    pub const fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(err) => Some(err),
            _ => None,
        }
    }
}
