//! Error types for the tollgate ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::ids::IdError;
use crate::tier::Tier;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// Validation errors (`InvalidAmount`, `AccountNotFound`,
/// `UnknownTier`) are raised before any state is touched.
/// Concurrency-sensitive errors (`InsufficientBalance`,
/// `AllocationExhausted`) are detected inside the same critical
/// section that would otherwise perform the mutation, so failure and
/// mutation are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Account not found (or soft-deactivated).
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account id that was not found.
        account_id: String,
    },

    /// Organization not found.
    #[error("organization not found: {org_id}")]
    OrganizationNotFound {
        /// The organization id that was not found.
        org_id: String,
    },

    /// No membership row exists for this (organization, member) pair.
    #[error("no allocation exists for member {member_id} in organization {org_id}")]
    MembershipNotFound {
        /// The organization id.
        org_id: String,
        /// The member account id.
        member_id: String,
    },

    /// Model not present in the catalog.
    #[error("model not found: {model_id}")]
    ModelNotFound {
        /// The model id that was not found.
        model_id: String,
    },

    /// Insufficient balance for the debit.
    #[error("insufficient balance: remaining={balance}, required={required}")]
    InsufficientBalance {
        /// Remaining balance.
        balance: Decimal,
        /// Required amount.
        required: Decimal,
    },

    /// The member's allocation ceiling is hit, even though the
    /// organization pool may still hold funds.
    #[error("allocation exhausted: remaining={remaining}, required={required}")]
    AllocationExhausted {
        /// The member's remaining allocation.
        remaining: Decimal,
        /// Required amount.
        required: Decimal,
    },

    /// The model's tier allow-list does not include the caller's tier.
    #[error("model {model_id} is not available to tier {tier}")]
    ModelNotAvailableForTier {
        /// The caller's tier.
        tier: Tier,
        /// The requested model.
        model_id: String,
    },

    /// The per-period call quota is already reached.
    #[error("quota exceeded, resets at {reset_at}")]
    QuotaExceeded {
        /// When the current quota period rolls over.
        reset_at: DateTime<Utc>,
    },

    /// Idempotency-key collision: this mutation was already applied.
    #[error("duplicate transaction: {idempotency_key}")]
    DuplicateTransaction {
        /// The colliding idempotency key.
        idempotency_key: String,
    },

    /// Amount failed validation (non-positive, unparseable, ...).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Tier name outside the closed tier set.
    #[error("unknown tier: {0}")]
    UnknownTier(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Stable machine-readable code for this error, used in API
    /// responses and usage records.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AccountNotFound { .. } => "account_not_found",
            Self::OrganizationNotFound { .. } => "organization_not_found",
            Self::MembershipNotFound { .. } => "membership_not_found",
            Self::ModelNotFound { .. } => "model_not_found",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::AllocationExhausted { .. } => "allocation_exhausted",
            Self::ModelNotAvailableForTier { .. } => "model_not_available_for_tier",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::DuplicateTransaction { .. } => "duplicate_transaction",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::UnknownTier(_) => "unknown_tier",
            Self::InvalidId(_) => "invalid_id",
        }
    }
}

/// Validate that an amount is strictly positive.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` for zero or negative amounts.
pub fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn positive_amounts_pass() {
        assert!(ensure_positive(dec!(0.001)).is_ok());
    }

    #[test]
    fn zero_and_negative_amounts_fail() {
        assert!(matches!(
            ensure_positive(Decimal::ZERO),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ensure_positive(dec!(-1)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn error_codes_are_stable() {
        let err = LedgerError::QuotaExceeded {
            reset_at: chrono::Utc::now(),
        };
        assert_eq!(err.code(), "quota_exceeded");
    }
}
