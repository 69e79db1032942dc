//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use tollgate_core::{LedgerError, Tier};
use tollgate_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Insufficient credits to cover the requested amount.
    #[error("insufficient balance: remaining={balance}, required={required}")]
    InsufficientBalance {
        /// Remaining balance.
        balance: Decimal,
        /// Required amount.
        required: Decimal,
    },

    /// The member's allocation ceiling is hit.
    #[error("allocation exhausted: remaining={remaining}, required={required}")]
    AllocationExhausted {
        /// Remaining allocation.
        remaining: Decimal,
        /// Required amount.
        required: Decimal,
    },

    /// The caller's tier is not on the model's allow-list.
    #[error("model {model_id} is not available to tier {tier}")]
    ModelNotAvailable {
        /// The caller's tier.
        tier: Tier,
        /// The requested model.
        model_id: String,
    },

    /// The per-period call quota is reached.
    #[error("quota exceeded, resets at {reset_at}")]
    QuotaExceeded {
        /// When the current quota period rolls over.
        reset_at: DateTime<Utc>,
    },

    /// Duplicate mutation (idempotency).
    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// The upstream inference router failed.
    #[error("upstream routing failed: {0}")]
    Upstream(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InsufficientBalance { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_balance",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::AllocationExhausted {
                remaining,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "allocation_exhausted",
                self.to_string(),
                Some(serde_json::json!({
                    "remaining": remaining,
                    "required": required
                })),
            ),
            Self::ModelNotAvailable { tier, model_id } => (
                StatusCode::FORBIDDEN,
                "model_not_available_for_tier",
                self.to_string(),
                Some(serde_json::json!({
                    "tier": tier,
                    "model_id": model_id
                })),
            ),
            Self::QuotaExceeded { reset_at } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                self.to_string(),
                Some(serde_json::json!({ "reset_at": reset_at })),
            ),
            Self::DuplicateTransaction(key) => (
                StatusCode::CONFLICT,
                "duplicate_transaction",
                format!("transaction {key} already applied"),
                None,
            ),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg.clone(), None),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound { .. }
            | LedgerError::OrganizationNotFound { .. }
            | LedgerError::MembershipNotFound { .. }
            | LedgerError::ModelNotFound { .. } => Self::NotFound(err.to_string()),
            LedgerError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            LedgerError::AllocationExhausted {
                remaining,
                required,
            } => Self::AllocationExhausted {
                remaining,
                required,
            },
            LedgerError::ModelNotAvailableForTier { tier, model_id } => {
                Self::ModelNotAvailable { tier, model_id }
            }
            LedgerError::QuotaExceeded { reset_at } => Self::QuotaExceeded { reset_at },
            LedgerError::DuplicateTransaction { idempotency_key } => {
                Self::DuplicateTransaction(idempotency_key)
            }
            LedgerError::InvalidAmount(_)
            | LedgerError::UnknownTier(_)
            | LedgerError::InvalidId(_) => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Ledger(inner) => inner.into(),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
