//! Quota handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use tollgate_core::AccountId;
use tollgate_store::{QuotaDecision, Store};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Quota check request.
#[derive(Debug, Deserialize)]
pub struct QuotaCheckRequest {
    /// The account to check.
    pub account_id: AccountId,
}

/// Atomically check and increment an account's quota counter.
///
/// Returns `allowed: false` without mutation at the limit; the caller
/// decides whether that is fatal.
pub async fn check(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<QuotaCheckRequest>,
) -> Result<Json<QuotaDecision>, ApiError> {
    let account = state
        .store
        .get_account(&body.account_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", body.account_id)))?;

    let limit = state
        .config
        .quota_call_limit
        .unwrap_or_else(|| account.tier.default_call_limit());
    let decision = state.store.check_and_increment_quota(
        &body.account_id,
        limit,
        state.config.quota_period_days,
    )?;
    Ok(Json(decision))
}
