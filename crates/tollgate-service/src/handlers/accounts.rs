//! Account and ledger handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::{AccountId, CreditKind, LedgerSubject, LedgerTransaction, Tier, TxnContext};
use tollgate_store::Store;

use crate::auth::{AdminAuth, ServiceAuth};
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for transaction listings.
const DEFAULT_TRANSACTION_LIMIT: usize = 50;

/// Balance response including quota state.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// The account id.
    pub account_id: AccountId,
    /// Current spendable balance.
    pub balance_remaining: Decimal,
    /// Lifetime credits purchased.
    pub lifetime_purchased: Decimal,
    /// Subscription tier.
    pub tier: Tier,
    /// Whether the account is soft-deactivated.
    pub deactivated: bool,
    /// Current quota period state.
    pub quota: QuotaState,
}

/// Quota state in the balance response.
#[derive(Debug, Serialize)]
pub struct QuotaState {
    /// Calls used in the current period.
    pub calls_used: u32,
    /// Call ceiling for the period.
    pub calls_limit: u32,
    /// When the current period rolls over.
    pub resets_at: DateTime<Utc>,
}

/// Get an account's balance, tier and quota state.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(account_id): Path<AccountId>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = state
        .store
        .get_account(&account_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {account_id}")))?;

    let limit = state
        .config
        .quota_call_limit
        .unwrap_or_else(|| account.tier.default_call_limit());
    let quota = state
        .store
        .get_quota(&account_id, limit, state.config.quota_period_days)?;

    Ok(Json(BalanceResponse {
        account_id: account.id,
        balance_remaining: account.balance_remaining,
        lifetime_purchased: account.lifetime_purchased,
        tier: account.tier,
        deactivated: account.deactivated,
        quota: QuotaState {
            calls_used: quota.calls_used,
            calls_limit: quota.calls_limit,
            resets_at: quota.period_end,
        },
    }))
}

/// Credit request body.
#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    /// Amount of credits to add.
    pub amount: Decimal,
    /// Why the balance increases (default: purchase).
    #[serde(default = "default_credit_kind")]
    pub kind: CreditKind,
    /// Idempotency key for replay protection.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

const fn default_credit_kind() -> CreditKind {
    CreditKind::Purchase
}

/// Debit request body.
#[derive(Debug, Deserialize)]
pub struct DebitRequest {
    /// Amount of credits to deduct.
    pub amount: Decimal,
    /// Correlation metadata for the ledger row.
    #[serde(default)]
    pub context: TxnContext,
    /// Idempotency key for replay protection.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Balance mutation response.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    /// Balance after the mutation.
    pub new_balance: Decimal,
    /// The appended ledger transaction id.
    pub transaction_id: String,
}

/// Credit an account (admin). Creates the account on first purchase.
pub async fn credit_account(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(account_id): Path<AccountId>,
    Json(body): Json<CreditRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let change = state.store.credit(
        &account_id,
        body.amount,
        body.kind,
        TxnContext::default(),
        body.idempotency_key.as_deref(),
    )?;

    tracing::info!(
        admin_id = %auth.admin_id,
        account_id = %account_id,
        amount = %body.amount,
        new_balance = %change.new_balance,
        "Account credited"
    );

    Ok(Json(MutationResponse {
        new_balance: change.new_balance,
        transaction_id: change.transaction_id.to_string(),
    }))
}

/// Debit an account (admin).
pub async fn debit_account(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(account_id): Path<AccountId>,
    Json(body): Json<DebitRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let change = state.store.debit(
        &account_id,
        body.amount,
        body.context,
        body.idempotency_key.as_deref(),
    )?;

    tracing::info!(
        admin_id = %auth.admin_id,
        account_id = %account_id,
        amount = %body.amount,
        new_balance = %change.new_balance,
        "Account debited"
    );

    Ok(Json(MutationResponse {
        new_balance: change.new_balance,
        transaction_id: change.transaction_id.to_string(),
    }))
}

/// Pagination query for transaction listings.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    /// Page size.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Offset from the newest transaction.
    #[serde(default)]
    pub offset: Option<usize>,
}

/// List an account's transactions, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(account_id): Path<AccountId>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<LedgerTransaction>>, ApiError> {
    let transactions = state.store.list_transactions(
        &LedgerSubject::Account(account_id),
        query.limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT),
        query.offset.unwrap_or(0),
    )?;
    Ok(Json(transactions))
}

/// Tier change request body.
#[derive(Debug, Deserialize)]
pub struct SetTierRequest {
    /// The new tier.
    pub tier: Tier,
}

/// Change an account's tier (admin).
pub async fn set_tier(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(account_id): Path<AccountId>,
    Json(body): Json<SetTierRequest>,
) -> Result<StatusCode, ApiError> {
    state.store.set_account_tier(&account_id, body.tier)?;
    tracing::info!(
        admin_id = %auth.admin_id,
        account_id = %account_id,
        tier = %body.tier,
        "Account tier changed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-deactivate an account (admin). The record is retained for
/// audit; further mutations are rejected.
pub async fn deactivate_account(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(account_id): Path<AccountId>,
) -> Result<StatusCode, ApiError> {
    state.store.deactivate_account(&account_id)?;
    tracing::info!(
        admin_id = %auth.admin_id,
        account_id = %account_id,
        "Account deactivated"
    );
    Ok(StatusCode::NO_CONTENT)
}
