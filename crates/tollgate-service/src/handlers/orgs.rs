//! Organization, pool and allocation handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::{
    AccountId, CreditKind, Organization, OrganizationMembership, OrgId, Tier, TxnContext,
};
use tollgate_store::{MemberAttribution, Store};

use crate::auth::{AdminAuth, ServiceAuth};
use crate::error::ApiError;
use crate::handlers::accounts::MutationResponse;
use crate::state::AppState;

/// Organization creation request.
#[derive(Debug, Deserialize)]
pub struct CreateOrgRequest {
    /// Organization id; generated when absent.
    #[serde(default)]
    pub org_id: Option<OrgId>,
    /// Subscription tier shared by the organization.
    pub tier: Tier,
    /// Optional initial purchase credited into the pool.
    #[serde(default)]
    pub initial_purchase: Option<Decimal>,
}

/// Create an organization, optionally funding its pool (admin).
pub async fn create_org(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Json(body): Json<CreateOrgRequest>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    let org_id = body.org_id.unwrap_or_else(OrgId::generate);
    let org = Organization::new(org_id, body.tier);
    state.store.put_organization(&org)?;

    if let Some(amount) = body.initial_purchase {
        state.store.credit_pool(
            &org_id,
            amount,
            CreditKind::Purchase,
            TxnContext::default(),
            None,
        )?;
    }

    tracing::info!(
        admin_id = %auth.admin_id,
        org_id = %org_id,
        tier = %body.tier,
        initial_purchase = ?body.initial_purchase,
        "Organization created"
    );

    // Re-read so the response reflects the funded pool.
    let org = state
        .store
        .get_organization(&org_id)?
        .ok_or_else(|| ApiError::Internal("organization vanished after create".into()))?;
    Ok((StatusCode::CREATED, Json(org)))
}

/// Get an organization.
pub async fn get_org(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(org_id): Path<OrgId>,
) -> Result<Json<Organization>, ApiError> {
    let org = state
        .store
        .get_organization(&org_id)?
        .ok_or_else(|| ApiError::NotFound(format!("organization not found: {org_id}")))?;
    Ok(Json(org))
}

/// Pool credit request.
#[derive(Debug, Deserialize)]
pub struct CreditPoolRequest {
    /// Amount of credits to add to the pool.
    pub amount: Decimal,
    /// Why the pool increases (default: purchase).
    #[serde(default = "default_credit_kind")]
    pub kind: CreditKind,
    /// Idempotency key for replay protection.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

const fn default_credit_kind() -> CreditKind {
    CreditKind::Purchase
}

/// Credit an organization pool (admin).
pub async fn credit_pool(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(org_id): Path<OrgId>,
    Json(body): Json<CreditPoolRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let change = state.store.credit_pool(
        &org_id,
        body.amount,
        body.kind,
        TxnContext::default(),
        body.idempotency_key.as_deref(),
    )?;

    tracing::info!(
        admin_id = %auth.admin_id,
        org_id = %org_id,
        amount = %body.amount,
        new_balance = %change.new_balance,
        "Organization pool credited"
    );

    Ok(Json(MutationResponse {
        new_balance: change.new_balance,
        transaction_id: change.transaction_id.to_string(),
    }))
}

/// Allocation grant request.
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    /// The member receiving the allocation.
    pub member_id: AccountId,
    /// Additional allocation amount.
    pub amount: Decimal,
}

/// Grant allocation to a member (admin). The sum of all allocations
/// may never exceed the pool's lifetime purchases.
pub async fn allocate(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(org_id): Path<OrgId>,
    Json(body): Json<AllocateRequest>,
) -> Result<(StatusCode, Json<OrganizationMembership>), ApiError> {
    let membership = state
        .store
        .allocate(&org_id, &body.member_id, body.amount)?;

    tracing::info!(
        admin_id = %auth.admin_id,
        org_id = %org_id,
        member_id = %body.member_id,
        amount = %body.amount,
        "Allocation granted"
    );

    Ok((StatusCode::CREATED, Json(membership)))
}

/// Per-member attribution rollup for an organization.
pub async fn attribution(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(org_id): Path<OrgId>,
) -> Result<Json<Vec<MemberAttribution>>, ApiError> {
    // 404 for unknown organizations, empty list for known-but-empty.
    state
        .store
        .get_organization(&org_id)?
        .ok_or_else(|| ApiError::NotFound(format!("organization not found: {org_id}")))?;
    Ok(Json(state.store.get_attribution(&org_id)?))
}

/// One member's allocation, with the derived remainder.
#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    /// The organization.
    pub org_id: OrgId,
    /// The member account.
    pub member_id: AccountId,
    /// Total credits allocated.
    pub allocated_amount: Decimal,
    /// Credits consumed from the allocation.
    pub consumed_amount: Decimal,
    /// Remaining allocation.
    pub allocated_remaining: Decimal,
}

/// Get one member's allocation.
pub async fn get_allocation(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((org_id, member_id)): Path<(OrgId, AccountId)>,
) -> Result<Json<AllocationResponse>, ApiError> {
    let membership = state
        .store
        .get_membership(&org_id, &member_id)?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "no allocation exists for member {member_id} in organization {org_id}"
            ))
        })?;

    Ok(Json(AllocationResponse {
        org_id: membership.org_id,
        member_id: membership.member_id,
        allocated_amount: membership.allocated_amount,
        consumed_amount: membership.consumed_amount,
        allocated_remaining: membership.allocated_remaining(),
    }))
}
