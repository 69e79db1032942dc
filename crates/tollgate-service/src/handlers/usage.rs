//! Usage ingestion and reporting handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::{AccountId, OrgId, Tier, UsageFilter, UsageRecord, UsageSummary};
use tollgate_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Usage event ingestion request.
#[derive(Debug, Deserialize)]
pub struct UsageIngestRequest {
    /// Unique event id for idempotency.
    pub event_id: String,
    /// The calling account.
    pub account_id: AccountId,
    /// The organization billed, if any.
    #[serde(default)]
    pub org_id: Option<OrgId>,
    /// Upstream provider.
    pub provider: String,
    /// Model id.
    pub model: String,
    /// Caller's tier at the time of the call.
    pub tier: Tier,
    /// Confirmed input tokens.
    #[serde(default)]
    pub tokens_in: u64,
    /// Confirmed output tokens.
    #[serde(default)]
    pub tokens_out: u64,
    /// Credits charged (zero for BYOK and failed calls).
    #[serde(default)]
    pub cost_charged: Decimal,
    /// Whether BYOK bypass applied.
    #[serde(default)]
    pub byok_used: bool,
    /// Upstream round-trip latency in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
    /// Whether the upstream call completed.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Machine-readable error code for failed calls.
    #[serde(default)]
    pub error_kind: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Ingestion response.
#[derive(Debug, Serialize)]
pub struct UsageIngestResponse {
    /// The recorded event id.
    pub event_id: String,
}

/// Durably record one metered event. Replays of the same event id
/// fail with a conflict.
pub async fn record(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<UsageIngestRequest>,
) -> Result<(StatusCode, Json<UsageIngestResponse>), ApiError> {
    let record = UsageRecord {
        event_id: body.event_id.clone(),
        account_id: body.account_id,
        org_id: body.org_id,
        provider: body.provider,
        model: body.model,
        tier: body.tier,
        tokens_in: body.tokens_in,
        tokens_out: body.tokens_out,
        cost_charged: body.cost_charged,
        byok_used: body.byok_used,
        latency_ms: body.latency_ms,
        success: body.success,
        error_kind: body.error_kind,
        created_at: Utc::now(),
    };
    state.store.record_usage(&record)?;

    tracing::debug!(
        service = %auth.service_name,
        event_id = %body.event_id,
        account_id = %body.account_id,
        "Usage event recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UsageIngestResponse {
            event_id: body.event_id,
        }),
    ))
}

/// Usage query parameters. All filters are conjunctive.
#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    /// Restrict to one account.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Restrict to one organization.
    #[serde(default)]
    pub org_id: Option<OrgId>,
    /// Inclusive lower bound on record time.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on record time.
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

/// Aggregate usage matching the filters.
pub async fn query(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Query(params): Query<UsageQuery>,
) -> Result<Json<UsageSummary>, ApiError> {
    let filter = UsageFilter {
        account_id: params.account_id,
        org_id: params.org_id,
        from: params.from,
        until: params.until,
    };
    Ok(Json(state.store.query_usage(&filter)?))
}
