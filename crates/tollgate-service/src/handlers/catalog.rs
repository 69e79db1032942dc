//! Model catalog handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::{ModelCatalogEntry, Tier};
use tollgate_store::Store;

use crate::auth::{AdminAuth, ServiceAuth};
use crate::error::ApiError;
use crate::state::AppState;

/// Optional tier filter for catalog listings.
#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    /// When set, only entries available to this tier are returned.
    #[serde(default)]
    pub tier: Option<Tier>,
}

/// List catalog entries, optionally filtered by tier availability.
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<Vec<ModelCatalogEntry>>, ApiError> {
    let entries = match query.tier {
        Some(tier) => state.store.list_available_models(tier)?,
        None => state.store.list_models()?,
    };
    Ok(Json(entries))
}

/// Tier query for availability checks.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// The tier to check.
    pub tier: Tier,
}

/// Availability response for one (model, tier) pair.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    /// The model id.
    pub model_id: String,
    /// The tier that was checked.
    pub tier: Tier,
    /// Whether the tier is on the model's allow-list.
    pub available: bool,
    /// Whether the entry is deprecated (advisory).
    pub deprecated: bool,
    /// Suggested replacement when deprecated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_model_id: Option<String>,
    /// Effective per-unit price for the tier, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_price: Option<Decimal>,
}

/// Check one model's availability and price for a tier.
pub async fn availability(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(model_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let entry = state
        .store
        .get_model(&model_id)?
        .ok_or_else(|| ApiError::NotFound(format!("model not found: {model_id}")))?;

    let available = entry.available_to(query.tier);
    let effective_price = entry.effective_price(query.tier).ok();

    Ok(Json(AvailabilityResponse {
        model_id: entry.model_id,
        tier: query.tier,
        available,
        deprecated: entry.deprecated,
        replacement_model_id: entry.replacement_model_id,
        effective_price,
    }))
}

/// Create or replace a catalog entry (admin).
pub async fn put_model(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Json(entry): Json<ModelCatalogEntry>,
) -> Result<(StatusCode, Json<ModelCatalogEntry>), ApiError> {
    state.store.put_model(&entry)?;
    tracing::info!(
        admin_id = %auth.admin_id,
        model_id = %entry.model_id,
        provider = %entry.provider,
        "Catalog entry written"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Deprecation request body.
#[derive(Debug, Deserialize)]
pub struct DeprecateRequest {
    /// Whether the entry is deprecated (default: true).
    #[serde(default = "default_true")]
    pub deprecated: bool,
    /// Suggested replacement model.
    #[serde(default)]
    pub replacement_model_id: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Mark a catalog entry deprecated (admin). The entry still resolves
/// until disabled.
pub async fn deprecate_model(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(model_id): Path<String>,
    Json(body): Json<DeprecateRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .set_model_deprecated(&model_id, body.deprecated, body.replacement_model_id)?;
    tracing::info!(
        admin_id = %auth.admin_id,
        model_id = %model_id,
        deprecated = body.deprecated,
        "Catalog entry deprecation changed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Disable request body.
#[derive(Debug, Deserialize)]
pub struct DisableRequest {
    /// Whether the entry is disabled (default: true).
    #[serde(default = "default_true")]
    pub disabled: bool,
}

/// Disable or re-enable a catalog entry (admin). A disabled entry
/// resolves for no tier.
pub async fn disable_model(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(model_id): Path<String>,
    Json(body): Json<DisableRequest>,
) -> Result<StatusCode, ApiError> {
    state.store.set_model_disabled(&model_id, body.disabled)?;
    tracing::info!(
        admin_id = %auth.admin_id,
        model_id = %model_id,
        disabled = body.disabled,
        "Catalog entry availability changed"
    );
    Ok(StatusCode::NO_CONTENT)
}
