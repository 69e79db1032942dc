//! Metered-call handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::pipeline::{execute_call, CallReceipt, CallRequest};
use crate::state::AppState;

/// Run one metered inference call through the full pipeline.
pub async fn create_call(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<CallRequest>,
) -> Result<Json<CallReceipt>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        request_id = %body.request_id,
        account_id = %body.account_id,
        model = %body.model_id,
        "Metered call received"
    );
    let receipt = execute_call(&state, body).await?;
    Ok(Json(receipt))
}
