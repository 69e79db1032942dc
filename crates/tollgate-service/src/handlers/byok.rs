//! BYOK credential handlers.
//!
//! The service stores only the *fact* that an account supplies its
//! own provider credential; the credential itself lives with the
//! inference router.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;

use tollgate_core::AccountId;
use tollgate_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Register a BYOK credential for an account and provider.
pub async fn put_credential(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((account_id, provider)): Path<(AccountId, String)>,
) -> Result<StatusCode, ApiError> {
    state.store.put_byok_credential(&account_id, &provider)?;
    tracing::info!(account_id = %account_id, provider = %provider, "BYOK credential registered");
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a BYOK credential.
pub async fn delete_credential(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((account_id, provider)): Path<(AccountId, String)>,
) -> Result<StatusCode, ApiError> {
    state.store.remove_byok_credential(&account_id, &provider)?;
    tracing::info!(account_id = %account_id, provider = %provider, "BYOK credential removed");
    Ok(StatusCode::NO_CONTENT)
}
