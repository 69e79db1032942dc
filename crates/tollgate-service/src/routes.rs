//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, byok, calls, catalog, health, orgs, quota, usage};
use crate::state::AppState;

/// Maximum concurrent requests for the metered-call pipeline.
/// This is the high-volume request path.
const CALLS_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts (service key; mutations admin key)
/// - `GET /v1/accounts/{id}/balance` - Balance, tier and quota state
/// - `GET /v1/accounts/{id}/transactions` - Ledger history
/// - `POST /v1/accounts/{id}/credit` - Add credits (admin)
/// - `POST /v1/accounts/{id}/debit` - Deduct credits (admin)
/// - `POST /v1/accounts/{id}/tier` - Change tier (admin)
/// - `DELETE /v1/accounts/{id}` - Soft-deactivate (admin)
/// - `PUT/DELETE /v1/accounts/{id}/byok/{provider}` - BYOK credentials
///
/// ## Catalog
/// - `GET /v1/catalog/models` - List (optionally `?tier=`)
/// - `GET /v1/catalog/models/{id}/availability?tier=` - Availability
/// - `POST /v1/catalog/models` - Create entry (admin)
/// - `POST /v1/catalog/models/{id}/deprecate` - Deprecate (admin)
/// - `POST /v1/catalog/models/{id}/disable` - Disable (admin)
///
/// ## Organizations
/// - `POST /v1/orgs` - Create and fund (admin)
/// - `GET /v1/orgs/{id}` - Read pool state
/// - `POST /v1/orgs/{id}/credit` - Credit the pool (admin)
/// - `POST /v1/orgs/{id}/allocations` - Grant allocation (admin)
/// - `GET /v1/orgs/{id}/allocations` - Attribution rollup
/// - `GET /v1/orgs/{id}/allocations/{member}` - One allocation
///
/// ## Metering (service key, concurrency-limited)
/// - `POST /v1/calls` - The metered-call pipeline
/// - `POST /v1/quota/check` - Atomic quota check-and-increment
/// - `POST /v1/usage` - Record a usage event
/// - `GET /v1/usage` - Aggregate usage
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // The metered-call path carries the request volume; it gets its
    // own concurrency ceiling.
    let call_routes = Router::new()
        .route("/", post(calls::create_call))
        .layer(ConcurrencyLimitLayer::new(CALLS_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Accounts & ledger
        .route("/accounts/:id/balance", get(accounts::get_balance))
        .route(
            "/accounts/:id/transactions",
            get(accounts::list_transactions),
        )
        .route("/accounts/:id/credit", post(accounts::credit_account))
        .route("/accounts/:id/debit", post(accounts::debit_account))
        .route("/accounts/:id/tier", post(accounts::set_tier))
        .route("/accounts/:id", delete(accounts::deactivate_account))
        // BYOK credentials
        .route(
            "/accounts/:id/byok/:provider",
            put(byok::put_credential).delete(byok::delete_credential),
        )
        // Catalog
        .route(
            "/catalog/models",
            get(catalog::list_models).post(catalog::put_model),
        )
        .route(
            "/catalog/models/:id/availability",
            get(catalog::availability),
        )
        .route("/catalog/models/:id/deprecate", post(catalog::deprecate_model))
        .route("/catalog/models/:id/disable", post(catalog::disable_model))
        // Organizations & allocations
        .route("/orgs", post(orgs::create_org))
        .route("/orgs/:id", get(orgs::get_org))
        .route("/orgs/:id/credit", post(orgs::credit_pool))
        .route(
            "/orgs/:id/allocations",
            get(orgs::attribution).post(orgs::allocate),
        )
        .route("/orgs/:id/allocations/:member", get(orgs::get_allocation))
        // Quota & usage
        .route("/quota/check", post(quota::check))
        .route("/usage", post(usage::record).get(usage::query))
        // Metered calls (with their own concurrency limit)
        .nest("/calls", call_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
