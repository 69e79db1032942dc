//! Tollgate HTTP API Service.
//!
//! This crate provides the HTTP API for the tollgate credit ledger,
//! including:
//!
//! - Account balances, credits, debits and transaction history
//! - Organization pools, member allocations and attribution
//! - The model catalog with tier-gated availability
//! - Per-period call quotas
//! - BYOK credential registration
//! - The metered-call pipeline (`POST /v1/calls`)
//!
//! # Authentication
//!
//! Caller identity is verified upstream by the identity provider; this
//! service authenticates the calling *service*, not end users:
//!
//! 1. **Service API keys** (`x-api-key`) - for request-path endpoints
//! 2. **Admin API keys** (`x-admin-key`) - for privileged mutations

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers need async for consistency

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod router;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use pipeline::{CallReceipt, CallRequest};
pub use router::{
    DisabledRouter, FixedRouter, InferenceRouter, RouteOutcome, RouteRequest, RouterError,
};
pub use routes::create_router;
pub use state::AppState;
