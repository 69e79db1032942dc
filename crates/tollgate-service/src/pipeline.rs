//! The metered-call pipeline.
//!
//! One call moves through:
//! received → quota checked → (byok bypass | tier checked) →
//! (allocation checked | balance checked) → routed → settled →
//! usage recorded.
//!
//! Failures before dispatch are reported with no partial mutation
//! (the quota increment excepted: every metered call counts against
//! quota, billed or not). The debit is deferred to settlement: only
//! confirmed token usage is charged, so an upstream failure costs
//! nothing. No ledger lock is held across the router round-trip.

use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::{AccountId, OrgId, Tier, TxnContext, UsageRecord};
use tollgate_store::Store;

use crate::error::ApiError;
use crate::router::{RouteOutcome, RouteRequest, RouterError};
use crate::state::AppState;

/// One metered inference call.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRequest {
    /// Caller-supplied request id, used as the usage event id.
    pub request_id: String,

    /// The calling account (identity verified upstream).
    pub account_id: AccountId,

    /// The organization to bill, when the caller spends from an
    /// allocation instead of an individual balance.
    #[serde(default)]
    pub org_id: Option<OrgId>,

    /// Requested model.
    pub model_id: String,

    /// Caller's estimate of billable units, used only for the
    /// pre-flight affordability check.
    #[serde(default = "default_estimated_units")]
    pub estimated_units: u64,

    /// Opaque inference payload, forwarded to the router untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

const fn default_estimated_units() -> u64 {
    1
}

/// The settled result of a metered call.
#[derive(Debug, Clone, Serialize)]
pub struct CallReceipt {
    /// Echo of the caller's request id.
    pub request_id: String,

    /// The model that served the call.
    pub model_id: String,

    /// The upstream provider.
    pub provider: String,

    /// Whether the call ran under BYOK bypass.
    pub byok_used: bool,

    /// Confirmed input tokens.
    pub tokens_in: u64,

    /// Confirmed output tokens.
    pub tokens_out: u64,

    /// Credits charged at settlement (zero under BYOK).
    pub cost_charged: Decimal,

    /// Individual balance after settlement, when billed individually.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<Decimal>,

    /// Organization pool balance after settlement, when org-billed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_remaining: Option<Decimal>,

    /// Member's remaining allocation after settlement, when
    /// org-billed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_remaining: Option<Decimal>,
}

/// Run one call through the full pipeline.
pub async fn execute_call(state: &AppState, req: CallRequest) -> Result<CallReceipt, ApiError> {
    let account = state
        .store
        .get_account(&req.account_id)?
        .filter(|a| !a.deactivated)
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", req.account_id)))?;

    // A request id doubles as the usage event id; replays of a
    // settled call are refused before any counter moves. Replays
    // still in flight get past this read but are caught again at
    // settlement, where the request id is the idempotency key.
    if state.store.usage_exists(&req.request_id)? {
        return Err(ApiError::DuplicateTransaction(req.request_id.clone()));
    }

    let model = state
        .store
        .get_model(&req.model_id)?
        .ok_or_else(|| ApiError::NotFound(format!("model not found: {}", req.model_id)))?;

    // BYOK detection comes first; it decides which gates apply.
    let byok = state
        .store
        .has_byok_credential(&req.account_id, &model.provider)?;

    // Quota counts every metered call, billed or bypassed. This is
    // the one mutation allowed before the terminal-failure gates.
    let limit = state
        .config
        .quota_call_limit
        .unwrap_or_else(|| account.tier.default_call_limit());
    let quota = state.store.check_and_increment_quota(
        &req.account_id,
        limit,
        state.config.quota_period_days,
    )?;
    if !quota.allowed {
        tracing::info!(
            account_id = %req.account_id,
            used = quota.used,
            limit = quota.limit,
            "Call rejected: quota exceeded"
        );
        return Err(ApiError::QuotaExceeded {
            reset_at: quota.resets_at,
        });
    }

    // Tier gate and affordability pre-flight, skipped entirely under
    // BYOK. The pre-flight is advisory (estimate-priced); the binding
    // check happens at settlement, inside the store's critical
    // section.
    let unit_price = if byok {
        Decimal::ZERO
    } else {
        let price = model.effective_price(account.tier)?;
        let estimate = price * Decimal::from(req.estimated_units.max(1));
        preflight_affordability(state, &req, estimate)?;
        price
    };

    // Dispatch. No ledger state is locked here.
    let route = RouteRequest {
        model_id: model.model_id.clone(),
        provider: model.provider.clone(),
        byok,
        payload: req.payload.clone(),
    };
    let started = Instant::now();
    let routed = state.router.route(route).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let outcome = match routed {
        Ok(outcome) => outcome,
        Err(err) => {
            // Never reached settlement: nothing is charged, but the
            // event is still recorded.
            tracing::warn!(
                request_id = %req.request_id,
                model = %model.model_id,
                error = %err,
                "Upstream call failed before settlement"
            );
            record_event(
                state,
                &req,
                &model.provider,
                account.tier,
                RouteOutcome {
                    tokens_in: 0,
                    tokens_out: 0,
                },
                Decimal::ZERO,
                byok,
                latency_ms,
                false,
                Some(err.code().to_string()),
            )?;
            return Err(upstream_error(&err));
        }
    };

    // Settlement: debit confirmed usage only.
    let confirmed_units = outcome.tokens_in + outcome.tokens_out;
    let cost = unit_price * Decimal::from(confirmed_units);
    let ctx = TxnContext::for_call(&model.provider, &model.model_id, &req.request_id);

    let mut new_balance = None;
    let mut pool_remaining = None;
    let mut allocated_remaining = None;
    let mut charged = Decimal::ZERO;

    if byok {
        if state.config.byok_consumes_allocation {
            note_byok_allocation(state, &req, &model, account.tier, confirmed_units);
        }
    } else if cost > Decimal::ZERO {
        match settle(state, &req, cost, ctx) {
            Ok(Settled {
                balance,
                pool,
                allocation,
            }) => {
                charged = cost;
                new_balance = balance;
                pool_remaining = pool;
                allocated_remaining = allocation;
            }
            Err(err) => {
                // The upstream call completed but the charge failed
                // (e.g. the balance drained between pre-flight and
                // settlement). Record the event uncharged and
                // surface the error.
                let api_err: ApiError = err.into();
                if matches!(api_err, ApiError::DuplicateTransaction(_)) {
                    // A concurrent call with the same request id won
                    // the settlement; it records the usage event.
                    return Err(api_err);
                }
                tracing::warn!(
                    request_id = %req.request_id,
                    error = %api_err,
                    "Settlement failed after completed upstream call"
                );
                record_event(
                    state,
                    &req,
                    &model.provider,
                    account.tier,
                    outcome,
                    Decimal::ZERO,
                    byok,
                    latency_ms,
                    true,
                    Some(settlement_error_kind(&api_err)),
                )?;
                return Err(api_err);
            }
        }
    }

    record_event(
        state,
        &req,
        &model.provider,
        account.tier,
        outcome,
        charged,
        byok,
        latency_ms,
        true,
        None,
    )?;

    tracing::info!(
        request_id = %req.request_id,
        account_id = %req.account_id,
        model = %model.model_id,
        cost = %charged,
        byok = byok,
        latency_ms = latency_ms,
        "Call settled"
    );

    Ok(CallReceipt {
        request_id: req.request_id,
        model_id: model.model_id,
        provider: model.provider,
        byok_used: byok,
        tokens_in: outcome.tokens_in,
        tokens_out: outcome.tokens_out,
        cost_charged: charged,
        new_balance,
        pool_remaining,
        allocated_remaining,
    })
}

/// Estimate-priced affordability check before dispatch. Read-only.
fn preflight_affordability(
    state: &AppState,
    req: &CallRequest,
    estimate: Decimal,
) -> Result<(), ApiError> {
    if let Some(org_id) = req.org_id {
        let org = state
            .store
            .get_organization(&org_id)?
            .ok_or_else(|| ApiError::NotFound(format!("organization not found: {org_id}")))?;
        let membership = state
            .store
            .get_membership(&org_id, &req.account_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "no allocation exists for member {} in organization {org_id}",
                    req.account_id
                ))
            })?;

        let remaining = membership.allocated_remaining();
        if remaining < estimate {
            return Err(ApiError::AllocationExhausted {
                remaining,
                required: estimate,
            });
        }
        if org.pool_balance_remaining < estimate {
            return Err(ApiError::InsufficientBalance {
                balance: org.pool_balance_remaining,
                required: estimate,
            });
        }
    } else {
        let account = state
            .store
            .get_account(&req.account_id)?
            .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", req.account_id)))?;
        if !account.has_sufficient_balance(estimate) {
            return Err(ApiError::InsufficientBalance {
                balance: account.balance_remaining,
                required: estimate,
            });
        }
    }
    Ok(())
}

struct Settled {
    balance: Option<Decimal>,
    pool: Option<Decimal>,
    allocation: Option<Decimal>,
}

/// Apply the final charge for confirmed usage. The request id rides
/// along as the idempotency key, so two in-flight calls sharing an id
/// settle exactly one charge.
fn settle(
    state: &AppState,
    req: &CallRequest,
    cost: Decimal,
    ctx: TxnContext,
) -> Result<Settled, tollgate_store::StoreError> {
    if let Some(org_id) = req.org_id {
        let outcome = state.store.consume_from_allocation(
            &org_id,
            &req.account_id,
            cost,
            ctx,
            Some(&req.request_id),
        )?;
        Ok(Settled {
            balance: None,
            pool: Some(outcome.pool_remaining),
            allocation: Some(outcome.allocated_remaining),
        })
    } else {
        let outcome = state
            .store
            .debit(&req.account_id, cost, ctx, Some(&req.request_id))?;
        Ok(Settled {
            balance: Some(outcome.new_balance),
            pool: None,
            allocation: None,
        })
    }
}

/// BYOK allocation bookkeeping: the member's consumed amount tracks
/// the notional cost, but no pool balance or ledger row changes.
fn note_byok_allocation(
    state: &AppState,
    req: &CallRequest,
    model: &tollgate_core::ModelCatalogEntry,
    tier: Tier,
    confirmed_units: u64,
) {
    let Some(org_id) = req.org_id else { return };
    let notional = model.base_price_per_unit * model.markup_for(tier) * Decimal::from(confirmed_units);
    if let Err(err) = state
        .store
        .note_allocation_usage(&org_id, &req.account_id, notional)
    {
        tracing::warn!(
            org_id = %org_id,
            member_id = %req.account_id,
            error = %err,
            "BYOK allocation bookkeeping failed"
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn record_event(
    state: &AppState,
    req: &CallRequest,
    provider: &str,
    tier: Tier,
    outcome: RouteOutcome,
    cost_charged: Decimal,
    byok_used: bool,
    latency_ms: u64,
    success: bool,
    error_kind: Option<String>,
) -> Result<(), ApiError> {
    let record = UsageRecord {
        event_id: req.request_id.clone(),
        account_id: req.account_id,
        org_id: req.org_id,
        provider: provider.to_string(),
        model: req.model_id.clone(),
        tier,
        tokens_in: outcome.tokens_in,
        tokens_out: outcome.tokens_out,
        cost_charged,
        byok_used,
        latency_ms,
        success,
        error_kind,
        created_at: Utc::now(),
    };
    state.store.record_usage(&record)?;
    Ok(())
}

fn upstream_error(err: &RouterError) -> ApiError {
    ApiError::Upstream(err.to_string())
}

fn settlement_error_kind(err: &ApiError) -> String {
    match err {
        ApiError::InsufficientBalance { .. } => "insufficient_balance",
        ApiError::AllocationExhausted { .. } => "allocation_exhausted",
        _ => "settlement_failed",
    }
    .to_string()
}
