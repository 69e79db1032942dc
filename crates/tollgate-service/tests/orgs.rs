//! Organization pool and allocation integration tests.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{decimal_field, test_config, TestHarness};
use rust_decimal_macros::dec;
use serde_json::json;
use tollgate_core::AccountId;
use tollgate_service::FixedRouter;

/// Catalog entry priced so the default router outcome (1000 + 500
/// tokens) costs exactly 9 at enterprise markup (1.00).
fn pooled_model() -> serde_json::Value {
    json!({
        "model_id": "atlas-large",
        "provider": "anthropic",
        "tier_access": ["enterprise"],
        "base_price_per_unit": "0.006"
    })
}

/// Create a funded enterprise organization; returns its id.
async fn funded_org(harness: &TestHarness, initial_purchase: &str) -> String {
    let response = harness
        .server
        .post("/v1/orgs")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "tier": "enterprise", "initial_purchase": initial_purchase }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    body["id"].as_str().expect("org id").to_string()
}

/// Create an enterprise member account and grant it an allocation.
async fn allocated_member(harness: &TestHarness, org_id: &str, amount: &str) -> AccountId {
    let member_id = AccountId::generate();
    harness.credit_account(&member_id, "1").await;
    harness.set_tier(&member_id, "enterprise").await;

    let response = harness
        .server
        .post(&format!("/v1/orgs/{org_id}/allocations"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "member_id": member_id.to_string(), "amount": amount }))
        .await;
    response.assert_status(StatusCode::CREATED);
    member_id
}

#[tokio::test]
async fn pooled_call_consumes_pool_and_allocation_together() {
    let harness = TestHarness::new();
    harness.put_model(&pooled_model()).await;
    let org_id = funded_org(&harness, "10000").await;
    let member_id = allocated_member(&harness, &org_id, "2500").await;

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "org-req-001",
            "account_id": member_id.to_string(),
            "org_id": org_id,
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "cost_charged"), dec!(9));
    assert_eq!(decimal_field(&body, "pool_remaining"), dec!(9991));
    assert_eq!(decimal_field(&body, "allocated_remaining"), dec!(2491));
    assert!(body.get("new_balance").is_none());

    // Both balances agree on read-back.
    let response = harness
        .server
        .get(&format!("/v1/orgs/{org_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let org: serde_json::Value = response.json();
    assert_eq!(decimal_field(&org, "pool_balance_remaining"), dec!(9991));
    assert_eq!(decimal_field(&org, "pool_lifetime_purchased"), dec!(10000));

    let response = harness
        .server
        .get(&format!("/v1/orgs/{org_id}/allocations/{member_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let allocation: serde_json::Value = response.json();
    assert_eq!(decimal_field(&allocation, "allocated_amount"), dec!(2500));
    assert_eq!(decimal_field(&allocation, "consumed_amount"), dec!(9));
    assert_eq!(decimal_field(&allocation, "allocated_remaining"), dec!(2491));

    // The member's individual balance never moved.
    let response = harness
        .server
        .get(&format!("/v1/accounts/{member_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let account: serde_json::Value = response.json();
    assert_eq!(decimal_field(&account, "balance_remaining"), dec!(1));
}

#[tokio::test]
async fn allocations_cannot_exceed_lifetime_purchases() {
    let harness = TestHarness::new();
    let org_id = funded_org(&harness, "100").await;

    allocated_member(&harness, &org_id, "80").await;

    // 80 + 30 > 100 lifetime.
    let other = AccountId::generate();
    harness.credit_account(&other, "1").await;
    let response = harness
        .server
        .post(&format!("/v1/orgs/{org_id}/allocations"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "member_id": other.to_string(), "amount": "30" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // 80 + 20 fits exactly.
    let response = harness
        .server
        .post(&format!("/v1/orgs/{org_id}/allocations"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "member_id": other.to_string(), "amount": "20" }))
        .await;
    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn exhausted_allocation_blocks_before_dispatch() {
    let harness = TestHarness::new();
    harness.put_model(&pooled_model()).await;
    let org_id = funded_org(&harness, "10000").await;
    // Allocation far below the call's estimated cost.
    let member_id = allocated_member(&harness, &org_id, "0.001").await;

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "org-req-broke",
            "account_id": member_id.to_string(),
            "org_id": org_id,
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "allocation_exhausted");
    assert_eq!(harness.router.calls(), 0);

    // Pool untouched.
    let response = harness
        .server
        .get(&format!("/v1/orgs/{org_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let org: serde_json::Value = response.json();
    assert_eq!(decimal_field(&org, "pool_balance_remaining"), dec!(10000));
}

#[tokio::test]
async fn member_without_allocation_cannot_spend_from_the_pool() {
    let harness = TestHarness::new();
    harness.put_model(&pooled_model()).await;
    let org_id = funded_org(&harness, "10000").await;

    let outsider = AccountId::generate();
    harness.credit_account(&outsider, "1").await;
    harness.set_tier(&outsider, "enterprise").await;

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "org-req-outsider",
            "account_id": outsider.to_string(),
            "org_id": org_id,
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status_not_found();
    assert_eq!(harness.router.calls(), 0);
}

#[tokio::test]
async fn attribution_rolls_up_per_member() {
    let harness = TestHarness::new();
    harness.put_model(&pooled_model()).await;
    let org_id = funded_org(&harness, "10000").await;
    let spender = allocated_member(&harness, &org_id, "100").await;
    let idle = allocated_member(&harness, &org_id, "50").await;

    harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "org-req-attr",
            "account_id": spender.to_string(),
            "org_id": org_id,
            "model_id": "atlas-large"
        }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get(&format!("/v1/orgs/{org_id}/allocations"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    response.assert_status_ok();
    let rows: Vec<serde_json::Value> = response.json();
    assert_eq!(rows.len(), 2);

    let spender_row = rows
        .iter()
        .find(|r| r["member_id"] == spender.to_string())
        .expect("spender row");
    assert_eq!(decimal_field(spender_row, "consumed"), dec!(9));
    let idle_row = rows
        .iter()
        .find(|r| r["member_id"] == idle.to_string())
        .expect("idle row");
    assert_eq!(decimal_field(idle_row, "consumed"), dec!(0));
    assert_eq!(decimal_field(idle_row, "allocated"), dec!(50));
}

#[tokio::test]
async fn unknown_org_attribution_is_not_found() {
    let harness = TestHarness::new();
    let org_id = tollgate_core::OrgId::generate();

    harness
        .server
        .get(&format!("/v1/orgs/{org_id}/allocations"))
        .add_header("x-api-key", &harness.service_api_key)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn byok_bookkeeping_mode_tracks_notional_cost_without_spending() {
    let mut config = test_config();
    config.byok_consumes_allocation = true;
    let harness =
        TestHarness::with_parts(config, Arc::new(FixedRouter::succeeding(1000, 500)));
    harness.put_model(&pooled_model()).await;
    let org_id = funded_org(&harness, "10000").await;
    let member_id = allocated_member(&harness, &org_id, "2500").await;

    harness
        .server
        .put(&format!("/v1/accounts/{member_id}/byok/anthropic"))
        .add_header("x-api-key", &harness.service_api_key)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "org-req-byok",
            "account_id": member_id.to_string(),
            "org_id": org_id,
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["byok_used"], true);
    assert_eq!(decimal_field(&body, "cost_charged"), dec!(0));

    // The notional cost lands on the membership only; the pool keeps
    // its full balance.
    let response = harness
        .server
        .get(&format!("/v1/orgs/{org_id}/allocations/{member_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let allocation: serde_json::Value = response.json();
    assert_eq!(decimal_field(&allocation, "consumed_amount"), dec!(9));

    let response = harness
        .server
        .get(&format!("/v1/orgs/{org_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let org: serde_json::Value = response.json();
    assert_eq!(decimal_field(&org, "pool_balance_remaining"), dec!(10000));
}
