//! Metered-call pipeline integration tests.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{decimal_field, test_config, TestHarness};
use rust_decimal_macros::dec;
use serde_json::json;
use tollgate_core::AccountId;
use tollgate_service::{FixedRouter, RouterError};

/// Catalog entry priced so the default router outcome (1000 + 500
/// tokens) costs exactly 0.009 at enterprise markup (1.00).
fn enterprise_model() -> serde_json::Value {
    json!({
        "model_id": "atlas-large",
        "provider": "anthropic",
        "tier_access": ["enterprise"],
        "base_price_per_unit": "0.000006"
    })
}

async fn enterprise_account(harness: &TestHarness, balance: &str) -> AccountId {
    let account_id = AccountId::generate();
    harness.credit_account(&account_id, balance).await;
    harness.set_tier(&account_id, "enterprise").await;
    account_id
}

#[tokio::test]
async fn completed_call_settles_exactly_once() {
    // Scenario: balance 5.00, call priced at 0.009.
    let harness = TestHarness::new();
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "5.00").await;

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "req-001",
            "account_id": account_id.to_string(),
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["byok_used"], false);
    assert_eq!(body["tokens_in"], 1000);
    assert_eq!(body["tokens_out"], 500);
    assert_eq!(decimal_field(&body, "cost_charged"), dec!(0.009));
    assert_eq!(decimal_field(&body, "new_balance"), dec!(4.991));
    assert_eq!(harness.router.calls(), 1);

    // Exactly one debit row beyond the funding purchase.
    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/transactions"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let transactions: Vec<serde_json::Value> = response.json();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["kind"]["type"], "debit");
    assert_eq!(decimal_field(&transactions[0], "resulting_balance"), dec!(4.991));
}

#[tokio::test]
async fn tier_exclusive_model_is_rejected_before_dispatch() {
    let harness = TestHarness::new();
    harness.put_model(&enterprise_model()).await;

    // Funding leaves the account on the default trial tier.
    let account_id = AccountId::generate();
    harness.credit_account(&account_id, "100").await;

    // Absent from the trial listing.
    let response = harness
        .server
        .get("/v1/catalog/models?tier=trial")
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let models: Vec<serde_json::Value> = response.json();
    assert!(models.is_empty());

    // Availability check agrees.
    let response = harness
        .server
        .get("/v1/catalog/models/atlas-large/availability?tier=trial")
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["available"], false);

    // The call fails with no router dispatch.
    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "req-002",
            "account_id": account_id.to_string(),
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "model_not_available_for_tier");
    assert_eq!(harness.router.calls(), 0);
}

#[tokio::test]
async fn quota_boundary_allows_nth_and_rejects_next() {
    let mut config = test_config();
    config.quota_call_limit = Some(2);
    let harness =
        TestHarness::with_parts(config, Arc::new(FixedRouter::succeeding(1000, 500)));
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "100").await;

    for i in 0..2 {
        harness
            .server
            .post("/v1/calls")
            .add_header("x-api-key", &harness.service_api_key)
            .json(&json!({
                "request_id": format!("req-quota-{i}"),
                "account_id": account_id.to_string(),
                "model_id": "atlas-large"
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "req-quota-2",
            "account_id": account_id.to_string(),
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "quota_exceeded");
    assert!(body["error"]["details"]["reset_at"].is_string());
    assert_eq!(harness.router.calls(), 2);
}

#[tokio::test]
async fn byok_calls_cost_nothing_but_count_against_quota() {
    let harness = TestHarness::new();
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "5.00").await;

    harness
        .server
        .put(&format!("/v1/accounts/{account_id}/byok/anthropic"))
        .add_header("x-api-key", &harness.service_api_key)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    for i in 0..3 {
        let response = harness
            .server
            .post("/v1/calls")
            .add_header("x-api-key", &harness.service_api_key)
            .json(&json!({
                "request_id": format!("req-byok-{i}"),
                "account_id": account_id.to_string(),
                "model_id": "atlas-large"
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["byok_used"], true);
        assert_eq!(decimal_field(&body, "cost_charged"), dec!(0));
    }

    // No balance moved; every call still counted.
    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "balance_remaining"), dec!(5.00));
    assert_eq!(body["quota"]["calls_used"], 3);

    let response = harness
        .server
        .get(&format!("/v1/usage?account_id={account_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let summary: serde_json::Value = response.json();
    assert_eq!(summary["calls"], 3);
    assert_eq!(summary["byok_calls"], 3);
    assert_eq!(decimal_field(&summary, "cost_charged"), dec!(0));
}

#[tokio::test]
async fn removing_byok_credential_restores_billing() {
    let harness = TestHarness::new();
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "5.00").await;

    harness
        .server
        .put(&format!("/v1/accounts/{account_id}/byok/anthropic"))
        .add_header("x-api-key", &harness.service_api_key)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    harness
        .server
        .delete(&format!("/v1/accounts/{account_id}/byok/anthropic"))
        .add_header("x-api-key", &harness.service_api_key)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "req-byok-off",
            "account_id": account_id.to_string(),
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["byok_used"], false);
    assert_eq!(decimal_field(&body, "new_balance"), dec!(4.991));
}

#[tokio::test]
async fn upstream_failure_is_never_charged() {
    let harness = TestHarness::with_router(Arc::new(FixedRouter::failing(
        RouterError::Upstream("provider 503".into()),
    )));
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "5.00").await;

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "req-fail",
            "account_id": account_id.to_string(),
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "balance_remaining"), dec!(5.00));

    // The failed event is still on the record.
    let response = harness
        .server
        .get(&format!("/v1/usage?account_id={account_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let summary: serde_json::Value = response.json();
    assert_eq!(summary["calls"], 1);
    assert_eq!(summary["succeeded"], 0);
}

#[tokio::test]
async fn preflight_rejects_unaffordable_calls_before_dispatch() {
    let harness = TestHarness::new();
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "0.000001").await;

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "req-broke",
            "account_id": account_id.to_string(),
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_balance");
    assert_eq!(harness.router.calls(), 0);
}

#[tokio::test]
async fn replayed_request_id_conflicts_without_a_second_charge() {
    let harness = TestHarness::new();
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "5.00").await;

    let call = json!({
        "request_id": "req-replay",
        "account_id": account_id.to_string(),
        "model_id": "atlas-large"
    });

    harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&call)
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&call)
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(harness.router.calls(), 1);

    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "balance_remaining"), dec!(4.991));
}

#[tokio::test]
async fn concurrent_replays_settle_at_most_one_charge() {
    // Both calls are in flight at once, so neither sees the other's
    // usage record; the settlement idempotency key breaks the tie.
    let harness = TestHarness::with_router(Arc::new(FixedRouter::succeeding_after(
        1000,
        500,
        std::time::Duration::from_millis(50),
    )));
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "5.00").await;

    let call = json!({
        "request_id": "req-race",
        "account_id": account_id.to_string(),
        "model_id": "atlas-large"
    });

    let (first, second) = tokio::join!(
        harness
            .server
            .post("/v1/calls")
            .add_header("x-api-key", &harness.service_api_key)
            .json(&call),
        harness
            .server
            .post("/v1/calls")
            .add_header("x-api-key", &harness.service_api_key)
            .json(&call),
    );

    let mut statuses = [first.status_code(), second.status_code()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
    assert_eq!(harness.router.calls(), 2);

    // One debit landed, once.
    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "balance_remaining"), dec!(4.991));

    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/transactions"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let transactions: Vec<serde_json::Value> = response.json();
    assert_eq!(transactions.len(), 2); // purchase + one debit

    // Only the winner recorded the usage event.
    let response = harness
        .server
        .get(&format!("/v1/usage?account_id={account_id}"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let summary: serde_json::Value = response.json();
    assert_eq!(summary["calls"], 1);
}

#[tokio::test]
async fn quota_check_reports_remaining() {
    let mut config = test_config();
    config.quota_call_limit = Some(2);
    let harness = TestHarness::with_parts(config, Arc::new(FixedRouter::succeeding(1000, 500)));
    let account_id = AccountId::generate();
    harness.credit_account(&account_id, "1").await;

    let first: serde_json::Value = harness
        .server
        .post("/v1/quota/check")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({ "account_id": account_id.to_string() }))
        .await
        .json();
    assert_eq!(first["allowed"], true);
    assert_eq!(first["used"], 1);
    assert_eq!(first["limit"], 2);
    assert_eq!(first["remaining"], 1);

    let second: serde_json::Value = harness
        .server
        .post("/v1/quota/check")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({ "account_id": account_id.to_string() }))
        .await
        .json();
    assert_eq!(second["remaining"], 0);

    let third: serde_json::Value = harness
        .server
        .post("/v1/quota/check")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({ "account_id": account_id.to_string() }))
        .await
        .json();
    assert_eq!(third["allowed"], false);
    assert_eq!(third["used"], 2);
    assert_eq!(third["remaining"], 0);
}

#[tokio::test]
async fn disabled_model_no_longer_resolves() {
    let harness = TestHarness::new();
    harness.put_model(&enterprise_model()).await;
    let account_id = enterprise_account(&harness, "5.00").await;

    harness
        .server
        .post("/v1/catalog/models/atlas-large/disable")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = harness
        .server
        .post("/v1/calls")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "request_id": "req-disabled",
            "account_id": account_id.to_string(),
            "model_id": "atlas-large"
        }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(harness.router.calls(), 0);
}
