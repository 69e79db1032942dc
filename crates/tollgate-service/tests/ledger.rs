//! Account ledger integration tests.

mod common;

use axum::http::StatusCode;
use common::{decimal_field, TestHarness};
use rust_decimal_macros::dec;
use serde_json::json;
use tollgate_core::AccountId;

#[tokio::test]
async fn first_purchase_creates_account() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();

    harness.credit_account(&account_id, "5.00").await;

    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "balance_remaining"), dec!(5.00));
    assert_eq!(decimal_field(&body, "lifetime_purchased"), dec!(5.00));
    assert_eq!(body["tier"], "trial");
    assert_eq!(body["quota"]["calls_used"], 0);
}

#[tokio::test]
async fn admin_debit_and_transaction_history() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();
    harness.credit_account(&account_id, "5.00").await;

    let response = harness
        .server
        .post(&format!("/v1/accounts/{account_id}/debit"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "amount": "0.009" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "new_balance"), dec!(4.991));

    // Newest first: debit on top of the purchase.
    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/transactions"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    response.assert_status_ok();
    let transactions: Vec<serde_json::Value> = response.json();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["kind"]["type"], "debit");
    assert_eq!(decimal_field(&transactions[0], "amount"), dec!(-0.009));
    assert_eq!(transactions[1]["kind"]["type"], "credit");
}

#[tokio::test]
async fn overdraft_is_rejected_with_payment_required() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();
    harness.credit_account(&account_id, "1").await;

    let response = harness
        .server
        .post(&format!("/v1/accounts/{account_id}/debit"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "amount": "2" }))
        .await;
    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_balance");

    // Balance untouched.
    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(decimal_field(&body, "balance_remaining"), dec!(1));
}

#[tokio::test]
async fn replayed_purchase_conflicts() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();

    let credit = json!({ "amount": "50", "idempotency_key": "purchase-1" });
    harness
        .server
        .post(&format!("/v1/accounts/{account_id}/credit"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&credit)
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post(&format!("/v1/accounts/{account_id}/credit"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&credit)
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "duplicate_transaction");
}

#[tokio::test]
async fn non_positive_amounts_are_bad_requests() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();

    let response = harness
        .server
        .post(&format!("/v1/accounts/{account_id}/credit"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "amount": "0" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn unknown_tier_is_rejected() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();
    harness.credit_account(&account_id, "1").await;

    // "gold" is outside the closed tier set; serde rejects it before
    // the handler runs.
    let response = harness
        .server
        .post(&format!("/v1/accounts/{account_id}/tier"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "tier": "gold" }))
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn deactivated_account_rejects_mutations() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();
    harness.credit_account(&account_id, "5").await;

    harness
        .server
        .delete(&format!("/v1/accounts/{account_id}"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = harness
        .server
        .post(&format!("/v1/accounts/{account_id}/debit"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "amount": "1" }))
        .await;
    response.assert_status_not_found();

    // The record survives for audit.
    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["deactivated"], true);
}

#[tokio::test]
async fn missing_service_key_is_unauthorized() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();

    harness
        .server
        .get(&format!("/v1/accounts/{account_id}/balance"))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn service_key_does_not_open_admin_endpoints() {
    let harness = TestHarness::new();
    let account_id = AccountId::generate();

    harness
        .server
        .post(&format!("/v1/accounts/{account_id}/credit"))
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({ "amount": "5" }))
        .await
        .assert_status_unauthorized();
}
