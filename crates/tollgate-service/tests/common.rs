//! Shared test harness.

#![allow(dead_code)] // each test binary compiles its own copy

use std::sync::Arc;

use axum_test::TestServer;
use rust_decimal::Decimal;
use tempfile::TempDir;

use tollgate_core::AccountId;
use tollgate_service::{create_router, AppState, FixedRouter, ServiceConfig};
use tollgate_store::RocksStore;

/// A running service instance against a temporary database.
pub struct TestHarness {
    /// The in-process test server.
    pub server: TestServer,
    /// Valid service API key.
    pub service_api_key: String,
    /// Valid admin API key.
    pub admin_api_key: String,
    /// The router test double, for dispatch-count assertions.
    pub router: Arc<FixedRouter>,
    /// Direct store handle for state assertions.
    pub store: Arc<RocksStore>,
    _data_dir: TempDir,
}

impl TestHarness {
    /// Harness with a router that always succeeds with 1000 input and
    /// 500 output tokens.
    pub fn new() -> Self {
        Self::with_parts(test_config(), Arc::new(FixedRouter::succeeding(1000, 500)))
    }

    /// Harness with a custom router.
    pub fn with_router(router: Arc<FixedRouter>) -> Self {
        Self::with_parts(test_config(), router)
    }

    /// Harness with custom config and router.
    pub fn with_parts(config: ServiceConfig, router: Arc<FixedRouter>) -> Self {
        let data_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(RocksStore::open(data_dir.path()).expect("open store"));

        let service_api_key = config.service_api_key.clone().expect("service key set");
        let admin_api_key = config.admin_api_key.clone().expect("admin key set");

        let state = AppState::new(Arc::clone(&store), config, router.clone());
        let server = TestServer::new(create_router(state)).expect("start test server");

        Self {
            server,
            service_api_key,
            admin_api_key,
            router,
            store,
            _data_dir: data_dir,
        }
    }

    /// Credit an account through the admin endpoint, creating it on
    /// first purchase.
    pub async fn credit_account(&self, account_id: &AccountId, amount: &str) {
        self.server
            .post(&format!("/v1/accounts/{account_id}/credit"))
            .add_header("x-admin-key", &self.admin_api_key)
            .json(&serde_json::json!({ "amount": amount }))
            .await
            .assert_status_ok();
    }

    /// Change an account's tier through the admin endpoint.
    pub async fn set_tier(&self, account_id: &AccountId, tier: &str) {
        self.server
            .post(&format!("/v1/accounts/{account_id}/tier"))
            .add_header("x-admin-key", &self.admin_api_key)
            .json(&serde_json::json!({ "tier": tier }))
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);
    }

    /// Create a catalog entry through the admin endpoint.
    pub async fn put_model(&self, entry: &serde_json::Value) {
        self.server
            .post("/v1/catalog/models")
            .add_header("x-admin-key", &self.admin_api_key)
            .json(entry)
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }
}

/// Config with both API keys set and test-friendly defaults.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        service_api_key: Some("test-service-key".into()),
        admin_api_key: Some("test-admin-key".into()),
        ..ServiceConfig::default()
    }
}

/// Parse a JSON field (string-serialized decimal) into a `Decimal`.
pub fn decimal_field(body: &serde_json::Value, field: &str) -> Decimal {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("field {field} missing or not a string: {body}"))
        .parse()
        .expect("valid decimal")
}
