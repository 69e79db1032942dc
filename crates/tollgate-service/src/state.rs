//! Application state.

use std::sync::Arc;

use tollgate_store::RocksStore;

use crate::config::ServiceConfig;
use crate::router::InferenceRouter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// The external inference router.
    pub router: Arc<dyn InferenceRouter>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: Arc<RocksStore>,
        config: ServiceConfig,
        router: Arc<dyn InferenceRouter>,
    ) -> Self {
        Self {
            store,
            config,
            router,
        }
    }
}
