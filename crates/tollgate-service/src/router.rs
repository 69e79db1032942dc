//! The inference router seam.
//!
//! Routing to upstream model providers is implemented externally; the
//! ledger only needs the confirmed token counts back. No ledger lock
//! is ever held across this call.

use async_trait::async_trait;

/// A dispatch request handed to the external router.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Model id resolved from the catalog.
    pub model_id: String,

    /// Upstream provider for the model.
    pub provider: String,

    /// Whether the caller's own provider credential should be used.
    pub byok: bool,

    /// Opaque inference payload, passed through untouched.
    pub payload: serde_json::Value,
}

/// Confirmed usage from a completed upstream call.
#[derive(Debug, Clone, Copy)]
pub struct RouteOutcome {
    /// Confirmed input tokens.
    pub tokens_in: u64,

    /// Confirmed output tokens.
    pub tokens_out: u64,
}

/// Errors from the upstream router.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    /// The upstream provider returned an error.
    #[error("upstream provider error: {0}")]
    Upstream(String),

    /// The upstream call timed out before completion.
    #[error("upstream call timed out")]
    Timeout,

    /// No router is available for this deployment.
    #[error("inference routing is not available")]
    Unavailable,
}

impl RouterError {
    /// Stable machine-readable code, recorded on failed usage events.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "upstream_error",
            Self::Timeout => "upstream_timeout",
            Self::Unavailable => "router_unavailable",
        }
    }
}

/// Dispatches inference calls to upstream providers.
#[async_trait]
pub trait InferenceRouter: Send + Sync {
    /// Route one call and return its confirmed token usage.
    ///
    /// # Errors
    ///
    /// Returns a `RouterError` when the upstream call does not reach
    /// confirmed completion; the caller must not settle any charge.
    async fn route(&self, request: RouteRequest) -> Result<RouteOutcome, RouterError>;
}

/// Router used when no upstream integration is configured. Every call
/// fails with `Unavailable` before any charge is settled.
#[derive(Debug, Default)]
pub struct DisabledRouter;

#[async_trait]
impl InferenceRouter for DisabledRouter {
    async fn route(&self, request: RouteRequest) -> Result<RouteOutcome, RouterError> {
        tracing::warn!(model = %request.model_id, "No inference router configured");
        Err(RouterError::Unavailable)
    }
}

/// Test double returning a fixed outcome and counting dispatches.
#[derive(Debug)]
pub struct FixedRouter {
    outcome: Result<RouteOutcome, RouterError>,
    delay: std::time::Duration,
    calls: std::sync::atomic::AtomicU32,
}

impl FixedRouter {
    /// A router whose calls all succeed with the given token counts.
    #[must_use]
    pub fn succeeding(tokens_in: u64, tokens_out: u64) -> Self {
        Self {
            outcome: Ok(RouteOutcome {
                tokens_in,
                tokens_out,
            }),
            delay: std::time::Duration::ZERO,
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// A succeeding router that holds each dispatch in flight for
    /// `delay` before confirming, so callers can overlap requests.
    #[must_use]
    pub fn succeeding_after(tokens_in: u64, tokens_out: u64, delay: std::time::Duration) -> Self {
        Self {
            delay,
            ..Self::succeeding(tokens_in, tokens_out)
        }
    }

    /// A router whose calls all fail with the given error.
    #[must_use]
    pub fn failing(error: RouterError) -> Self {
        Self {
            outcome: Err(error),
            delay: std::time::Duration::ZERO,
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// How many dispatches reached this router.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceRouter for FixedRouter {
    async fn route(&self, _request: RouteRequest) -> Result<RouteOutcome, RouterError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}
