//! Per-account, per-period call counters.
//!
//! Quota is count-based and enforced independently of credit balance
//! and of the BYOK bypass decision: every metered call increments it,
//! billed or not. Counters reset lazily; a read that discovers the
//! period has elapsed rolls the counter to zero before checking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// A per-account call counter for one billing period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaCounter {
    /// The account being counted.
    pub account_id: AccountId,

    /// When the current period ends.
    pub period_end: DateTime<Utc>,

    /// Calls used in the current period.
    pub calls_used: u32,

    /// Call ceiling for the period.
    pub calls_limit: u32,
}

impl QuotaCounter {
    /// Start a fresh counter for a new period.
    #[must_use]
    pub fn new(
        account_id: AccountId,
        calls_limit: u32,
        period_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id,
            period_end: now + Duration::days(period_days),
            calls_used: 0,
            calls_limit,
        }
    }

    /// Roll the counter to zero if the stored period has elapsed.
    /// Returns `true` if a roll happened.
    pub fn roll_if_expired(&mut self, now: DateTime<Utc>, period_days: i64) -> bool {
        if now < self.period_end {
            return false;
        }
        // Advance period_end past `now` in whole periods so the reset
        // time stays anchored to the original period boundary.
        let period = Duration::days(period_days);
        while self.period_end <= now {
            self.period_end += period;
        }
        self.calls_used = 0;
        true
    }

    /// Whether the limit is already reached.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.calls_used >= self.calls_limit
    }

    /// Calls remaining in the current period.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.calls_limit.saturating_sub(self.calls_used)
    }
}
