//! Usage records and reporting rollups.
//!
//! The usage log is the durable record of every metered event, billed
//! or bypassed. It records outcomes; it never decides them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, OrgId};
use crate::tier::Tier;

/// One metered event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique event id for idempotency.
    pub event_id: String,

    /// The calling account.
    pub account_id: AccountId,

    /// The organization the call was billed against, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<OrgId>,

    /// Upstream provider.
    pub provider: String,

    /// Model id.
    pub model: String,

    /// Caller's tier at the time of the call.
    pub tier: Tier,

    /// Confirmed input tokens.
    pub tokens_in: u64,

    /// Confirmed output tokens.
    pub tokens_out: u64,

    /// Credits actually charged (zero for BYOK and failed calls).
    pub cost_charged: Decimal,

    /// Whether the caller's own provider credential was used.
    pub byok_used: bool,

    /// Upstream round-trip latency in milliseconds.
    pub latency_ms: u64,

    /// Whether the upstream call completed.
    pub success: bool,

    /// Machine-readable error code for failed calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Filters for usage queries. All fields are conjunctive; `None`
/// matches everything.
#[derive(Debug, Clone, Default)]
pub struct UsageFilter {
    /// Restrict to one account.
    pub account_id: Option<AccountId>,

    /// Restrict to one organization.
    pub org_id: Option<OrgId>,

    /// Inclusive lower bound on record time.
    pub from: Option<DateTime<Utc>>,

    /// Exclusive upper bound on record time.
    pub until: Option<DateTime<Utc>>,
}

impl UsageFilter {
    /// Whether a record passes this filter.
    #[must_use]
    pub fn matches(&self, record: &UsageRecord) -> bool {
        if let Some(account_id) = self.account_id {
            if record.account_id != account_id {
                return false;
            }
        }
        if let Some(org_id) = self.org_id {
            if record.org_id != Some(org_id) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.created_at < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at >= until {
                return false;
            }
        }
        true
    }
}

/// Aggregates over a set of usage records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Number of metered events.
    pub calls: u64,

    /// Number of events that completed upstream.
    pub succeeded: u64,

    /// Total confirmed input tokens.
    pub tokens_in: u64,

    /// Total confirmed output tokens.
    pub tokens_out: u64,

    /// Total credits charged.
    pub cost_charged: Decimal,

    /// Number of events served under BYOK bypass.
    pub byok_calls: u64,
}

impl UsageSummary {
    /// Fold one record into the summary.
    pub fn accumulate(&mut self, record: &UsageRecord) {
        self.calls += 1;
        if record.success {
            self.succeeded += 1;
        }
        self.tokens_in += record.tokens_in;
        self.tokens_out += record.tokens_out;
        self.cost_charged += record.cost_charged;
        if record.byok_used {
            self.byok_calls += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(account_id: AccountId, cost: Decimal, byok: bool) -> UsageRecord {
        UsageRecord {
            event_id: format!("evt-{}", ulid::Ulid::new()),
            account_id,
            org_id: None,
            provider: "anthropic".into(),
            model: "claude-3-5-sonnet".into(),
            tier: Tier::Standard,
            tokens_in: 100,
            tokens_out: 50,
            cost_charged: cost,
            byok_used: byok,
            latency_ms: 42,
            success: true,
            error_kind: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filter_by_account() {
        let target = AccountId::generate();
        let filter = UsageFilter {
            account_id: Some(target),
            ..UsageFilter::default()
        };

        assert!(filter.matches(&record(target, dec!(0.01), false)));
        assert!(!filter.matches(&record(AccountId::generate(), dec!(0.01), false)));
    }

    #[test]
    fn filter_by_date_range() {
        let account = AccountId::generate();
        let mut old = record(account, dec!(0.01), false);
        old.created_at = Utc::now() - chrono::Duration::days(10);

        let filter = UsageFilter {
            from: Some(Utc::now() - chrono::Duration::days(1)),
            ..UsageFilter::default()
        };
        assert!(!filter.matches(&old));
        assert!(filter.matches(&record(account, dec!(0.01), false)));
    }

    #[test]
    fn summary_accumulates_cost_and_byok() {
        let account = AccountId::generate();
        let mut summary = UsageSummary::default();
        summary.accumulate(&record(account, dec!(0.009), false));
        summary.accumulate(&record(account, Decimal::ZERO, true));

        assert_eq!(summary.calls, 2);
        assert_eq!(summary.byok_calls, 1);
        assert_eq!(summary.cost_charged, dec!(0.009));
        assert_eq!(summary.tokens_in, 200);
    }
}
