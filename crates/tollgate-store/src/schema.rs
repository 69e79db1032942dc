//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Individual account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Organization records, keyed by `org_id`.
    pub const ORGANIZATIONS: &str = "organizations";

    /// Membership rows, keyed by `org_id || member_id`.
    pub const MEMBERSHIPS: &str = "memberships";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by subject, keyed by
    /// `subject_tag || subject_id || transaction_id`. Value is empty.
    pub const TRANSACTIONS_BY_SUBJECT: &str = "transactions_by_subject";

    /// Model catalog entries, keyed by `model_id`.
    pub const CATALOG: &str = "catalog";

    /// Quota counters, keyed by `account_id`.
    pub const QUOTA: &str = "quota";

    /// Usage records, keyed by `event_id`.
    pub const USAGE_RECORDS: &str = "usage_records";

    /// Index: usage by account, keyed by `account_id || event_id`.
    /// Value is empty.
    pub const USAGE_BY_ACCOUNT: &str = "usage_by_account";

    /// Applied idempotency keys, keyed by the caller-supplied key.
    /// Value is the resulting transaction id.
    pub const IDEMPOTENCY: &str = "idempotency";

    /// BYOK credential markers, keyed by `account_id || provider`.
    pub const BYOK_CREDENTIALS: &str = "byok_credentials";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ORGANIZATIONS,
        cf::MEMBERSHIPS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_SUBJECT,
        cf::CATALOG,
        cf::QUOTA,
        cf::USAGE_RECORDS,
        cf::USAGE_BY_ACCOUNT,
        cf::IDEMPOTENCY,
        cf::BYOK_CREDENTIALS,
    ]
}
