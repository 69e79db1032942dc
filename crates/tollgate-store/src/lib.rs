//! `RocksDB` storage layer for the tollgate credit ledger.
//!
//! Persistent storage for accounts, organizations, allocations, the
//! append-only transaction ledger, the model catalog, quota counters
//! and the usage log, using `RocksDB` column families with CBOR
//! values.
//!
//! # Atomicity
//!
//! Every compound operation (`debit`, `credit`,
//! `consume_from_allocation`, `check_and_increment_quota`,
//! `record_usage`) validates and writes inside one per-key critical
//! section and commits through a single `WriteBatch`, so a failure
//! and a mutation are mutually exclusive: a caller never observes a
//! half-applied state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod locks;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::{
    Account, AccountId, CreditKind, LedgerSubject, LedgerTransaction, ModelCatalogEntry,
    Organization, OrganizationMembership, OrgId, QuotaCounter, Tier, TransactionId, TxnContext,
    UsageFilter, UsageRecord, UsageSummary,
};

/// Result of a successful debit or credit.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceChange {
    /// Balance after the mutation.
    pub new_balance: Decimal,

    /// The appended ledger transaction.
    pub transaction_id: TransactionId,
}

/// Result of a successful allocation consume.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeOutcome {
    /// Organization pool balance after the consume.
    pub pool_remaining: Decimal,

    /// The member's remaining allocation after the consume.
    pub allocated_remaining: Decimal,

    /// The appended ledger transaction.
    pub transaction_id: TransactionId,
}

/// Outcome of an atomic quota check-and-increment.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaDecision {
    /// Whether the call may proceed. When `false`, nothing was
    /// mutated.
    pub allowed: bool,

    /// Calls used in the current period, including this one when
    /// allowed.
    pub used: u32,

    /// The period's call ceiling.
    pub limit: u32,

    /// Calls left in the period after this decision.
    pub remaining: u32,

    /// When the current period rolls over.
    pub resets_at: DateTime<Utc>,
}

/// One member's row in an organization attribution rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberAttribution {
    /// The member account.
    pub member_id: AccountId,

    /// Total credits allocated to the member.
    pub allocated: Decimal,

    /// Credits the member has consumed.
    pub consumed: Decimal,
}

/// The storage trait defining all database operations.
///
/// Abstracts the storage layer so handlers and the call pipeline can
/// be exercised against alternative implementations.
pub trait Store: Send + Sync {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert or update an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Soft-deactivate an account. The record is retained; further
    /// mutations are rejected.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account doesn't exist.
    fn deactivate_account(&self, account_id: &AccountId) -> Result<()>;

    /// Change an account's tier.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account doesn't exist.
    fn set_account_tier(&self, account_id: &AccountId, tier: Tier) -> Result<()>;

    /// Atomically debit an account and append the ledger row.
    ///
    /// Verifies `balance_remaining >= amount` under the account's
    /// exclusive lock; on failure nothing is written. When
    /// `idempotency_key` is given, a key already applied fails with
    /// `DuplicateTransaction` inside the same critical section, so
    /// concurrent replays settle at most one debit.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for non-positive amounts.
    /// - `AccountNotFound` if the account doesn't exist or is
    ///   deactivated.
    /// - `InsufficientBalance` if the balance can't cover the amount.
    /// - `DuplicateTransaction` on idempotency-key collision.
    fn debit(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<BalanceChange>;

    /// Atomically credit an account and append the ledger row.
    ///
    /// Creates the account (trial tier) if absent — the
    /// first-purchase case. `CreditKind::Purchase` also increments
    /// `lifetime_purchased`. When `idempotency_key` is given and was
    /// already applied, fails with `DuplicateTransaction` and no
    /// mutation.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for non-positive amounts.
    /// - `DuplicateTransaction` on idempotency-key collision.
    fn credit(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        kind: CreditKind,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<BalanceChange>;

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Get a ledger transaction by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<LedgerTransaction>>;

    /// List a subject's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        subject: &LedgerSubject,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerTransaction>>;

    // =========================================================================
    // Organizations & allocations
    // =========================================================================

    /// Insert or update an organization record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_organization(&self, org: &Organization) -> Result<()>;

    /// Get an organization by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_organization(&self, org_id: &OrgId) -> Result<Option<Organization>>;

    /// Atomically credit an organization pool and append the ledger
    /// row. Purchases also raise `pool_lifetime_purchased`.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for non-positive amounts.
    /// - `OrganizationNotFound` if the organization doesn't exist.
    /// - `DuplicateTransaction` on idempotency-key collision.
    fn credit_pool(
        &self,
        org_id: &OrgId,
        amount: Decimal,
        kind: CreditKind,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<BalanceChange>;

    /// Grant `amount` of additional allocation to a member, creating
    /// the membership row if needed.
    ///
    /// Validates that the sum of all members' allocations (including
    /// this grant) stays within `pool_lifetime_purchased`.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for non-positive amounts or when the grant
    ///   would exceed the pool's lifetime purchases.
    /// - `OrganizationNotFound` if the organization doesn't exist.
    fn allocate(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
        amount: Decimal,
    ) -> Result<OrganizationMembership>;

    /// Get a membership row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_membership(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
    ) -> Result<Option<OrganizationMembership>>;

    /// Atomically decrement both the member's allocation and the
    /// organization pool, appending one ledger row — all in a single
    /// write batch. If either check fails, neither write applies.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for non-positive amounts.
    /// - `OrganizationNotFound` / `MembershipNotFound` when rows are
    ///   missing.
    /// - `AllocationExhausted` when the member's remaining allocation
    ///   is insufficient (a hard per-member ceiling, independent of
    ///   pool size).
    /// - `InsufficientBalance` when the pool itself can't cover the
    ///   amount.
    /// - `DuplicateTransaction` on idempotency-key collision.
    fn consume_from_allocation(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
        amount: Decimal,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<ConsumeOutcome>;

    /// Bookkeeping-only bump of a member's consumed amount, without
    /// touching the pool balance or the ledger. Used when BYOK calls
    /// are configured to count against allocations.
    ///
    /// # Errors
    ///
    /// Returns `MembershipNotFound` when no allocation exists.
    fn note_allocation_usage(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
        amount: Decimal,
    ) -> Result<()>;

    /// Read-only attribution rollup for an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_attribution(&self, org_id: &OrgId) -> Result<Vec<MemberAttribution>>;

    // =========================================================================
    // Model catalog
    // =========================================================================

    /// Insert or update a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_model(&self, entry: &ModelCatalogEntry) -> Result<()>;

    /// Get a catalog entry by model id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_model(&self, model_id: &str) -> Result<Option<ModelCatalogEntry>>;

    /// List every catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_models(&self) -> Result<Vec<ModelCatalogEntry>>;

    /// List the entries available to `tier` (exact allow-list
    /// membership, disabled entries excluded).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_available_models(&self, tier: Tier) -> Result<Vec<ModelCatalogEntry>>;

    /// Mark an entry deprecated (advisory) with an optional
    /// replacement. The entry still resolves until disabled.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` if the entry doesn't exist.
    fn set_model_deprecated(
        &self,
        model_id: &str,
        deprecated: bool,
        replacement_model_id: Option<String>,
    ) -> Result<()>;

    /// Enable or disable an entry. Disabled entries resolve for no
    /// tier.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` if the entry doesn't exist.
    fn set_model_disabled(&self, model_id: &str, disabled: bool) -> Result<()>;

    // =========================================================================
    // Quota
    // =========================================================================

    /// Atomically roll the counter if its period has elapsed, check
    /// the limit, and increment — one critical section, never
    /// check-then-separately-increment. At the limit, returns
    /// `allowed: false` without mutating state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn check_and_increment_quota(
        &self,
        account_id: &AccountId,
        default_limit: u32,
        period_days: i64,
    ) -> Result<QuotaDecision>;

    /// Read the counter as of now (rolled view; nothing persisted).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_quota(
        &self,
        account_id: &AccountId,
        default_limit: u32,
        period_days: i64,
    ) -> Result<QuotaCounter>;

    // =========================================================================
    // Usage
    // =========================================================================

    /// Durably record one metered event. Idempotent on `event_id`:
    /// a replay fails with `DuplicateTransaction` and writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTransaction` when the event id was already
    /// recorded.
    fn record_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Whether a usage event with this id has already been recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn usage_exists(&self, event_id: &str) -> Result<bool>;

    /// Aggregate usage matching the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn query_usage(&self, filter: &UsageFilter) -> Result<UsageSummary>;

    /// List raw usage records matching the filter, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_usage(&self, filter: &UsageFilter, limit: usize) -> Result<Vec<UsageRecord>>;

    // =========================================================================
    // BYOK credentials
    // =========================================================================

    /// Register that an account supplies its own credential for a
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_byok_credential(&self, account_id: &AccountId, provider: &str) -> Result<()>;

    /// Remove a registered BYOK credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_byok_credential(&self, account_id: &AccountId, provider: &str) -> Result<()>;

    /// Whether the account supplies its own credential for the
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_byok_credential(&self, account_id: &AccountId, provider: &str) -> Result<bool>;
}
