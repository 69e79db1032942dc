//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use rust_decimal::Decimal;

use tollgate_core::error::ensure_positive;
use tollgate_core::{
    Account, AccountId, CreditKind, LedgerError, LedgerSubject, LedgerTransaction,
    ModelCatalogEntry, Organization, OrganizationMembership, OrgId, QuotaCounter, Tier,
    TransactionId, TxnContext, UsageFilter, UsageRecord, UsageSummary,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::{lock, LockRegistry};
use crate::schema::{all_column_families, cf};
use crate::{BalanceChange, ConsumeOutcome, MemberAttribution, QuotaDecision, Store};

/// RocksDB-backed storage implementation.
///
/// All compound mutations run inside a per-key critical section from
/// the lock registry and commit through a single `WriteBatch`.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    locks: LockRegistry,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            path = %path.as_ref().display(),
            column_families = all_column_families().len(),
            "RocksDB store opened"
        );

        Ok(Self {
            db: Arc::new(db),
            locks: LockRegistry::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_cf_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_cf_value<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let data = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, data)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Fetch an account, treating soft-deactivated records as absent
    /// for mutation purposes.
    fn active_account(&self, account_id: &AccountId) -> Result<Account> {
        match self.get_account(account_id)? {
            Some(account) if !account.deactivated => Ok(account),
            _ => Err(LedgerError::AccountNotFound {
                account_id: account_id.to_string(),
            }
            .into()),
        }
    }

    fn require_organization(&self, org_id: &OrgId) -> Result<Organization> {
        self.get_organization(org_id)?
            .ok_or_else(|| {
                LedgerError::OrganizationNotFound {
                    org_id: org_id.to_string(),
                }
                .into()
            })
    }

    /// Reject an already-applied idempotency key.
    fn check_idempotency(&self, idempotency_key: Option<&str>) -> Result<()> {
        let Some(key) = idempotency_key else {
            return Ok(());
        };
        let cf = self.cf(cf::IDEMPOTENCY)?;
        let seen = self
            .db
            .get_cf(&cf, keys::idempotency_key(key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if seen {
            return Err(LedgerError::DuplicateTransaction {
                idempotency_key: key.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Append the ledger transaction and its subject index entry to a
    /// batch, plus the idempotency marker when present.
    fn stage_transaction(
        &self,
        batch: &mut WriteBatch,
        tx: &LedgerTransaction,
        idempotency_key: Option<&str>,
    ) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_index = self.cf(cf::TRANSACTIONS_BY_SUBJECT)?;

        batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), Self::serialize(tx)?);
        batch.put_cf(
            &cf_index,
            keys::subject_transaction_key(&tx.subject, &tx.id),
            [],
        );

        if let Some(key) = idempotency_key {
            let cf_idem = self.cf(cf::IDEMPOTENCY)?;
            batch.put_cf(&cf_idem, keys::idempotency_key(key), tx.id.to_string());
        }
        Ok(())
    }

    /// Iterate all membership rows of an organization.
    fn memberships_of(&self, org_id: &OrgId) -> Result<Vec<OrganizationMembership>> {
        let cf = self.cf(cf::MEMBERSHIPS)?;
        let prefix = keys::org_memberships_prefix(org_id);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut memberships = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            memberships.push(Self::deserialize(&value)?);
        }
        Ok(memberships)
    }

    /// Persist a quota counter (used by tests to set up expired
    /// periods).
    pub(crate) fn put_quota_counter(&self, counter: &QuotaCounter) -> Result<()> {
        self.put_cf_value(cf::QUOTA, &keys::quota_key(&counter.account_id), counter)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Accounts
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        self.put_cf_value(cf::ACCOUNTS, &keys::account_key(&account.id), account)
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get_cf_value(cf::ACCOUNTS, &keys::account_key(account_id))
    }

    fn deactivate_account(&self, account_id: &AccountId) -> Result<()> {
        let key = keys::account_key(account_id);
        let handle = self.locks.handle(&key);
        let _guard = lock(&handle);

        let mut account = self.active_account(account_id)?;
        account.deactivated = true;
        account.updated_at = Utc::now();
        self.put_account(&account)
    }

    fn set_account_tier(&self, account_id: &AccountId, tier: Tier) -> Result<()> {
        let key = keys::account_key(account_id);
        let handle = self.locks.handle(&key);
        let _guard = lock(&handle);

        let mut account = self.active_account(account_id)?;
        account.tier = tier;
        account.updated_at = Utc::now();
        self.put_account(&account)
    }

    fn debit(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<BalanceChange> {
        ensure_positive(amount)?;

        let key = keys::account_key(account_id);
        let handle = self.locks.handle(&key);
        let _guard = lock(&handle);

        // Inside the critical section: a concurrent replay of the
        // same key settles exactly one debit.
        self.check_idempotency(idempotency_key)?;

        let mut account = self.active_account(account_id)?;
        if account.balance_remaining < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: account.balance_remaining,
                required: amount,
            }
            .into());
        }

        account.balance_remaining -= amount;
        account.updated_at = Utc::now();

        let tx = LedgerTransaction::debit(*account_id, amount, account.balance_remaining, ctx);

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, &key, Self::serialize(&account)?);
        self.stage_transaction(&mut batch, &tx, idempotency_key)?;
        self.write_batch(batch)?;

        Ok(BalanceChange {
            new_balance: account.balance_remaining,
            transaction_id: tx.id,
        })
    }

    fn credit(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        kind: CreditKind,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<BalanceChange> {
        ensure_positive(amount)?;

        let key = keys::account_key(account_id);
        let handle = self.locks.handle(&key);
        let _guard = lock(&handle);

        self.check_idempotency(idempotency_key)?;

        // First-purchase case: the account record is created on first
        // billable activity.
        let mut account = match self.get_account(account_id)? {
            Some(account) if account.deactivated => {
                return Err(LedgerError::AccountNotFound {
                    account_id: account_id.to_string(),
                }
                .into());
            }
            Some(account) => account,
            None => {
                tracing::debug!(%account_id, "Account record created on first credit");
                Account::new(*account_id, Tier::Trial)
            }
        };

        account.balance_remaining += amount;
        if kind == CreditKind::Purchase {
            account.lifetime_purchased += amount;
        }
        account.updated_at = Utc::now();

        let tx = LedgerTransaction::credit(
            *account_id,
            amount,
            kind,
            account.balance_remaining,
            ctx,
        );

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, &key, Self::serialize(&account)?);
        self.stage_transaction(&mut batch, &tx, idempotency_key)?;
        self.write_batch(batch)?;

        Ok(BalanceChange {
            new_balance: account.balance_remaining,
            transaction_id: tx.id,
        })
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<LedgerTransaction>> {
        self.get_cf_value(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn list_transactions(
        &self,
        subject: &LedgerSubject,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        let cf_index = self.cf(cf::TRANSACTIONS_BY_SUBJECT)?;
        let prefix = keys::subject_prefix(subject);

        let iter = self
            .db
            .iterator_cf(&cf_index, IteratorMode::From(&prefix, Direction::Forward));

        // ULIDs are time-ordered; collect then reverse for newest
        // first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }
        all_keys.reverse();

        let mut transactions = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let tx_id = keys::extract_transaction_id_from_subject_key(&key);
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    // =========================================================================
    // Organizations & allocations
    // =========================================================================

    fn put_organization(&self, org: &Organization) -> Result<()> {
        self.put_cf_value(cf::ORGANIZATIONS, &keys::org_key(&org.id), org)
    }

    fn get_organization(&self, org_id: &OrgId) -> Result<Option<Organization>> {
        self.get_cf_value(cf::ORGANIZATIONS, &keys::org_key(org_id))
    }

    fn credit_pool(
        &self,
        org_id: &OrgId,
        amount: Decimal,
        kind: CreditKind,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<BalanceChange> {
        ensure_positive(amount)?;

        let key = keys::org_key(org_id);
        let handle = self.locks.handle(&key);
        let _guard = lock(&handle);

        self.check_idempotency(idempotency_key)?;

        let mut org = self.require_organization(org_id)?;
        org.pool_balance_remaining += amount;
        if kind == CreditKind::Purchase {
            org.pool_lifetime_purchased += amount;
        }
        org.updated_at = Utc::now();

        let tx =
            LedgerTransaction::pool_credit(*org_id, amount, kind, org.pool_balance_remaining, ctx);

        let cf_orgs = self.cf(cf::ORGANIZATIONS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_orgs, &key, Self::serialize(&org)?);
        self.stage_transaction(&mut batch, &tx, idempotency_key)?;
        self.write_batch(batch)?;

        Ok(BalanceChange {
            new_balance: org.pool_balance_remaining,
            transaction_id: tx.id,
        })
    }

    fn allocate(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
        amount: Decimal,
    ) -> Result<OrganizationMembership> {
        ensure_positive(amount)?;

        let org_lock_key = keys::org_key(org_id);
        let handle = self.locks.handle(&org_lock_key);
        let _guard = lock(&handle);

        let org = self.require_organization(org_id)?;

        // An allocation is a promise against pooled funds: the sum of
        // all allocations may never exceed what was ever purchased
        // into the pool.
        let allocated_sum: Decimal = self
            .memberships_of(org_id)?
            .iter()
            .map(|m| m.allocated_amount)
            .sum();
        if allocated_sum + amount > org.pool_lifetime_purchased {
            return Err(LedgerError::InvalidAmount(format!(
                "allocation of {amount} exceeds unallocated pool ({} of {} already allocated)",
                allocated_sum, org.pool_lifetime_purchased
            ))
            .into());
        }

        let membership_key = keys::membership_key(org_id, member_id);
        let mut membership: OrganizationMembership = self
            .get_cf_value(cf::MEMBERSHIPS, &membership_key)?
            .unwrap_or_else(|| {
                OrganizationMembership::new(*org_id, *member_id, Decimal::ZERO)
            });
        membership.allocated_amount += amount;
        membership.updated_at = Utc::now();

        self.put_cf_value(cf::MEMBERSHIPS, &membership_key, &membership)?;
        Ok(membership)
    }

    fn get_membership(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
    ) -> Result<Option<OrganizationMembership>> {
        self.get_cf_value(cf::MEMBERSHIPS, &keys::membership_key(org_id, member_id))
    }

    fn consume_from_allocation(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
        amount: Decimal,
        ctx: TxnContext,
        idempotency_key: Option<&str>,
    ) -> Result<ConsumeOutcome> {
        ensure_positive(amount)?;

        let org_key = keys::org_key(org_id);
        let handle = self.locks.handle(&org_key);
        let _guard = lock(&handle);

        self.check_idempotency(idempotency_key)?;

        let mut org = self.require_organization(org_id)?;
        let membership_key = keys::membership_key(org_id, member_id);
        let mut membership: OrganizationMembership = self
            .get_cf_value(cf::MEMBERSHIPS, &membership_key)?
            .ok_or_else(|| LedgerError::MembershipNotFound {
                org_id: org_id.to_string(),
                member_id: member_id.to_string(),
            })?;

        // The allocation is a hard per-member ceiling, checked before
        // the pool so exhaustion is reported even when the pool still
        // holds funds.
        let remaining = membership.allocated_remaining();
        if remaining < amount {
            return Err(LedgerError::AllocationExhausted {
                remaining,
                required: amount,
            }
            .into());
        }
        if org.pool_balance_remaining < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: org.pool_balance_remaining,
                required: amount,
            }
            .into());
        }

        membership.consumed_amount += amount;
        membership.updated_at = Utc::now();
        org.pool_balance_remaining -= amount;
        org.updated_at = Utc::now();

        let tx = LedgerTransaction::allocation_consume(
            *org_id,
            *member_id,
            amount,
            org.pool_balance_remaining,
            ctx,
        );

        // Both decrements and the ledger row commit in one batch;
        // either all three land or none do.
        let cf_orgs = self.cf(cf::ORGANIZATIONS)?;
        let cf_memberships = self.cf(cf::MEMBERSHIPS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_orgs, &org_key, Self::serialize(&org)?);
        batch.put_cf(&cf_memberships, &membership_key, Self::serialize(&membership)?);
        self.stage_transaction(&mut batch, &tx, idempotency_key)?;
        self.write_batch(batch)?;

        Ok(ConsumeOutcome {
            pool_remaining: org.pool_balance_remaining,
            allocated_remaining: membership.allocated_remaining(),
            transaction_id: tx.id,
        })
    }

    fn note_allocation_usage(
        &self,
        org_id: &OrgId,
        member_id: &AccountId,
        amount: Decimal,
    ) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }

        let org_key = keys::org_key(org_id);
        let handle = self.locks.handle(&org_key);
        let _guard = lock(&handle);

        let membership_key = keys::membership_key(org_id, member_id);
        let mut membership: OrganizationMembership = self
            .get_cf_value(cf::MEMBERSHIPS, &membership_key)?
            .ok_or_else(|| LedgerError::MembershipNotFound {
                org_id: org_id.to_string(),
                member_id: member_id.to_string(),
            })?;

        membership.consumed_amount += amount;
        membership.updated_at = Utc::now();
        self.put_cf_value(cf::MEMBERSHIPS, &membership_key, &membership)
    }

    fn get_attribution(&self, org_id: &OrgId) -> Result<Vec<MemberAttribution>> {
        Ok(self
            .memberships_of(org_id)?
            .into_iter()
            .map(|m| MemberAttribution {
                member_id: m.member_id,
                allocated: m.allocated_amount,
                consumed: m.consumed_amount,
            })
            .collect())
    }

    // =========================================================================
    // Model catalog
    // =========================================================================

    fn put_model(&self, entry: &ModelCatalogEntry) -> Result<()> {
        self.put_cf_value(cf::CATALOG, &keys::model_key(&entry.model_id), entry)
    }

    fn get_model(&self, model_id: &str) -> Result<Option<ModelCatalogEntry>> {
        self.get_cf_value(cf::CATALOG, &keys::model_key(model_id))
    }

    fn list_models(&self) -> Result<Vec<ModelCatalogEntry>> {
        let cf = self.cf(cf::CATALOG)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            entries.push(Self::deserialize(&value)?);
        }
        Ok(entries)
    }

    fn list_available_models(&self, tier: Tier) -> Result<Vec<ModelCatalogEntry>> {
        Ok(self
            .list_models()?
            .into_iter()
            .filter(|entry| entry.available_to(tier))
            .collect())
    }

    fn set_model_deprecated(
        &self,
        model_id: &str,
        deprecated: bool,
        replacement_model_id: Option<String>,
    ) -> Result<()> {
        let mut entry = self.get_model(model_id)?.ok_or_else(|| {
            LedgerError::ModelNotFound {
                model_id: model_id.to_string(),
            }
        })?;
        entry.deprecated = deprecated;
        entry.replacement_model_id = replacement_model_id;
        self.put_model(&entry)
    }

    fn set_model_disabled(&self, model_id: &str, disabled: bool) -> Result<()> {
        let mut entry = self.get_model(model_id)?.ok_or_else(|| {
            LedgerError::ModelNotFound {
                model_id: model_id.to_string(),
            }
        })?;
        entry.disabled = disabled;
        self.put_model(&entry)
    }

    // =========================================================================
    // Quota
    // =========================================================================

    fn check_and_increment_quota(
        &self,
        account_id: &AccountId,
        default_limit: u32,
        period_days: i64,
    ) -> Result<QuotaDecision> {
        let key = keys::quota_key(account_id);
        let handle = self.locks.handle(&key);
        let _guard = lock(&handle);

        let now = Utc::now();
        let mut counter: QuotaCounter = self
            .get_cf_value(cf::QUOTA, &key)?
            .unwrap_or_else(|| QuotaCounter::new(*account_id, default_limit, period_days, now));

        counter.roll_if_expired(now, period_days);
        // The ceiling follows the caller's current tier, so tier
        // changes take effect mid-period.
        counter.calls_limit = default_limit;

        if counter.is_exhausted() {
            return Ok(QuotaDecision {
                allowed: false,
                used: counter.calls_used,
                limit: counter.calls_limit,
                remaining: counter.remaining(),
                resets_at: counter.period_end,
            });
        }

        counter.calls_used += 1;
        self.put_quota_counter(&counter)?;

        Ok(QuotaDecision {
            allowed: true,
            used: counter.calls_used,
            limit: counter.calls_limit,
            remaining: counter.remaining(),
            resets_at: counter.period_end,
        })
    }

    fn get_quota(
        &self,
        account_id: &AccountId,
        default_limit: u32,
        period_days: i64,
    ) -> Result<QuotaCounter> {
        let now = Utc::now();
        let mut counter: QuotaCounter = self
            .get_cf_value(cf::QUOTA, &keys::quota_key(account_id))?
            .unwrap_or_else(|| QuotaCounter::new(*account_id, default_limit, period_days, now));
        counter.roll_if_expired(now, period_days);
        Ok(counter)
    }

    // =========================================================================
    // Usage
    // =========================================================================

    fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        let cf_usage = self.cf(cf::USAGE_RECORDS)?;
        let key = keys::usage_key(&record.event_id);

        let exists = self
            .db
            .get_cf(&cf_usage, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Err(LedgerError::DuplicateTransaction {
                idempotency_key: record.event_id.clone(),
            }
            .into());
        }

        let cf_index = self.cf(cf::USAGE_BY_ACCOUNT)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_usage, &key, Self::serialize(record)?);
        batch.put_cf(
            &cf_index,
            keys::usage_by_account_key(&record.account_id, &record.event_id),
            [],
        );
        self.write_batch(batch)
    }

    fn usage_exists(&self, event_id: &str) -> Result<bool> {
        let cf_usage = self.cf(cf::USAGE_RECORDS)?;
        Ok(self
            .db
            .get_cf(&cf_usage, keys::usage_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some())
    }

    fn query_usage(&self, filter: &UsageFilter) -> Result<UsageSummary> {
        let mut summary = UsageSummary::default();
        for record in self.list_usage(filter, usize::MAX)? {
            summary.accumulate(&record);
        }
        Ok(summary)
    }

    fn list_usage(&self, filter: &UsageFilter, limit: usize) -> Result<Vec<UsageRecord>> {
        let mut records = Vec::new();

        if let Some(account_id) = filter.account_id {
            // Narrow scan through the per-account index.
            let cf_index = self.cf(cf::USAGE_BY_ACCOUNT)?;
            let prefix = account_id.as_bytes().to_vec();
            let iter = self
                .db
                .iterator_cf(&cf_index, IteratorMode::From(&prefix, Direction::Forward));

            for item in iter {
                let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                if !key.starts_with(&prefix) {
                    break;
                }
                if records.len() >= limit {
                    break;
                }
                let event_key = keys::extract_event_id_from_usage_key(&key);
                if let Some(record) =
                    self.get_cf_value::<UsageRecord>(cf::USAGE_RECORDS, &event_key)?
                {
                    if filter.matches(&record) {
                        records.push(record);
                    }
                }
            }
        } else {
            let cf_usage = self.cf(cf::USAGE_RECORDS)?;
            for item in self.db.iterator_cf(&cf_usage, IteratorMode::Start) {
                let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                if records.len() >= limit {
                    break;
                }
                let record: UsageRecord = Self::deserialize(&value)?;
                if filter.matches(&record) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    // =========================================================================
    // BYOK credentials
    // =========================================================================

    fn put_byok_credential(&self, account_id: &AccountId, provider: &str) -> Result<()> {
        self.put_cf_value(
            cf::BYOK_CREDENTIALS,
            &keys::byok_key(account_id, provider),
            &Utc::now(),
        )
    }

    fn remove_byok_credential(&self, account_id: &AccountId, provider: &str) -> Result<()> {
        let cf = self.cf(cf::BYOK_CREDENTIALS)?;
        self.db
            .delete_cf(&cf, keys::byok_key(account_id, provider))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn has_byok_credential(&self, account_id: &AccountId, provider: &str) -> Result<bool> {
        let cf = self.cf(cf::BYOK_CREDENTIALS)?;
        let exists = self
            .db
            .get_cf(&cf, keys::byok_key(account_id, provider))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        Ok(exists)
    }
}
