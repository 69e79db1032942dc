//! Key encoding utilities for `RocksDB`.

use tollgate_core::{AccountId, LedgerSubject, OrgId, TransactionId};

/// Tag byte prefixing account subjects in composite keys.
const TAG_ACCOUNT: u8 = 0x01;

/// Tag byte prefixing organization subjects in composite keys.
const TAG_ORG: u8 = 0x02;

/// Create an account key from an account id.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create an organization key from an org id.
#[must_use]
pub fn org_key(org_id: &OrgId) -> Vec<u8> {
    org_id.as_bytes().to_vec()
}

/// Create a membership key.
///
/// Format: `org_id (16 bytes) || member_id (16 bytes)`, so all of an
/// organization's memberships share a prefix.
#[must_use]
pub fn membership_key(org_id: &OrgId, member_id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(org_id.as_bytes());
    key.extend_from_slice(member_id.as_bytes());
    key
}

/// Prefix for iterating all memberships of an organization.
#[must_use]
pub fn org_memberships_prefix(org_id: &OrgId) -> Vec<u8> {
    org_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction id.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Encode a ledger subject as a tagged 17-byte prefix.
#[must_use]
pub fn subject_prefix(subject: &LedgerSubject) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    match subject {
        LedgerSubject::Account(id) => {
            key.push(TAG_ACCOUNT);
            key.extend_from_slice(id.as_bytes());
        }
        LedgerSubject::Org(id) => {
            key.push(TAG_ORG);
            key.extend_from_slice(id.as_bytes());
        }
    }
    key
}

/// Create a subject-transaction index key.
///
/// Format: `subject_tag || subject_id (16) || transaction_id (16)`.
/// ULIDs are time-ordered, so a subject's transactions sort by time.
#[must_use]
pub fn subject_transaction_key(subject: &LedgerSubject, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = subject_prefix(subject);
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Extract the transaction id from a subject-transaction index key.
///
/// # Panics
///
/// Panics if the key is not at least 33 bytes.
#[must_use]
pub fn extract_transaction_id_from_subject_key(key: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[17..33]);
    TransactionId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a catalog key from a model id.
#[must_use]
pub fn model_key(model_id: &str) -> Vec<u8> {
    model_id.as_bytes().to_vec()
}

/// Create a quota counter key from an account id.
#[must_use]
pub fn quota_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a usage record key from an event id.
#[must_use]
pub fn usage_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

/// Create a usage-by-account index key.
#[must_use]
pub fn usage_by_account_key(account_id: &AccountId, event_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + event_id.len());
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(event_id.as_bytes());
    key
}

/// Extract the event id from a usage-by-account index key.
#[must_use]
pub fn extract_event_id_from_usage_key(key: &[u8]) -> Vec<u8> {
    key[16..].to_vec()
}

/// Create an idempotency key entry.
#[must_use]
pub fn idempotency_key(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// Create a BYOK credential key.
#[must_use]
pub fn byok_key(account_id: &AccountId, provider: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + provider.len());
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(provider.as_bytes());
    key
}
