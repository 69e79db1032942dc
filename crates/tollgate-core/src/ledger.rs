//! Ledger transaction types.
//!
//! Every balance mutation appends exactly one `LedgerTransaction`.
//! Rows are immutable; corrections are new reversal rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, OrgId, TransactionId};

/// The balance a ledger transaction applies to: an individual account
/// or an organization pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum LedgerSubject {
    /// An individual account balance.
    Account(AccountId),

    /// An organization pool balance.
    Org(OrgId),
}

impl LedgerSubject {
    /// Render the subject id as a string.
    #[must_use]
    pub fn id_string(&self) -> String {
        match self {
            Self::Account(id) => id.to_string(),
            Self::Org(id) => id.to_string(),
        }
    }
}

/// What kind of balance mutation a transaction records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    /// Settlement debit for a metered call.
    Debit,

    /// Balance increase.
    Credit {
        /// Why the balance increased.
        kind: CreditKind,
    },

    /// Paired pool + member-allocation decrement.
    AllocationConsume {
        /// The member whose allocation was consumed.
        member_id: AccountId,
    },

    /// Correction of an earlier row.
    Reversal {
        /// The transaction being reversed.
        reverses: TransactionId,
    },
}

/// Why credits were added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    /// Completed purchase (bumps lifetime purchased).
    Purchase,

    /// Promotional or administrative grant.
    Grant,

    /// Refund issued.
    Refund,
}

/// Correlation metadata carried on a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnContext {
    /// Upstream provider, when the transaction settles a call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model id, when the transaction settles a call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Caller-supplied request id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl TxnContext {
    /// Context for a metered-call settlement.
    #[must_use]
    pub fn for_call(provider: &str, model: &str, request_id: &str) -> Self {
        Self {
            provider: Some(provider.to_string()),
            model: Some(model.to_string()),
            request_id: Some(request_id.to_string()),
        }
    }
}

/// An immutable, append-only record of one balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Transaction id (ULID, time-ordered).
    pub id: TransactionId,

    /// Whose balance changed.
    pub subject: LedgerSubject,

    /// Signed amount: positive for credits, negative for debits.
    pub amount: Decimal,

    /// Kind of mutation.
    pub kind: TransactionKind,

    /// Balance of the subject after this transaction.
    pub resulting_balance: Decimal,

    /// Correlation metadata.
    pub context: TxnContext,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Record a settlement debit against an individual account.
    #[must_use]
    pub fn debit(
        account_id: AccountId,
        amount: Decimal,
        resulting_balance: Decimal,
        context: TxnContext,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            subject: LedgerSubject::Account(account_id),
            amount: -amount.abs(),
            kind: TransactionKind::Debit,
            resulting_balance,
            context,
            created_at: Utc::now(),
        }
    }

    /// Record a credit against an individual account.
    #[must_use]
    pub fn credit(
        account_id: AccountId,
        amount: Decimal,
        kind: CreditKind,
        resulting_balance: Decimal,
        context: TxnContext,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            subject: LedgerSubject::Account(account_id),
            amount: amount.abs(),
            kind: TransactionKind::Credit { kind },
            resulting_balance,
            context,
            created_at: Utc::now(),
        }
    }

    /// Record a credit into an organization pool.
    #[must_use]
    pub fn pool_credit(
        org_id: OrgId,
        amount: Decimal,
        kind: CreditKind,
        resulting_balance: Decimal,
        context: TxnContext,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            subject: LedgerSubject::Org(org_id),
            amount: amount.abs(),
            kind: TransactionKind::Credit { kind },
            resulting_balance,
            context,
            created_at: Utc::now(),
        }
    }

    /// Record a paired pool/allocation consume.
    #[must_use]
    pub fn allocation_consume(
        org_id: OrgId,
        member_id: AccountId,
        amount: Decimal,
        resulting_pool_balance: Decimal,
        context: TxnContext,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            subject: LedgerSubject::Org(org_id),
            amount: -amount.abs(),
            kind: TransactionKind::AllocationConsume { member_id },
            resulting_balance: resulting_pool_balance,
            context,
            created_at: Utc::now(),
        }
    }

    /// Whether this transaction increased the subject's balance.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}
