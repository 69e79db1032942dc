//! Account, organization and membership records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, OrgId};
use crate::tier::Tier;

/// An individual credit holder.
///
/// Accounts are created on first billable activity (usually a first
/// purchase) and are never hard-deleted, only soft-deactivated. The
/// balance is mutated exclusively through ledger operations so that
/// every change has a matching `LedgerTransaction` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account id, verified upstream by the identity provider.
    pub id: AccountId,

    /// Current spendable balance. Never negative.
    pub balance_remaining: Decimal,

    /// Lifetime credits purchased.
    pub lifetime_purchased: Decimal,

    /// Subscription tier.
    pub tier: Tier,

    /// Soft-delete flag; a deactivated account rejects mutations.
    pub deactivated: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(id: AccountId, tier: Tier) -> Self {
        let now = Utc::now();
        Self {
            id,
            balance_remaining: Decimal::ZERO,
            lifetime_purchased: Decimal::ZERO,
            tier,
            deactivated: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the balance covers a debit of `amount`.
    #[must_use]
    pub fn has_sufficient_balance(&self, amount: Decimal) -> bool {
        self.balance_remaining >= amount
    }
}

/// A pooled credit holder.
///
/// Members draw from the pool through per-member allocations; the
/// pool balance and the member's consumed amount always move together
/// in one atomic step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Organization id.
    pub id: OrgId,

    /// Remaining pooled balance. Never negative.
    pub pool_balance_remaining: Decimal,

    /// Lifetime credits purchased into the pool. Allocation grants
    /// are validated against this figure.
    pub pool_lifetime_purchased: Decimal,

    /// Subscription tier shared by the organization.
    pub tier: Tier,

    /// When the organization was created.
    pub created_at: DateTime<Utc>,

    /// When the organization was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization with an empty pool.
    #[must_use]
    pub fn new(id: OrgId, tier: Tier) -> Self {
        let now = Utc::now();
        Self {
            id,
            pool_balance_remaining: Decimal::ZERO,
            pool_lifetime_purchased: Decimal::ZERO,
            tier,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A member's sub-budget within an organization.
///
/// The allocation is a promise against pooled funds, not a separate
/// pot: the invariant is that the sum of all members'
/// `allocated_amount` never exceeds the organization's
/// `pool_lifetime_purchased` at the time of allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationMembership {
    /// The organization.
    pub org_id: OrgId,

    /// The member account.
    pub member_id: AccountId,

    /// Total credits allocated to this member.
    pub allocated_amount: Decimal,

    /// Credits this member has consumed from its allocation.
    pub consumed_amount: Decimal,

    /// When the membership row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl OrganizationMembership {
    /// Create a membership with an initial allocation.
    #[must_use]
    pub fn new(org_id: OrgId, member_id: AccountId, allocated_amount: Decimal) -> Self {
        Self {
            org_id,
            member_id,
            allocated_amount,
            consumed_amount: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// The member's remaining allocation. This is a hard per-member
    /// ceiling, independent of how much the pool itself holds.
    #[must_use]
    pub fn allocated_remaining(&self) -> Decimal {
        self.allocated_amount - self.consumed_amount
    }
}
