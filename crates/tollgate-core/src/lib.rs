//! Core types for the tollgate credit ledger and tier access engine.
//!
//! This crate provides the foundational types used throughout tollgate:
//!
//! - **Identifiers**: `AccountId`, `OrgId`, `TransactionId`
//! - **Accounts**: `Account`, `Organization`, `OrganizationMembership`
//! - **Ledger**: `LedgerTransaction`, `TransactionKind`, `CreditKind`
//! - **Catalog**: `ModelCatalogEntry`, `Tier`
//! - **Quota**: `QuotaCounter`
//! - **Usage**: `UsageRecord`, `UsageFilter`, `UsageSummary`
//!
//! # Credit arithmetic
//!
//! All credit quantities are `rust_decimal::Decimal`, never binary
//! floating point. Per-call prices routinely drop below one credit
//! (e.g. 0.009), and decimal arithmetic keeps large volumes of small
//! debits free of rounding drift.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod catalog;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod quota;
pub mod tier;
pub mod usage;

pub use account::{Account, Organization, OrganizationMembership};
pub use catalog::{ModelCatalogEntry, TierMarkup};
pub use error::{LedgerError, Result};
pub use ids::{AccountId, IdError, OrgId, TransactionId};
pub use ledger::{CreditKind, LedgerSubject, LedgerTransaction, TransactionKind, TxnContext};
pub use quota::QuotaCounter;
pub use tier::Tier;
pub use usage::{UsageFilter, UsageRecord, UsageSummary};
