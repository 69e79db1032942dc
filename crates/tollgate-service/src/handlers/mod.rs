//! HTTP request handlers.

pub mod accounts;
pub mod byok;
pub mod calls;
pub mod catalog;
pub mod health;
pub mod orgs;
pub mod quota;
pub mod usage;
