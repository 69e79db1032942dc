//! Subscription tiers.
//!
//! The tier set is a closed enum rather than free-form strings: an
//! unrecognized tier name is a validation-time error, never a
//! silently-applied default markup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Default per-period call limit for the trial tier.
pub const TRIAL_CALL_LIMIT: u32 = 100;

/// Default per-period call limit for the standard tier.
pub const STANDARD_CALL_LIMIT: u32 = 2_000;

/// Default per-period call limit for the pro tier.
pub const PRO_CALL_LIMIT: u32 = 10_000;

/// Default per-period call limit for the enterprise tier.
pub const ENTERPRISE_CALL_LIMIT: u32 = 100_000;

/// A named subscription level controlling model availability, price
/// markup and quota limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Trial tier: limited catalog, highest markup.
    Trial,

    /// Standard tier: paid entry level.
    Standard,

    /// Pro tier: reduced markup, larger quota.
    Pro,

    /// Enterprise tier: full catalog at base price.
    Enterprise,
}

impl Tier {
    /// All tiers, in ascending order.
    pub const ALL: [Self; 4] = [Self::Trial, Self::Standard, Self::Pro, Self::Enterprise];

    /// Default markup multiplier applied to a model's base price for
    /// this tier, unless the catalog entry overrides it.
    #[must_use]
    pub fn default_markup(self) -> Decimal {
        match self {
            Self::Trial => Decimal::new(150, 2),      // 1.50
            Self::Standard => Decimal::new(125, 2),   // 1.25
            Self::Pro => Decimal::new(110, 2),        // 1.10
            Self::Enterprise => Decimal::new(100, 2), // 1.00
        }
    }

    /// Default number of metered calls allowed per billing period.
    #[must_use]
    pub const fn default_call_limit(self) -> u32 {
        match self {
            Self::Trial => TRIAL_CALL_LIMIT,
            Self::Standard => STANDARD_CALL_LIMIT,
            Self::Pro => PRO_CALL_LIMIT,
            Self::Enterprise => ENTERPRISE_CALL_LIMIT,
        }
    }

    /// The tier name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Standard => "standard",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "standard" => Ok(Self::Standard),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(LedgerError::UnknownTier(other.to_string())),
        }
    }
}
