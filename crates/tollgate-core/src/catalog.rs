//! Model catalog entries and tier-based pricing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::tier::Tier;

/// A per-tier markup override on a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMarkup {
    /// The tier the override applies to.
    pub tier: Tier,

    /// Markup multiplier replacing the tier default.
    pub markup: Decimal,
}

/// A routable model in the catalog.
///
/// Availability is an explicit allow-list: a tier not listed in
/// `tier_access` has no access, regardless of any notion of tier
/// ranking. A deprecated entry still resolves (callers are advised to
/// migrate to `replacement_model_id`) until it is explicitly disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalogEntry {
    /// Model id (e.g. "claude-3-5-sonnet").
    pub model_id: String,

    /// Upstream provider (e.g. "anthropic").
    pub provider: String,

    /// Tiers allowed to call this model. Exact membership.
    pub tier_access: Vec<Tier>,

    /// Base price per unit (token) of confirmed usage.
    pub base_price_per_unit: Decimal,

    /// Per-tier markup overrides; tiers absent here use the tier's
    /// default markup.
    #[serde(default)]
    pub markup_overrides: Vec<TierMarkup>,

    /// Advisory deprecation flag.
    #[serde(default)]
    pub deprecated: bool,

    /// Suggested replacement when deprecated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_model_id: Option<String>,

    /// A disabled entry no longer resolves at all.
    #[serde(default)]
    pub disabled: bool,
}

impl ModelCatalogEntry {
    /// Create an active catalog entry.
    #[must_use]
    pub fn new(
        model_id: impl Into<String>,
        provider: impl Into<String>,
        tier_access: Vec<Tier>,
        base_price_per_unit: Decimal,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            provider: provider.into(),
            tier_access,
            base_price_per_unit,
            markup_overrides: Vec::new(),
            deprecated: false,
            replacement_model_id: None,
            disabled: false,
        }
    }

    /// Exact allow-list membership check. Disabled entries are
    /// available to no one.
    #[must_use]
    pub fn available_to(&self, tier: Tier) -> bool {
        !self.disabled && self.tier_access.contains(&tier)
    }

    /// The markup multiplier for `tier`: the per-model override if
    /// one exists, else the tier default.
    #[must_use]
    pub fn markup_for(&self, tier: Tier) -> Decimal {
        self.markup_overrides
            .iter()
            .find(|m| m.tier == tier)
            .map_or_else(|| tier.default_markup(), |m| m.markup)
    }

    /// Effective per-unit price for `tier`.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotAvailableForTier` when the tier is not on the
    /// allow-list (or the entry is disabled).
    pub fn effective_price(&self, tier: Tier) -> Result<Decimal> {
        if !self.available_to(tier) {
            return Err(LedgerError::ModelNotAvailableForTier {
                tier,
                model_id: self.model_id.clone(),
            });
        }
        Ok(self.base_price_per_unit * self.markup_for(tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry() -> ModelCatalogEntry {
        ModelCatalogEntry::new(
            "claude-3-5-sonnet",
            "anthropic",
            vec![Tier::Standard, Tier::Pro, Tier::Enterprise],
            dec!(0.000003),
        )
    }

    #[test]
    fn availability_is_exact_membership() {
        let entry = entry();
        assert!(!entry.available_to(Tier::Trial));
        assert!(entry.available_to(Tier::Standard));
        assert!(entry.available_to(Tier::Enterprise));
    }

    #[test]
    fn disabled_entry_is_available_to_no_one() {
        let mut entry = entry();
        entry.disabled = true;
        assert!(!entry.available_to(Tier::Enterprise));
        assert!(entry.effective_price(Tier::Enterprise).is_err());
    }

    #[test]
    fn deprecated_entry_still_prices() {
        let mut entry = entry();
        entry.deprecated = true;
        entry.replacement_model_id = Some("claude-4".into());
        assert!(entry.effective_price(Tier::Pro).is_ok());
    }

    #[test]
    fn effective_price_uses_default_markup() {
        let entry = entry();
        // enterprise markup is 1.00, so price equals base price
        assert_eq!(
            entry.effective_price(Tier::Enterprise).unwrap(),
            dec!(0.000003)
        );
        assert_eq!(
            entry.effective_price(Tier::Standard).unwrap(),
            dec!(0.000003) * Tier::Standard.default_markup()
        );
    }

    #[test]
    fn effective_price_prefers_override() {
        let mut entry = entry();
        entry.markup_overrides.push(TierMarkup {
            tier: Tier::Pro,
            markup: dec!(2.00),
        });
        assert_eq!(
            entry.effective_price(Tier::Pro).unwrap(),
            dec!(0.000006)
        );
        // other tiers unaffected
        assert_eq!(
            entry.effective_price(Tier::Enterprise).unwrap(),
            dec!(0.000003)
        );
    }

    #[test]
    fn unavailable_tier_is_a_typed_error() {
        let err = entry().effective_price(Tier::Trial).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ModelNotAvailableForTier { tier: Tier::Trial, .. }
        ));
    }
}
