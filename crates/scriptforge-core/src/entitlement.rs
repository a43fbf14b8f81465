//! Tier resolution and feature entitlements.
//!
//! Resolution order:
//!
//! 1. An email on the admin allow-list always resolves to Enterprise.
//! 2. A verified test-mode request resolves to the simulated tier.
//! 3. Otherwise the stored tier applies while the subscription is active or
//!    trialing, and Free applies in every other status.
//!
//! The entitlement predicates below are total functions of the effective tier.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::content::ScriptStyle;
use crate::tier::{SubscriptionStatus, Tier};
use crate::user::User;

/// Tier simulated by a verified test-mode request.
pub const TEST_MODE_TIER: Tier = Tier::Pro;

/// Tier granted to allow-listed admins.
pub const ADMIN_TIER: Tier = Tier::Enterprise;

/// Inputs to tier resolution that do not live on the user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSignals {
    /// The caller passed the test-mode flag with the correct admin key.
    pub verified_test_mode: bool,
}

/// Access policy: who is an admin.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_emails: HashSet<String>,
}

impl AccessPolicy {
    /// Build a policy from an admin allow-list. Emails compare case-insensitively.
    #[must_use]
    pub fn new<I, S>(admin_emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let admin_emails = admin_emails
            .into_iter()
            .map(|e| normalize_email(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { admin_emails }
    }

    /// Whether the email is on the admin allow-list.
    #[must_use]
    pub fn is_admin(&self, email: &str) -> bool {
        let email = normalize_email(email);
        !email.is_empty() && self.admin_emails.contains(&email)
    }

    /// Resolve the effective tier from raw fields.
    #[must_use]
    pub fn resolve(
        &self,
        stored_tier: Tier,
        status: SubscriptionStatus,
        email: &str,
        signals: ResolutionSignals,
    ) -> Tier {
        if self.is_admin(email) {
            return ADMIN_TIER;
        }
        if signals.verified_test_mode {
            return TEST_MODE_TIER;
        }
        if status.is_entitled() {
            stored_tier
        } else {
            Tier::Free
        }
    }

    /// Resolve the effective tier for a user record.
    #[must_use]
    pub fn effective_tier(&self, user: &User, signals: ResolutionSignals) -> Tier {
        self.resolve(user.tier, user.status, &user.email, signals)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// A gated feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Persuasive, narrative and academic styles.
    AdvancedStyles,
    /// Priority model for generation.
    PriorityProcessing,
    /// Watermark-free output.
    WatermarkFree,
    /// Remixing existing scripts.
    Remix,
    /// Programmatic API access.
    ApiAccess,
}

impl Feature {
    /// Whether `tier` grants this feature.
    #[must_use]
    pub const fn granted_to(self, tier: Tier) -> bool {
        let limits = tier.limits();
        match self {
            Self::AdvancedStyles => limits.advanced_styles,
            Self::PriorityProcessing => limits.priority_processing,
            Self::WatermarkFree => limits.watermark_free,
            Self::Remix => limits.remix_access,
            Self::ApiAccess => limits.api_access,
        }
    }

    /// The lowest tier granting this feature.
    #[must_use]
    pub fn minimum_tier(self) -> Tier {
        Tier::ALL
            .into_iter()
            .find(|tier| self.granted_to(*tier))
            .unwrap_or(Tier::Enterprise)
    }

    /// Machine name used in API error bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdvancedStyles => "advanced_styles",
            Self::PriorityProcessing => "priority_processing",
            Self::WatermarkFree => "watermark_free",
            Self::Remix => "remix",
            Self::ApiAccess => "api_access",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lowest tier granting `feature`.
#[must_use]
pub fn minimum_tier_for(feature: Feature) -> Tier {
    feature.minimum_tier()
}

/// Whether `tier` may use `style`. Only the advanced styles are gated.
#[must_use]
pub const fn has_advanced_style_access(tier: Tier, style: ScriptStyle) -> bool {
    !style.is_advanced() || Feature::AdvancedStyles.granted_to(tier)
}

/// Whether generation runs on the priority model.
#[must_use]
pub const fn has_priority_processing(tier: Tier) -> bool {
    Feature::PriorityProcessing.granted_to(tier)
}

/// Whether output must carry the watermark.
#[must_use]
pub const fn requires_watermark(tier: Tier) -> bool {
    !Feature::WatermarkFree.granted_to(tier)
}

/// Whether the tier may remix scripts.
#[must_use]
pub const fn has_remix_access(tier: Tier) -> bool {
    Feature::Remix.granted_to(tier)
}

/// Whether the tier has programmatic API access.
#[must_use]
pub const fn has_api_access(tier: Tier) -> bool {
    Feature::ApiAccess.granted_to(tier)
}

/// Flattened entitlements for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entitlements {
    /// Advanced styles unlocked.
    pub advanced_styles: bool,
    /// Priority model.
    pub priority_processing: bool,
    /// Output is watermarked.
    pub watermark: bool,
    /// Remix unlocked.
    pub remix: bool,
    /// API access.
    pub api_access: bool,
}

impl Entitlements {
    /// Derive all flags for a tier.
    #[must_use]
    pub const fn for_tier(tier: Tier) -> Self {
        Self {
            advanced_styles: Feature::AdvancedStyles.granted_to(tier),
            priority_processing: has_priority_processing(tier),
            watermark: requires_watermark(tier),
            remix: has_remix_access(tier),
            api_access: has_api_access(tier),
        }
    }
}
