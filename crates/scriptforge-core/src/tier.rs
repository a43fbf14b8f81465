//! Subscription tiers and the static tier table.
//!
//! Every feature decision in ScriptForge derives from one row of this table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Sentinel for "no limit" in quota and team-size fields.
pub const UNLIMITED: i32 = -1;

/// Monthly script quota on the Free tier.
pub const FREE_MONTHLY_SCRIPTS: i32 = 2;

/// Monthly script quota on the Pro tier.
pub const PRO_MONTHLY_SCRIPTS: i32 = 50;

/// Monthly script quota on the Business tier.
pub const BUSINESS_MONTHLY_SCRIPTS: i32 = 200;

/// Subscription tier levels, ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Free tier: two scripts a month, watermarked output.
    Free,
    /// Pro tier: fifty scripts a month, advanced styles, remix.
    Pro,
    /// Business tier: priority processing, API access, small teams.
    Business,
    /// Enterprise tier: unlimited scripts, dedicated support.
    Enterprise,
}

impl Tier {
    /// All tiers in ascending order.
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Pro, Tier::Business, Tier::Enterprise];

    /// Look up this tier's row in the tier table.
    #[must_use]
    pub const fn limits(self) -> &'static TierLimits {
        match self {
            Self::Free => &FREE_LIMITS,
            Self::Pro => &PRO_LIMITS,
            Self::Business => &BUSINESS_LIMITS,
            Self::Enterprise => &ENTERPRISE_LIMITS,
        }
    }

    /// Lowercase name used in logs and URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
        }
    }

    /// Whether this tier is a paid plan.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "business" => Ok(Self::Business),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(Error::InvalidValue {
                kind: "tier",
                value: s.to_string(),
            }),
        }
    }
}

/// Support level attached to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    /// Community forum only.
    Community,
    /// Email support.
    Email,
    /// Priority email support.
    Priority,
    /// Named account manager.
    Dedicated,
}

/// Limits and feature flags for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    /// Scripts per calendar month, or [`UNLIMITED`].
    pub monthly_scripts: i32,
    /// Generation runs on the priority model.
    pub priority_processing: bool,
    /// Access to the gated script styles.
    pub advanced_styles: bool,
    /// Output carries no watermark.
    pub watermark_free: bool,
    /// Programmatic API access.
    pub api_access: bool,
    /// Can remix existing scripts.
    pub remix_access: bool,
    /// Seats per account, or [`UNLIMITED`].
    pub team_size: i32,
    /// Support level.
    pub support: SupportLevel,
}

impl TierLimits {
    /// Whether the monthly quota is unlimited.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.monthly_scripts == UNLIMITED
    }
}

const FREE_LIMITS: TierLimits = TierLimits {
    monthly_scripts: FREE_MONTHLY_SCRIPTS,
    priority_processing: false,
    advanced_styles: false,
    watermark_free: false,
    api_access: false,
    remix_access: false,
    team_size: 1,
    support: SupportLevel::Community,
};

const PRO_LIMITS: TierLimits = TierLimits {
    monthly_scripts: PRO_MONTHLY_SCRIPTS,
    priority_processing: false,
    advanced_styles: true,
    watermark_free: true,
    api_access: false,
    remix_access: true,
    team_size: 1,
    support: SupportLevel::Email,
};

const BUSINESS_LIMITS: TierLimits = TierLimits {
    monthly_scripts: BUSINESS_MONTHLY_SCRIPTS,
    priority_processing: true,
    advanced_styles: true,
    watermark_free: true,
    api_access: true,
    remix_access: true,
    team_size: 5,
    support: SupportLevel::Priority,
};

const ENTERPRISE_LIMITS: TierLimits = TierLimits {
    monthly_scripts: UNLIMITED,
    priority_processing: true,
    advanced_styles: true,
    watermark_free: true,
    api_access: true,
    remix_access: true,
    team_size: UNLIMITED,
    support: SupportLevel::Dedicated,
};

/// Status of the user's billing subscription, mirroring the provider's states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Paid and current.
    Active,
    /// Latest invoice failed; provider is retrying.
    PastDue,
    /// Subscription ended.
    Canceled,
    /// In a trial period.
    Trialing,
    /// First payment not yet completed.
    Incomplete,
    /// First payment never completed.
    IncompleteExpired,
    /// Retries exhausted without payment.
    Unpaid,
    /// Paused by the customer or provider.
    Paused,
}

impl SubscriptionStatus {
    /// Whether this status keeps the stored tier in force.
    #[must_use]
    pub const fn is_entitled(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Map a Stripe subscription status string.
    #[must_use]
    pub fn from_stripe(status: &str) -> Option<Self> {
        match status {
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            "trialing" => Some(Self::Trialing),
            "incomplete" => Some(Self::Incomplete),
            "incomplete_expired" => Some(Self::IncompleteExpired),
            "unpaid" => Some(Self::Unpaid),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}
