//! Usage snapshots and the append-only usage log.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::{Tier, UNLIMITED};
use crate::user::User;
use crate::{UsageLogId, UserId};

/// Point-in-time view of a user's quota in the current usage window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Effective tier the limit was computed for.
    pub tier: Tier,
    /// Scripts generated this window.
    pub used: u32,
    /// Monthly quota, or `-1` when unlimited.
    pub limit: i32,
    /// Scripts left this window, or `-1` when unlimited.
    pub remaining: i32,
    /// First instant of the next usage window.
    pub reset_date: DateTime<Utc>,
    /// Whether another generation is allowed right now.
    pub can_generate: bool,
}

impl UsageSnapshot {
    /// Compute the snapshot for a user whose window has already been rolled.
    #[must_use]
    pub fn compute(user: &User, effective_tier: Tier, now: DateTime<Utc>) -> Self {
        let limit = effective_tier.limits().monthly_scripts;
        let used = user.scripts_this_month;
        let reset_date = next_window_start(now);

        if limit == UNLIMITED {
            return Self {
                tier: effective_tier,
                used,
                limit,
                remaining: UNLIMITED,
                reset_date,
                can_generate: true,
            };
        }

        let remaining = (i64::from(limit) - i64::from(used)).max(0);
        let remaining = i32::try_from(remaining).unwrap_or(i32::MAX);

        Self {
            tier: effective_tier,
            used,
            limit,
            remaining,
            reset_date,
            can_generate: remaining > 0,
        }
    }

    /// Whether the quota is unlimited.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.limit == UNLIMITED
    }
}

/// First instant (UTC) of the calendar month after `now`.
#[must_use]
pub fn next_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// What a usage log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageAction {
    /// A script was generated.
    ScriptGenerated,
    /// An existing script was remixed.
    ScriptRemixed,
    /// Billing moved the user to a higher tier.
    TierUpgraded,
    /// Billing moved the user to a lower tier.
    TierDowngraded,
    /// The subscription ended.
    SubscriptionCanceled,
}

/// An append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLog {
    /// Time-ordered identifier.
    pub id: UsageLogId,
    /// The user the action belongs to.
    pub user_id: UserId,
    /// What happened.
    pub action: UsageAction,
    /// Free-form context (script id, style, tiers, ...).
    pub metadata: serde_json::Value,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

impl UsageLog {
    /// Create a new log entry.
    #[must_use]
    pub fn new(
        user_id: UserId,
        action: UsageAction,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UsageLogId::generate(),
            user_id,
            action,
            metadata,
            created_at: now,
        }
    }
}
