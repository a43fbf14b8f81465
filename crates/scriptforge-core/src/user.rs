//! User records and the monthly usage window.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::{SubscriptionStatus, Tier};
use crate::UserId;

/// A ScriptForge user.
///
/// Created lazily the first time an authenticated caller is seen. Usage
/// accounting mutates the counters, billing sync mutates tier, status and the
/// billing link; tier resolution only reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Auth provider subject.
    pub id: UserId,

    /// Email from the auth claims, kept in sync on each sign-in.
    pub email: String,

    /// Tier the user pays for.
    pub tier: Tier,

    /// Billing subscription status.
    pub status: SubscriptionStatus,

    /// Scripts generated in the current usage window.
    pub scripts_this_month: u32,

    /// When the usage window was last reset.
    pub usage_reset_at: DateTime<Utc>,

    /// Scripts generated over the account's lifetime.
    pub total_scripts: u64,

    /// Link to the billing provider.
    pub billing: BillingLink,

    /// When the user was created.
    pub created_at: DateTime<Utc>,

    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Billing provider identifiers and current period for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingLink {
    /// Stripe customer id (`cus_...`).
    pub customer_id: Option<String>,
    /// Stripe subscription id (`sub_...`).
    pub subscription_id: Option<String>,
    /// Stripe price id the subscription is on.
    pub price_id: Option<String>,
    /// Start of the current billing period.
    pub current_period_start: Option<DateTime<Utc>>,
    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Subscription ends at the period end.
    pub cancel_at_period_end: bool,
}

impl BillingLink {
    /// Drop subscription and period fields, keeping the customer link.
    pub fn clear_subscription(&mut self) {
        self.subscription_id = None;
        self.price_id = None;
        self.current_period_start = None;
        self.current_period_end = None;
        self.cancel_at_period_end = false;
    }
}

impl User {
    /// Create a Free, active user with an empty usage window starting at `now`.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email: email.into(),
            tier: Tier::Free,
            status: SubscriptionStatus::Active,
            scripts_this_month: 0,
            usage_reset_at: now,
            total_scripts: 0,
            billing: BillingLink::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `now` falls in a different calendar month than the last reset.
    #[must_use]
    pub fn usage_window_expired(&self, now: DateTime<Utc>) -> bool {
        (now.year(), now.month()) != (self.usage_reset_at.year(), self.usage_reset_at.month())
    }

    /// Reset the monthly counter if the calendar month has rolled over.
    ///
    /// Returns `true` when a reset happened and the record must be persisted.
    pub fn roll_usage_window(&mut self, now: DateTime<Utc>) -> bool {
        if !self.usage_window_expired(now) {
            return false;
        }
        self.reset_monthly_usage(now);
        true
    }

    /// Unconditionally start a fresh usage window at `now`.
    pub fn reset_monthly_usage(&mut self, now: DateTime<Utc>) {
        self.scripts_this_month = 0;
        self.usage_reset_at = now;
        self.updated_at = now;
    }

    /// Count one generated script against both counters.
    pub fn count_generation(&mut self, now: DateTime<Utc>) {
        self.scripts_this_month = self.scripts_this_month.saturating_add(1);
        self.total_scripts = self.total_scripts.saturating_add(1);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn user_at(now: DateTime<Utc>) -> User {
        User::new(UserId::new("user_1").unwrap(), "a@example.com", now)
    }

    #[test]
    fn new_user_is_free_and_active() {
        let user = user_at(at(2026, 3, 1));
        assert_eq!(user.tier, Tier::Free);
        assert_eq!(user.status, SubscriptionStatus::Active);
        assert_eq!(user.scripts_this_month, 0);
        assert_eq!(user.total_scripts, 0);
    }

    #[test]
    fn window_does_not_roll_within_month() {
        let mut user = user_at(at(2026, 3, 1));
        user.scripts_this_month = 2;

        assert!(!user.roll_usage_window(at(2026, 3, 31)));
        assert!(!user.roll_usage_window(at(2026, 3, 31)));
        assert_eq!(user.scripts_this_month, 2);
    }

    #[test]
    fn window_rolls_on_month_change() {
        let mut user = user_at(at(2026, 3, 15));
        user.scripts_this_month = 2;
        user.total_scripts = 9;

        assert!(user.roll_usage_window(at(2026, 4, 1)));
        assert_eq!(user.scripts_this_month, 0);
        assert_eq!(user.total_scripts, 9);
        assert_eq!(user.usage_reset_at, at(2026, 4, 1));

        // Second access in the new month is a no-op.
        assert!(!user.roll_usage_window(at(2026, 4, 2)));
    }

    #[test]
    fn same_month_of_different_year_rolls() {
        let mut user = user_at(at(2025, 4, 10));
        user.scripts_this_month = 1;
        assert!(user.roll_usage_window(at(2026, 4, 10)));
        assert_eq!(user.scripts_this_month, 0);
    }

    #[test]
    fn generation_counts_both_counters() {
        let mut user = user_at(at(2026, 3, 1));
        user.count_generation(at(2026, 3, 2));
        user.count_generation(at(2026, 3, 3));
        assert_eq!(user.scripts_this_month, 2);
        assert_eq!(user.total_scripts, 2);
        assert_eq!(user.updated_at, at(2026, 3, 3));
    }
}
