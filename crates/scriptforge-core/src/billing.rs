//! Billing events and how they move a user's tier and status.
//!
//! Handlers are idempotent: applying the same event twice leaves the user in
//! the same state as applying it once, and only the first application reports
//! a tier change.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::tier::{SubscriptionStatus, Tier};
use crate::usage::UsageAction;
use crate::user::User;
use crate::UserId;

/// `billing_reason` of an invoice issued for a renewal period.
pub const SUBSCRIPTION_CYCLE: &str = "subscription_cycle";

/// Static mapping from billing price ids to tiers.
#[derive(Debug, Clone, Default)]
pub struct PriceTierMap {
    prices: HashMap<String, Tier>,
}

impl PriceTierMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a price id for a paid tier. Blank ids are ignored.
    #[must_use]
    pub fn with_price(mut self, price_id: impl Into<String>, tier: Tier) -> Self {
        let price_id = price_id.into();
        if !price_id.trim().is_empty() {
            self.prices.insert(price_id, tier);
        }
        self
    }

    /// Tier for a price id.
    #[must_use]
    pub fn tier_for(&self, price_id: &str) -> Option<Tier> {
        self.prices.get(price_id).copied()
    }

    /// Price id configured for a tier.
    #[must_use]
    pub fn price_for(&self, tier: Tier) -> Option<&str> {
        self.prices
            .iter()
            .find(|(_, t)| **t == tier)
            .map(|(price, _)| price.as_str())
    }
}

/// Subscription fields carried by created/updated events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    /// Subscription id.
    pub subscription_id: String,
    /// Price of the first subscription item.
    pub price_id: Option<String>,
    /// Provider status.
    pub status: SubscriptionStatus,
    /// Current period start.
    pub current_period_start: Option<DateTime<Utc>>,
    /// Current period end.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Ends at period end.
    pub cancel_at_period_end: bool,
}

/// A billing event, already verified and decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// `customer.subscription.created` or `customer.subscription.updated`.
    SubscriptionUpserted {
        /// Billing customer.
        customer_id: String,
        /// New subscription state.
        subscription: SubscriptionUpdate,
    },
    /// `customer.subscription.deleted`.
    SubscriptionDeleted {
        /// Billing customer.
        customer_id: String,
    },
    /// `invoice.paid` or `invoice.payment_succeeded`.
    InvoicePaid {
        /// Billing customer.
        customer_id: String,
        /// Why the invoice was issued.
        billing_reason: Option<String>,
        /// When the invoice was created.
        issued_at: Option<DateTime<Utc>>,
    },
    /// `invoice.payment_failed`.
    InvoicePaymentFailed {
        /// Billing customer.
        customer_id: String,
    },
    /// `checkout.session.completed`.
    CheckoutCompleted {
        /// Billing customer.
        customer_id: String,
        /// The user the session was opened for.
        user_id: UserId,
        /// Subscription created by the session.
        subscription_id: Option<String>,
    },
}

impl BillingEvent {
    /// Billing customer the event belongs to.
    #[must_use]
    pub fn customer_id(&self) -> &str {
        match self {
            Self::SubscriptionUpserted { customer_id, .. }
            | Self::SubscriptionDeleted { customer_id }
            | Self::InvoicePaid { customer_id, .. }
            | Self::InvoicePaymentFailed { customer_id }
            | Self::CheckoutCompleted { customer_id, .. } => customer_id,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SubscriptionUpserted { .. } => "subscription_upserted",
            Self::SubscriptionDeleted { .. } => "subscription_deleted",
            Self::InvoicePaid { .. } => "invoice_paid",
            Self::InvoicePaymentFailed { .. } => "invoice_payment_failed",
            Self::CheckoutCompleted { .. } => "checkout_completed",
        }
    }
}

/// What applying an event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingOutcome {
    /// Tier before the event.
    pub previous_tier: Tier,
    /// Tier after the event.
    pub tier: Tier,
    /// Status before the event.
    pub previous_status: SubscriptionStatus,
    /// Status after the event.
    pub status: SubscriptionStatus,
    /// The monthly counter was reset.
    pub usage_reset: bool,
    /// Price id that had no tier mapping; the tier was left unchanged.
    pub unknown_price: Option<String>,
    /// The user record changed and must be persisted.
    pub changed: bool,
}

impl BillingOutcome {
    /// Audit action for a tier change, if the tier changed.
    #[must_use]
    pub fn tier_change_action(&self) -> Option<UsageAction> {
        if self.tier == self.previous_tier {
            return None;
        }
        if self.status == SubscriptionStatus::Canceled && self.tier == Tier::Free {
            Some(UsageAction::SubscriptionCanceled)
        } else if self.tier > self.previous_tier {
            Some(UsageAction::TierUpgraded)
        } else {
            Some(UsageAction::TierDowngraded)
        }
    }

    /// Metadata for the audit entry.
    #[must_use]
    pub fn audit_metadata(&self, event: &BillingEvent) -> serde_json::Value {
        json!({
            "from_tier": self.previous_tier,
            "to_tier": self.tier,
            "status": self.status,
            "event": event.kind(),
        })
    }
}

/// Apply a billing event to a user record.
///
/// Unknown prices keep the current tier and are reported in the outcome so the
/// caller can log them.
pub fn apply_event(
    user: &mut User,
    event: &BillingEvent,
    prices: &PriceTierMap,
    now: DateTime<Utc>,
) -> BillingOutcome {
    let before = user.clone();
    let mut usage_reset = false;
    let mut unknown_price = None;

    match event {
        BillingEvent::SubscriptionUpserted {
            customer_id,
            subscription,
        } => {
            if let Some(price_id) = &subscription.price_id {
                match prices.tier_for(price_id) {
                    Some(tier) => user.tier = tier,
                    None => unknown_price = Some(price_id.clone()),
                }
            }
            user.status = subscription.status;
            user.billing.customer_id = Some(customer_id.clone());
            user.billing.subscription_id = Some(subscription.subscription_id.clone());
            user.billing.price_id.clone_from(&subscription.price_id);
            user.billing.current_period_start = subscription.current_period_start;
            user.billing.current_period_end = subscription.current_period_end;
            user.billing.cancel_at_period_end = subscription.cancel_at_period_end;
        }
        BillingEvent::SubscriptionDeleted { .. } => {
            user.tier = Tier::Free;
            user.status = SubscriptionStatus::Canceled;
            user.billing.clear_subscription();
        }
        BillingEvent::InvoicePaid {
            billing_reason,
            issued_at,
            ..
        } => {
            user.status = SubscriptionStatus::Active;
            // A window started after the invoice was issued has already been reset.
            let stale_window = issued_at.map_or(true, |issued| user.usage_reset_at < issued);
            if billing_reason.as_deref() == Some(SUBSCRIPTION_CYCLE) && stale_window {
                user.reset_monthly_usage(now);
                usage_reset = true;
            }
        }
        BillingEvent::InvoicePaymentFailed { .. } => {
            user.status = SubscriptionStatus::PastDue;
        }
        BillingEvent::CheckoutCompleted {
            customer_id,
            subscription_id,
            ..
        } => {
            user.billing.customer_id = Some(customer_id.clone());
            if subscription_id.is_some() {
                user.billing.subscription_id.clone_from(subscription_id);
            }
        }
    }

    let changed = usage_reset
        || user.tier != before.tier
        || user.status != before.status
        || user.billing != before.billing;
    if changed {
        user.updated_at = now;
    }

    BillingOutcome {
        previous_tier: before.tier,
        tier: user.tier,
        previous_status: before.status,
        status: user.status,
        usage_reset,
        unknown_price,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, d, 10, 0, 0).unwrap()
    }

    fn prices() -> PriceTierMap {
        PriceTierMap::new()
            .with_price("price_pro", Tier::Pro)
            .with_price("price_biz", Tier::Business)
            .with_price("", Tier::Enterprise)
    }

    fn free_user() -> User {
        let mut user = User::new(UserId::new("user_1").unwrap(), "a@example.com", at(1));
        user.billing.customer_id = Some("cus_1".into());
        user
    }

    fn upsert(price: &str, status: SubscriptionStatus) -> BillingEvent {
        BillingEvent::SubscriptionUpserted {
            customer_id: "cus_1".into(),
            subscription: SubscriptionUpdate {
                subscription_id: "sub_1".into(),
                price_id: Some(price.into()),
                status,
                current_period_start: Some(at(1)),
                current_period_end: Some(at(31)),
                cancel_at_period_end: false,
            },
        }
    }

    #[test]
    fn subscription_update_sets_tier_and_period() {
        let mut user = free_user();
        let outcome = apply_event(
            &mut user,
            &upsert("price_pro", SubscriptionStatus::Active),
            &prices(),
            at(2),
        );

        assert_eq!(user.tier, Tier::Pro);
        assert_eq!(user.billing.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(user.billing.current_period_end, Some(at(31)));
        assert_eq!(outcome.tier_change_action(), Some(UsageAction::TierUpgraded));
        assert!(outcome.changed);
    }

    #[test]
    fn replayed_update_is_idempotent() {
        let mut user = free_user();
        let event = upsert("price_biz", SubscriptionStatus::Active);
        apply_event(&mut user, &event, &prices(), at(2));
        let snapshot = user.clone();

        let replay = apply_event(&mut user, &event, &prices(), at(3));
        assert_eq!(user, snapshot);
        assert!(!replay.changed);
        assert_eq!(replay.tier_change_action(), None);
    }

    #[test]
    fn unknown_price_keeps_tier() {
        let mut user = free_user();
        user.tier = Tier::Pro;
        let outcome = apply_event(
            &mut user,
            &upsert("price_mystery", SubscriptionStatus::PastDue),
            &prices(),
            at(2),
        );
        assert_eq!(user.tier, Tier::Pro);
        assert_eq!(user.status, SubscriptionStatus::PastDue);
        assert_eq!(outcome.unknown_price.as_deref(), Some("price_mystery"));
    }

    #[test]
    fn blank_price_ids_are_not_registered() {
        assert_eq!(prices().tier_for(""), None);
        assert_eq!(prices().price_for(Tier::Business), Some("price_biz"));
    }

    #[test]
    fn deletion_cancels_and_clears() {
        let mut user = free_user();
        apply_event(
            &mut user,
            &upsert("price_pro", SubscriptionStatus::Active),
            &prices(),
            at(2),
        );
        let event = BillingEvent::SubscriptionDeleted {
            customer_id: "cus_1".into(),
        };
        let outcome = apply_event(&mut user, &event, &prices(), at(3));

        assert_eq!(user.tier, Tier::Free);
        assert_eq!(user.status, SubscriptionStatus::Canceled);
        assert_eq!(user.billing.subscription_id, None);
        assert_eq!(user.billing.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(
            outcome.tier_change_action(),
            Some(UsageAction::SubscriptionCanceled)
        );

        let replay = apply_event(&mut user, &event, &prices(), at(4));
        assert_eq!(replay.tier_change_action(), None);
    }

    #[test]
    fn cycle_invoice_resets_usage() {
        let mut user = free_user();
        user.status = SubscriptionStatus::PastDue;
        user.scripts_this_month = 7;
        let event = BillingEvent::InvoicePaid {
            customer_id: "cus_1".into(),
            billing_reason: Some(SUBSCRIPTION_CYCLE.into()),
            issued_at: Some(at(4)),
        };
        let outcome = apply_event(&mut user, &event, &prices(), at(5));
        assert!(outcome.usage_reset);
        assert_eq!(user.scripts_this_month, 0);
        assert_eq!(user.status, SubscriptionStatus::Active);

        // Usage after the reset survives a redelivery of the same invoice.
        user.scripts_this_month = 3;
        let replay = apply_event(&mut user, &event, &prices(), at(6));
        assert!(!replay.usage_reset);
        assert_eq!(user.scripts_this_month, 3);
    }

    #[test]
    fn first_invoice_keeps_usage() {
        let mut user = free_user();
        user.scripts_this_month = 1;
        let event = BillingEvent::InvoicePaid {
            customer_id: "cus_1".into(),
            billing_reason: Some("subscription_create".into()),
            issued_at: Some(at(4)),
        };
        let outcome = apply_event(&mut user, &event, &prices(), at(5));
        assert!(!outcome.usage_reset);
        assert_eq!(user.scripts_this_month, 1);
    }

    #[test]
    fn failed_payment_marks_past_due() {
        let mut user = free_user();
        user.tier = Tier::Pro;
        let event = BillingEvent::InvoicePaymentFailed {
            customer_id: "cus_1".into(),
        };
        let outcome = apply_event(&mut user, &event, &prices(), at(5));
        assert_eq!(user.status, SubscriptionStatus::PastDue);
        assert_eq!(user.tier, Tier::Pro);
        assert_eq!(outcome.tier_change_action(), None);
    }

    #[test]
    fn checkout_links_customer() {
        let mut user = User::new(UserId::new("user_2").unwrap(), "b@example.com", at(1));
        let event = BillingEvent::CheckoutCompleted {
            customer_id: "cus_9".into(),
            user_id: user.id.clone(),
            subscription_id: Some("sub_9".into()),
        };
        apply_event(&mut user, &event, &prices(), at(2));
        assert_eq!(user.billing.customer_id.as_deref(), Some("cus_9"));
        assert_eq!(user.billing.subscription_id.as_deref(), Some("sub_9"));
        assert_eq!(event.customer_id(), "cus_9");
    }
}
