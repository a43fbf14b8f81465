//! Stripe webhook verification and event decoding.
//!
//! Signatures follow Stripe's scheme: the `Stripe-Signature` header carries
//! `t=<unix>,v1=<hex>[,v1=<hex>...]` and each `v1` is HMAC-SHA256 over
//! `"{t}.{body}"` with the endpoint's signing secret.

use chrono::{DateTime, Utc};

use scriptforge_core::{BillingEvent, SubscriptionStatus, SubscriptionUpdate, UserId};

use super::client::StripeError;
use super::types::{CheckoutSession, Invoice, Subscription, WebhookEvent};
use crate::crypto::{constant_time_eq, hmac_sha256_hex};

/// Maximum age (and future skew) of a signed timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header against the raw body.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::InvalidSignature)?;
    let signed_at: i64 = timestamp.parse().map_err(|_| StripeError::InvalidSignature)?;

    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature);
    }

    if now.timestamp().abs_diff(signed_at) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(StripeError::StaleTimestamp);
    }

    let expected = hmac_sha256_hex(secret.as_bytes(), format!("{timestamp}.{payload}").as_bytes());

    if signatures
        .iter()
        .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes()))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature)
    }
}

/// Build a `Stripe-Signature` header for `payload` signed at `timestamp`.
#[must_use]
pub fn signature_header(payload: &str, secret: &str, timestamp: i64) -> String {
    let signature = hmac_sha256_hex(secret.as_bytes(), format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={signature}")
}

/// Translate a webhook event into a billing event.
///
/// Returns `Ok(None)` for event types billing sync does not act on.
pub fn decode_event(event: &WebhookEvent) -> Result<Option<BillingEvent>, StripeError> {
    let object = &event.data.object;

    let billing_event = match event.event_type.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            let subscription: Subscription = serde_json::from_value(object.clone())?;
            Some(subscription_upserted(subscription)?)
        }
        "customer.subscription.deleted" => {
            let subscription: Subscription = serde_json::from_value(object.clone())?;
            Some(BillingEvent::SubscriptionDeleted {
                customer_id: subscription.customer.id().to_string(),
            })
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            let invoice: Invoice = serde_json::from_value(object.clone())?;
            Some(BillingEvent::InvoicePaid {
                customer_id: invoice.customer.id().to_string(),
                billing_reason: invoice.billing_reason,
                issued_at: invoice.created.and_then(from_unix),
            })
        }
        "invoice.payment_failed" => {
            let invoice: Invoice = serde_json::from_value(object.clone())?;
            Some(BillingEvent::InvoicePaymentFailed {
                customer_id: invoice.customer.id().to_string(),
            })
        }
        "checkout.session.completed" => {
            let session: CheckoutSession = serde_json::from_value(object.clone())?;
            Some(checkout_completed(session)?)
        }
        _ => None,
    };

    Ok(billing_event)
}

fn subscription_upserted(subscription: Subscription) -> Result<BillingEvent, StripeError> {
    let status = SubscriptionStatus::from_stripe(&subscription.status).ok_or_else(|| {
        StripeError::Payload(format!("unknown subscription status {}", subscription.status))
    })?;

    let item = subscription.items.data.first();
    let current_period_start = subscription
        .current_period_start
        .or_else(|| item.and_then(|i| i.current_period_start))
        .and_then(from_unix);
    let current_period_end = subscription
        .current_period_end
        .or_else(|| item.and_then(|i| i.current_period_end))
        .and_then(from_unix);

    Ok(BillingEvent::SubscriptionUpserted {
        customer_id: subscription.customer.id().to_string(),
        subscription: SubscriptionUpdate {
            subscription_id: subscription.id,
            price_id: item.map(|i| i.price.id.clone()),
            status,
            current_period_start,
            current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
        },
    })
}

fn checkout_completed(session: CheckoutSession) -> Result<BillingEvent, StripeError> {
    let customer_id = session
        .customer
        .ok_or_else(|| StripeError::Payload("checkout session without customer".into()))?;
    let user_id = session
        .client_reference_id
        .ok_or_else(|| StripeError::Payload("checkout session without client_reference_id".into()))?;
    let user_id = UserId::new(user_id)
        .map_err(|_| StripeError::Payload("invalid client_reference_id".into()))?;

    Ok(BillingEvent::CheckoutCompleted {
        customer_id: customer_id.id().to_string(),
        user_id,
        subscription_id: session.subscription.map(|s| s.id().to_string()),
    })
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
