//! Stripe webhook handler.
//!
//! Only signature and envelope problems are answered with 400. Once an event
//! is authentic, processing problems are logged and the event is acknowledged
//! so Stripe does not keep redelivering something that will fail the same way.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use scriptforge_core::{apply_event, BillingEvent, UsageLog, User, UserId};
use scriptforge_store::UserUpdate;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{decode_event, verify_signature, WebhookEvent};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let Some(secret) = state.config.stripe_webhook_secret.as_deref() else {
        tracing::warn!("Rejecting Stripe webhook: signing secret not configured");
        return Err(ApiError::BadRequest("Webhook signing not configured".into()));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    verify_signature(&body, signature, secret, Utc::now()).map_err(|e| {
        tracing::warn!(error = %e, "Invalid Stripe webhook signature");
        ApiError::BadRequest("Invalid webhook signature".into())
    })?;

    let event: WebhookEvent = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed Stripe webhook payload");
        ApiError::BadRequest("Invalid webhook payload".into())
    })?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    match decode_event(&event) {
        Ok(Some(billing_event)) => sync_subscription(&state, &event.id, &billing_event),
        Ok(None) => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
        }
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Failed to decode Stripe event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Apply a billing event to its user, logging instead of failing.
fn sync_subscription(state: &AppState, event_id: &str, event: &BillingEvent) {
    if let Err(e) = try_sync_subscription(state, event_id, event) {
        tracing::error!(event_id = %event_id, error = %e, "Failed to apply billing event");
    }
}

fn find_user_id(state: &AppState, event: &BillingEvent) -> Result<Option<UserId>, ApiError> {
    let user_id = match event {
        BillingEvent::CheckoutCompleted { user_id, .. } => Some(user_id.clone()),
        other => state
            .store
            .get_user_by_customer(other.customer_id())?
            .map(|user| user.id),
    };
    Ok(user_id)
}

fn warn_no_user(event_id: &str, event: &BillingEvent) {
    tracing::warn!(
        event_id = %event_id,
        kind = event.kind(),
        customer_id = %event.customer_id(),
        "No user for billing event"
    );
}

fn try_sync_subscription(
    state: &AppState,
    event_id: &str,
    event: &BillingEvent,
) -> Result<(), ApiError> {
    let Some(user_id) = find_user_id(state, event)? else {
        warn_no_user(event_id, event);
        return Ok(());
    };

    let now = Utc::now();
    let mut outcome = None;
    let updated = state.store.update_user(&user_id, &mut |user: &mut User| {
        let applied = apply_event(user, event, &state.prices, now);
        let update = if !applied.changed {
            UserUpdate::Unchanged
        } else if let Some(action) = applied.tier_change_action() {
            let metadata = applied.audit_metadata(event);
            UserUpdate::SaveWithLog(UsageLog::new(user.id.clone(), action, metadata, now))
        } else {
            UserUpdate::Save
        };
        outcome = Some(applied);
        update
    })?;

    let (Some(user), Some(outcome)) = (updated, outcome) else {
        warn_no_user(event_id, event);
        return Ok(());
    };

    if let Some(price_id) = &outcome.unknown_price {
        tracing::warn!(
            user_id = %user.id,
            price_id = %price_id,
            "Subscription price has no tier mapping; tier unchanged"
        );
    }

    if !outcome.changed {
        tracing::debug!(user_id = %user.id, kind = event.kind(), "Billing event changed nothing");
    } else if outcome.tier_change_action().is_some() {
        tracing::info!(
            user_id = %user.id,
            from_tier = %outcome.previous_tier,
            to_tier = %outcome.tier,
            status = ?outcome.status,
            "Subscription tier changed"
        );
    } else {
        tracing::info!(
            user_id = %user.id,
            kind = event.kind(),
            status = ?outcome.status,
            usage_reset = outcome.usage_reset,
            "Subscription synced"
        );
    }

    Ok(())
}
