//! Subscription checkout handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use scriptforge_core::{Tier, User};
use scriptforge_store::UserUpdate;

use super::{json_body, ok, ApiResponse};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::usage;

/// Name reported in 502 responses for billing failures.
const SERVICE_NAME: &str = "stripe";

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Paid tier to subscribe to.
    pub tier: Tier,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Checkout session ID.
    pub session_id: String,
    /// Hosted checkout page to redirect to.
    pub url: Option<String>,
}

/// Open a subscription checkout session for a paid tier.
///
/// The billing customer is created on first checkout and stored on the user;
/// the tier itself only changes once the subscription webhooks arrive.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CheckoutResponse>>, ApiError> {
    let stripe = state
        .stripe
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Billing not configured".into()))?;

    let request = json_body(body)?;
    if !request.tier.is_paid() {
        return Err(ApiError::validation("tier", "choose a paid tier"));
    }
    let price_id = state
        .prices
        .price_for(request.tier)
        .ok_or_else(|| {
            ApiError::BadRequest(format!("no price configured for tier {}", request.tier))
        })?
        .to_string();

    let user = usage::load_user(state.store.as_ref(), &auth, Utc::now())?;

    let customer_id = match user.billing.customer_id.clone() {
        Some(id) => id,
        None => {
            let customer = stripe
                .create_customer(&user.id, Some(&user.email))
                .await
                .map_err(|e| ApiError::external(SERVICE_NAME, e))?;

            tracing::info!(user_id = %user.id, customer_id = %customer.id, "Created billing customer");

            let now = Utc::now();
            let linked = state.store.update_user(&user.id, &mut |stored: &mut User| {
                if stored.billing.customer_id.is_some() {
                    return UserUpdate::Unchanged;
                }
                stored.billing.customer_id = Some(customer.id.clone());
                stored.updated_at = now;
                UserUpdate::Save
            })?;

            // A concurrent checkout may have linked its own customer first.
            linked
                .and_then(|stored| stored.billing.customer_id)
                .unwrap_or(customer.id)
        }
    };

    let frontend = state.config.frontend_url.trim_end_matches('/');
    let success_url = format!("{frontend}/dashboard?checkout=success");
    let cancel_url = format!("{frontend}/pricing?checkout=canceled");

    let session = stripe
        .create_subscription_checkout(
            &customer_id,
            &user.id,
            &price_id,
            request.tier,
            &success_url,
            &cancel_url,
        )
        .await
        .map_err(|e| ApiError::external(SERVICE_NAME, e))?;

    tracing::info!(
        user_id = %user.id,
        tier = %request.tier,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(ok(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}
