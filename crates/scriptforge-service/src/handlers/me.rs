//! Current-user handlers: profile, usage, subscription and activity.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use scriptforge_core::{
    Entitlements, SubscriptionStatus, Tier, TierLimits, UsageLog, UsageSnapshot, User,
};

use super::{ok, ApiResponse, Pagination};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::usage;

/// Public view of a user record.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User ID.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Stored subscription tier.
    pub tier: Tier,
    /// Subscription status.
    pub status: SubscriptionStatus,
    /// Scripts generated over the account's lifetime.
    pub total_scripts: u64,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            tier: user.tier,
            status: user.status,
            total_scripts: user.total_scripts,
            created_at: user.created_at,
        }
    }
}

/// Profile response.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// The stored record.
    pub user: UserResponse,
    /// Tier after overrides and status downgrade.
    pub effective_tier: Tier,
    /// Quota in the current window.
    pub usage: UsageSnapshot,
    /// Feature access at the effective tier.
    pub entitlements: Entitlements,
}

/// Subscription response.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// Stored tier.
    pub tier: Tier,
    /// Effective tier.
    pub effective_tier: Tier,
    /// Subscription status.
    pub status: SubscriptionStatus,
    /// Limits of the effective tier.
    pub limits: &'static TierLimits,
    /// Feature access at the effective tier.
    pub entitlements: Entitlements,
    /// Whether a billing customer is linked.
    pub has_billing_account: bool,
    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Whether the subscription ends with the period.
    pub cancel_at_period_end: bool,
}

/// One activity entry.
#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    /// Entry ID.
    pub id: String,
    /// What happened.
    pub action: scriptforge_core::UsageAction,
    /// Action details.
    pub metadata: serde_json::Value,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

impl From<UsageLog> for ActivityEntry {
    fn from(log: UsageLog) -> Self {
        Self {
            id: log.id.to_string(),
            action: log.action,
            metadata: log.metadata,
            created_at: log.created_at,
        }
    }
}

/// Get the caller's profile with usage and entitlements.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<MeResponse>>, ApiError> {
    let check = usage::check(&state, &auth, Utc::now())?;

    Ok(ok(MeResponse {
        user: UserResponse::from(&check.user),
        effective_tier: check.tier,
        usage: check.usage,
        entitlements: Entitlements::for_tier(check.tier),
    }))
}

/// Get the caller's usage snapshot.
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<UsageSnapshot>>, ApiError> {
    let check = usage::check(&state, &auth, Utc::now())?;
    Ok(ok(check.usage))
}

/// Get the caller's subscription and tier limits.
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<SubscriptionResponse>>, ApiError> {
    let check = usage::check(&state, &auth, Utc::now())?;
    let billing = &check.user.billing;

    Ok(ok(SubscriptionResponse {
        tier: check.user.tier,
        effective_tier: check.tier,
        status: check.user.status,
        limits: check.tier.limits(),
        entitlements: Entitlements::for_tier(check.tier),
        has_billing_account: billing.customer_id.is_some(),
        current_period_end: billing.current_period_end,
        cancel_at_period_end: billing.cancel_at_period_end,
    }))
}

/// List the caller's recent usage log entries, newest first.
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(page): Query<Pagination>,
) -> Result<Json<ApiResponse<Vec<ActivityEntry>>>, ApiError> {
    let (limit, offset) = page.bounds();
    let logs = state.store.list_usage_logs(&auth.user_id, limit, offset)?;

    Ok(ok(logs.into_iter().map(ActivityEntry::from).collect()))
}
