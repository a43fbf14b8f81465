//! Usage accounting for request handlers.
//!
//! `check` loads (or lazily creates) the caller's record, rolls the monthly
//! window, resolves the effective tier and computes the quota snapshot.
//! `record` counts a finished generation together with its usage log entry.

use chrono::{DateTime, Utc};
use serde_json::Value;

use scriptforge_core::{Tier, UsageAction, UsageLog, UsageSnapshot, User};
use scriptforge_store::{Store, StoreError, UserUpdate};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// The caller's record with its resolved tier and quota.
#[derive(Debug, Clone)]
pub struct UsageCheck {
    /// Stored user record, window already rolled.
    pub user: User,
    /// Effective tier after overrides and status downgrade.
    pub tier: Tier,
    /// Quota in the current window.
    pub usage: UsageSnapshot,
}

impl UsageCheck {
    /// Fail with 429 and the snapshot when no generation is left.
    pub fn require_quota(&self) -> Result<(), ApiError> {
        if self.usage.can_generate {
            Ok(())
        } else {
            Err(ApiError::QuotaExceeded(self.usage.clone()))
        }
    }
}

/// Load the caller's record, creating it on first access.
///
/// A rolled usage window or a changed email is persisted immediately.
pub fn load_user(store: &dyn Store, auth: &AuthUser, now: DateTime<Utc>) -> Result<User, ApiError> {
    let mut refresh = |user: &mut User| refresh_profile(user, auth, now);

    if let Some(user) = store.update_user(&auth.user_id, &mut refresh)? {
        return Ok(user);
    }

    let user = User::new(auth.user_id.clone(), auth.email.clone(), now);
    if store.insert_user(&user)? {
        tracing::info!(user_id = %user.id, "Created user on first access");
        return Ok(user);
    }

    // Another request created the record first.
    store
        .update_user(&auth.user_id, &mut refresh)?
        .ok_or_else(|| StoreError::not_found("user", &auth.user_id).into())
}

fn refresh_profile(user: &mut User, auth: &AuthUser, now: DateTime<Utc>) -> UserUpdate {
    let mut dirty = user.roll_usage_window(now);
    if dirty {
        tracing::debug!(user_id = %user.id, "Usage window rolled over");
    }

    if !auth.email.is_empty() && user.email != auth.email {
        user.email.clone_from(&auth.email);
        user.updated_at = now;
        dirty = true;
    }

    if dirty {
        UserUpdate::Save
    } else {
        UserUpdate::Unchanged
    }
}

/// Load the caller and compute their effective tier and quota.
pub fn check(state: &AppState, auth: &AuthUser, now: DateTime<Utc>) -> Result<UsageCheck, ApiError> {
    let user = load_user(state.store.as_ref(), auth, now)?;
    let tier = state.policy.effective_tier(&user, auth.signals);
    let usage = UsageSnapshot::compute(&user, tier, now);

    Ok(UsageCheck { user, tier, usage })
}

/// Count a generation and append its usage log entry.
///
/// The generation already happened, so failures are logged rather than
/// returned. Returns the updated record when the write landed.
pub fn record(
    store: &dyn Store,
    user: &User,
    action: UsageAction,
    metadata: Value,
    now: DateTime<Utc>,
) -> Option<User> {
    let log = UsageLog::new(user.id.clone(), action, metadata, now);

    match store.record_usage(&log) {
        Ok(updated) => {
            tracing::debug!(
                user_id = %updated.id,
                scripts_this_month = updated.scripts_this_month,
                "Recorded usage"
            );
            Some(updated)
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Failed to record usage");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scriptforge_core::{ResolutionSignals, UserId};
    use scriptforge_store::MemoryStore;

    fn auth(email: &str) -> AuthUser {
        AuthUser {
            user_id: UserId::new("user_usage").unwrap(),
            email: email.to_string(),
            signals: ResolutionSignals::default(),
        }
    }

    fn at(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_access_creates_free_user() {
        let store = MemoryStore::new();
        let user = load_user(&store, &auth("a@example.com"), at(3, 1)).unwrap();

        assert_eq!(user.tier, Tier::Free);
        assert!(store.get_user(&user.id).unwrap().is_some());
    }

    #[test]
    fn loading_twice_in_a_month_keeps_counter() {
        let store = MemoryStore::new();
        let user = load_user(&store, &auth("a@example.com"), at(3, 1)).unwrap();
        let log = UsageLog::new(user.id.clone(), UsageAction::ScriptGenerated, Value::Null, at(3, 2));
        store.record_usage(&log).unwrap();

        let first = load_user(&store, &auth("a@example.com"), at(3, 10)).unwrap();
        let second = load_user(&store, &auth("a@example.com"), at(3, 20)).unwrap();

        assert_eq!(first.scripts_this_month, 1);
        assert_eq!(second.scripts_this_month, 1);
    }

    #[test]
    fn month_boundary_resets_and_persists() {
        let store = MemoryStore::new();
        let user = load_user(&store, &auth("a@example.com"), at(3, 1)).unwrap();
        let log = UsageLog::new(user.id.clone(), UsageAction::ScriptGenerated, Value::Null, at(3, 2));
        store.record_usage(&log).unwrap();

        let rolled = load_user(&store, &auth("a@example.com"), at(4, 1)).unwrap();
        assert_eq!(rolled.scripts_this_month, 0);
        assert_eq!(rolled.total_scripts, 1);

        let stored = store.get_user(&rolled.id).unwrap().unwrap();
        assert_eq!(stored.usage_reset_at, at(4, 1));
    }

    #[test]
    fn email_change_is_synced() {
        let store = MemoryStore::new();
        load_user(&store, &auth("old@example.com"), at(3, 1)).unwrap();
        let user = load_user(&store, &auth("new@example.com"), at(3, 2)).unwrap();
        assert_eq!(user.email, "new@example.com");
    }

    #[test]
    fn refresh_keeps_usage_recorded_after_read() {
        let store = MemoryStore::new();
        let stale = load_user(&store, &auth("a@example.com"), at(3, 1)).unwrap();
        record(&store, &stale, UsageAction::ScriptGenerated, Value::Null, at(3, 2)).unwrap();

        // The email change is written onto the current record, not `stale`.
        let user = load_user(&store, &auth("new@example.com"), at(3, 3)).unwrap();

        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.scripts_this_month, 1);
        assert_eq!(store.get_user(&user.id).unwrap().unwrap().total_scripts, 1);
    }

    #[test]
    fn record_failure_is_swallowed() {
        let store = MemoryStore::new();
        let user = load_user(&store, &auth(""), at(3, 1)).unwrap();
        store.fail_usage_log_writes(true);

        let result = record(&store, &user, UsageAction::ScriptGenerated, Value::Null, at(3, 2));

        assert!(result.is_none());
        assert_eq!(store.get_user(&user.id).unwrap().unwrap().scripts_this_month, 0);
    }
}
