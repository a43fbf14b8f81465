//! In-memory storage implementation.
//!
//! All state sits behind one mutex, so every trait method is atomic. Failure
//! switches let tests force errors at specific points.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use scriptforge_core::{Script, ScriptId, Transcript, UsageLog, User, UserId, Video, VideoId};

use crate::error::{Result, StoreError};
use crate::{Store, UserUpdate};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    users_by_customer: HashMap<String, UserId>,
    usage_logs: Vec<UsageLog>,
    videos: HashMap<VideoId, Video>,
    transcripts: HashMap<VideoId, Transcript>,
    scripts: HashMap<ScriptId, Script>,
}

/// In-memory [`Store`], used by tests and local development.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_usage_log_writes: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write that appends a usage log entry fail.
    pub fn fail_usage_log_writes(&self, fail: bool) {
        self.fail_usage_log_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every operation fail, as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".into()));
        }
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn check_log_write(&self) -> Result<()> {
        if self.fail_usage_log_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("usage log write failed".into()));
        }
        Ok(())
    }
}

impl Inner {
    fn index_customer(&mut self, user: &User) {
        if let Some(customer_id) = &user.billing.customer_id {
            self.users_by_customer
                .insert(customer_id.clone(), user.id.clone());
        }
    }
}

fn paginate<T>(mut items: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    items.drain(..offset.min(items.len()));
    items.truncate(limit);
    items
}

impl Store for MemoryStore {
    fn put_user(&self, user: &User) -> Result<()> {
        let mut inner = self.lock()?;
        inner.index_customer(user);
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }

    fn get_user_by_customer(&self, customer_id: &str) -> Result<Option<User>> {
        let inner = self.lock()?;
        let user = inner
            .users_by_customer
            .get(customer_id)
            .and_then(|id| inner.users.get(id))
            .filter(|u| u.billing.customer_id.as_deref() == Some(customer_id))
            .cloned();
        Ok(user)
    }

    fn insert_user(&self, user: &User) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.users.contains_key(&user.id) {
            return Ok(false);
        }
        inner.index_customer(user);
        inner.users.insert(user.id.clone(), user.clone());
        Ok(true)
    }

    fn update_user(
        &self,
        user_id: &UserId,
        apply: &mut dyn FnMut(&mut User) -> UserUpdate,
    ) -> Result<Option<User>> {
        let mut inner = self.lock()?;
        let Some(current) = inner.users.get(user_id).cloned() else {
            return Ok(None);
        };

        let mut user = current.clone();
        let log = match apply(&mut user) {
            UserUpdate::Unchanged => return Ok(Some(current)),
            UserUpdate::Save => None,
            UserUpdate::SaveWithLog(log) => {
                self.check_log_write()?;
                Some(log)
            }
        };

        inner.index_customer(&user);
        inner.users.insert(user.id.clone(), user.clone());
        if let Some(log) = log {
            inner.usage_logs.push(log);
        }
        Ok(Some(user))
    }

    fn record_usage(&self, log: &UsageLog) -> Result<User> {
        let mut inner = self.lock()?;

        let mut user = inner
            .users
            .get(&log.user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", &log.user_id))?;
        user.roll_usage_window(log.created_at);
        user.count_generation(log.created_at);

        // Nothing is applied until both writes are known to succeed.
        self.check_log_write()?;
        inner.users.insert(user.id.clone(), user.clone());
        inner.usage_logs.push(log.clone());
        Ok(user)
    }

    fn list_usage_logs(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageLog>> {
        let inner = self.lock()?;
        let mut logs: Vec<UsageLog> = inner
            .usage_logs
            .iter()
            .filter(|l| &l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(logs, limit, offset))
    }

    fn put_video(&self, video: &Video) -> Result<()> {
        let mut inner = self.lock()?;
        let duplicate = inner.videos.values().any(|v| {
            v.id != video.id && v.user_id == video.user_id && v.external_id == video.external_id
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "video {} already exists for user",
                video.external_id
            )));
        }
        inner.videos.insert(video.id, video.clone());
        Ok(())
    }

    fn get_video(&self, video_id: &VideoId) -> Result<Option<Video>> {
        Ok(self.lock()?.videos.get(video_id).cloned())
    }

    fn get_video_by_external_id(
        &self,
        user_id: &UserId,
        external_id: &str,
    ) -> Result<Option<Video>> {
        let inner = self.lock()?;
        Ok(inner
            .videos
            .values()
            .find(|v| &v.user_id == user_id && v.external_id == external_id)
            .cloned())
    }

    fn list_videos_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Video>> {
        let inner = self.lock()?;
        let mut videos: Vec<Video> = inner
            .videos
            .values()
            .filter(|v| &v.user_id == user_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(videos, limit, offset))
    }

    fn delete_video(&self, video_id: &VideoId) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.videos.remove(video_id).is_none() {
            return Err(StoreError::not_found("video", video_id));
        }
        inner.transcripts.remove(video_id);
        inner.scripts.retain(|_, s| &s.video_id != video_id);
        Ok(())
    }

    fn put_transcript(&self, transcript: &Transcript) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.videos.contains_key(&transcript.video_id) {
            return Err(StoreError::not_found("video", transcript.video_id));
        }
        inner
            .transcripts
            .insert(transcript.video_id, transcript.clone());
        Ok(())
    }

    fn get_transcript(&self, video_id: &VideoId) -> Result<Option<Transcript>> {
        Ok(self.lock()?.transcripts.get(video_id).cloned())
    }

    fn put_script(&self, script: &Script) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.videos.contains_key(&script.video_id) {
            return Err(StoreError::not_found("video", script.video_id));
        }
        inner.scripts.insert(script.id, script.clone());
        Ok(())
    }

    fn get_script(&self, script_id: &ScriptId) -> Result<Option<Script>> {
        Ok(self.lock()?.scripts.get(script_id).cloned())
    }

    fn list_scripts_by_user(
        &self,
        user_id: &UserId,
        video_id: Option<&VideoId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Script>> {
        let inner = self.lock()?;
        let mut scripts: Vec<Script> = inner
            .scripts
            .values()
            .filter(|s| &s.user_id == user_id)
            .filter(|s| video_id.map_or(true, |v| &s.video_id == v))
            .cloned()
            .collect();
        scripts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(scripts, limit, offset))
    }

    fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use scriptforge_core::{
        ScriptOptions, ScriptRequest, ScriptStyle, SubscriptionStatus, Tier, TranscriptSegment,
        UsageAction, VideoMetadata,
    };
    use serde_json::json;

    fn user(id: &str) -> User {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap();
        User::new(UserId::new(id).unwrap(), format!("{id}@example.com"), now)
    }

    fn log_for(user: &User, minutes: i64) -> UsageLog {
        UsageLog::new(
            user.id.clone(),
            UsageAction::ScriptGenerated,
            json!({ "n": minutes }),
            user.usage_reset_at + Duration::minutes(minutes),
        )
    }

    fn video_for(user: &User, external_id: &str) -> Video {
        Video::new(
            external_id,
            user.id.clone(),
            VideoMetadata {
                title: "A video".into(),
                ..VideoMetadata::default()
            },
            Utc::now(),
        )
    }

    fn script_for(video: &Video) -> Script {
        Script::start(
            video.id,
            video.user_id.clone(),
            None,
            ScriptRequest {
                style: ScriptStyle::Casual,
                duration_minutes: 3,
                audience: "everyone".into(),
                options: ScriptOptions::default(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn record_usage_counts_and_logs() {
        let store = MemoryStore::new();
        let user = user("u1");
        store.put_user(&user).unwrap();

        let updated = store.record_usage(&log_for(&user, 1)).unwrap();
        assert_eq!(updated.scripts_this_month, 1);
        assert_eq!(updated.total_scripts, 1);
        assert_eq!(store.list_usage_logs(&user.id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn failed_log_write_applies_nothing() {
        let store = MemoryStore::new();
        let user = user("u1");
        store.put_user(&user).unwrap();

        store.fail_usage_log_writes(true);
        assert!(store.record_usage(&log_for(&user, 1)).is_err());

        let stored = store.get_user(&user.id).unwrap().unwrap();
        assert_eq!(stored.scripts_this_month, 0);
        assert_eq!(stored.total_scripts, 0);
        assert!(store.list_usage_logs(&user.id, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn record_usage_for_missing_user() {
        let store = MemoryStore::new();
        let err = store.record_usage(&log_for(&user("ghost"), 1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "user", .. }));
    }

    #[test]
    fn usage_logs_newest_first_with_paging() {
        let store = MemoryStore::new();
        let user = user("u1");
        store.put_user(&user).unwrap();
        for minute in 1..=3 {
            store.record_usage(&log_for(&user, minute)).unwrap();
        }

        let logs = store.list_usage_logs(&user.id, 2, 0).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].metadata["n"], 3);
        assert_eq!(logs[1].metadata["n"], 2);

        let rest = store.list_usage_logs(&user.id, 2, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].metadata["n"], 1);
    }

    #[test]
    fn insert_user_keeps_existing_record() {
        let store = MemoryStore::new();
        let user = user("u1");
        assert!(store.insert_user(&user).unwrap());
        store.record_usage(&log_for(&user, 1)).unwrap();

        assert!(!store.insert_user(&user).unwrap());
        assert_eq!(store.get_user(&user.id).unwrap().unwrap().scripts_this_month, 1);
    }

    #[test]
    fn update_user_applies_to_latest_record() {
        let store = MemoryStore::new();
        let user = user("u1");
        store.put_user(&user).unwrap();

        // A copy read before the generation was counted.
        let stale = store.get_user(&user.id).unwrap().unwrap();
        store.record_usage(&log_for(&user, 1)).unwrap();

        let updated = store
            .update_user(&stale.id, &mut |u: &mut User| {
                u.status = SubscriptionStatus::PastDue;
                UserUpdate::Save
            })
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, SubscriptionStatus::PastDue);
        assert_eq!(updated.scripts_this_month, 1);
        assert_eq!(store.get_user(&user.id).unwrap(), Some(updated));
    }

    #[test]
    fn update_user_unchanged_writes_nothing() {
        let store = MemoryStore::new();
        let user = user("u1");
        store.put_user(&user).unwrap();

        let result = store
            .update_user(&user.id, &mut |u: &mut User| {
                u.email = "ignored@example.com".into();
                UserUpdate::Unchanged
            })
            .unwrap();

        assert_eq!(result, Some(user.clone()));
        assert_eq!(store.get_user(&user.id).unwrap(), Some(user));
    }

    #[test]
    fn update_user_with_failed_log_applies_nothing() {
        let store = MemoryStore::new();
        let user = user("u1");
        store.put_user(&user).unwrap();
        store.fail_usage_log_writes(true);

        let log = log_for(&user, 1);
        let result = store.update_user(&user.id, &mut |u: &mut User| {
            u.tier = Tier::Pro;
            UserUpdate::SaveWithLog(log.clone())
        });

        assert!(result.is_err());
        assert_eq!(store.get_user(&user.id).unwrap().unwrap().tier, Tier::Free);
        assert!(store.list_usage_logs(&user.id, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn update_user_for_missing_user() {
        let store = MemoryStore::new();
        let mut calls = 0;
        let result = store
            .update_user(&UserId::new("ghost").unwrap(), &mut |_: &mut User| {
                calls += 1;
                UserUpdate::Save
            })
            .unwrap();

        assert!(result.is_none());
        assert_eq!(calls, 0);
    }

    #[test]
    fn customer_index_follows_relinks() {
        let store = MemoryStore::new();
        let mut user = user("u1");
        user.billing.customer_id = Some("cus_old".into());
        store.put_user(&user).unwrap();

        user.billing.customer_id = Some("cus_new".into());
        store.put_user(&user).unwrap();

        assert!(store.get_user_by_customer("cus_old").unwrap().is_none());
        assert_eq!(
            store.get_user_by_customer("cus_new").unwrap().unwrap().id,
            user.id
        );
    }

    #[test]
    fn external_id_is_unique_per_user() {
        let store = MemoryStore::new();
        let alice = user("alice");
        let bob = user("bob");

        store.put_video(&video_for(&alice, "dQw4w9WgXcQ")).unwrap();
        store.put_video(&video_for(&bob, "dQw4w9WgXcQ")).unwrap();
        assert!(matches!(
            store.put_video(&video_for(&alice, "dQw4w9WgXcQ")),
            Err(StoreError::Conflict(_))
        ));
        assert!(store
            .get_video_by_external_id(&bob.id, "dQw4w9WgXcQ")
            .unwrap()
            .is_some());
    }

    #[test]
    fn delete_video_cascades() {
        let store = MemoryStore::new();
        let owner = user("u1");
        let video = video_for(&owner, "dQw4w9WgXcQ");
        store.put_video(&video).unwrap();
        store
            .put_transcript(&Transcript::new(
                video.id,
                None,
                vec![TranscriptSegment {
                    start_ms: 0,
                    duration_ms: 1000,
                    text: "hi".into(),
                }],
                Utc::now(),
            ))
            .unwrap();
        let script = script_for(&video);
        store.put_script(&script).unwrap();

        store.delete_video(&video.id).unwrap();
        assert!(store.get_transcript(&video.id).unwrap().is_none());
        assert!(store.get_script(&script.id).unwrap().is_none());
        assert!(matches!(
            store.delete_video(&video.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn scripts_require_their_video() {
        let store = MemoryStore::new();
        let owner = user("u1");
        let video = video_for(&owner, "dQw4w9WgXcQ");
        assert!(store.put_script(&script_for(&video)).is_err());
    }

    #[test]
    fn unavailable_store_fails_ping() {
        let store = MemoryStore::new();
        store.ping().unwrap();
        store.set_unavailable(true);
        assert!(store.ping().is_err());
        assert!(store.get_user(&UserId::new("u1").unwrap()).is_err());
    }
}
