//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use scriptforge_core::{Script, ScriptId, Transcript, UsageLog, User, UserId, Video, VideoId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{Store, UserUpdate};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write sequences on user records.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect every key (and value) under `prefix` in a column family.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Stage a user record and its customer index in a batch.
    fn stage_user(&self, batch: &mut WriteBatch, user: &User) -> Result<()> {
        let cf_users = self.cf(cf::USERS)?;
        batch.put_cf(&cf_users, keys::user_key(&user.id), Self::serialize(user)?);

        if let Some(customer_id) = &user.billing.customer_id {
            let cf_by_customer = self.cf(cf::USERS_BY_CUSTOMER)?;
            batch.put_cf(&cf_by_customer, customer_id.as_bytes(), keys::user_key(&user.id));
        }
        Ok(())
    }

    fn stage_log(&self, batch: &mut WriteBatch, log: &UsageLog) -> Result<()> {
        let cf_logs = self.cf(cf::USAGE_LOGS)?;
        batch.put_cf(
            &cf_logs,
            keys::usage_log_key(&log.user_id, &log.id),
            Self::serialize(log)?,
        );
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

fn paginate<T>(mut items: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    items.drain(..offset.min(items.len()));
    items.truncate(limit);
    items
}

impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn put_user(&self, user: &User) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        self.stage_user(&mut batch, user)?;
        self.write(batch)
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.get_value(cf::USERS, &keys::user_key(user_id))
    }

    fn get_user_by_customer(&self, customer_id: &str) -> Result<Option<User>> {
        let cf = self.cf(cf::USERS_BY_CUSTOMER)?;
        let Some(user_key) = self
            .db
            .get_cf(&cf, customer_id.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let user: Option<User> = self.get_value(cf::USERS, &user_key)?;
        // A relinked user leaves a stale index entry behind.
        Ok(user.filter(|u| u.billing.customer_id.as_deref() == Some(customer_id)))
    }

    fn insert_user(&self, user: &User) -> Result<bool> {
        let _guard = self.lock()?;
        if self.get_user(&user.id)?.is_some() {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        self.stage_user(&mut batch, user)?;
        self.write(batch)?;
        Ok(true)
    }

    fn update_user(
        &self,
        user_id: &UserId,
        apply: &mut dyn FnMut(&mut User) -> UserUpdate,
    ) -> Result<Option<User>> {
        let _guard = self.lock()?;
        let Some(current) = self.get_user(user_id)? else {
            return Ok(None);
        };

        let mut user = current.clone();
        let mut batch = WriteBatch::default();
        match apply(&mut user) {
            UserUpdate::Unchanged => return Ok(Some(current)),
            UserUpdate::Save => self.stage_user(&mut batch, &user)?,
            UserUpdate::SaveWithLog(log) => {
                self.stage_user(&mut batch, &user)?;
                self.stage_log(&mut batch, &log)?;
            }
        }
        self.write(batch)?;

        Ok(Some(user))
    }

    fn record_usage(&self, log: &UsageLog) -> Result<User> {
        let _guard = self.lock()?;

        let mut user = self
            .get_user(&log.user_id)?
            .ok_or_else(|| StoreError::not_found("user", &log.user_id))?;
        user.roll_usage_window(log.created_at);
        user.count_generation(log.created_at);

        // Write atomically
        let mut batch = WriteBatch::default();
        self.stage_user(&mut batch, &user)?;
        self.stage_log(&mut batch, log)?;
        self.write(batch)?;

        Ok(user)
    }

    // =========================================================================
    // Usage Log Operations
    // =========================================================================

    fn list_usage_logs(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageLog>> {
        let entries = self.scan_prefix(cf::USAGE_LOGS, &keys::user_prefix(user_id))?;

        // ULID keys are ascending; reverse for newest first.
        entries
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    // =========================================================================
    // Video Operations
    // =========================================================================

    fn put_video(&self, video: &Video) -> Result<()> {
        let _guard = self.lock()?;
        let cf_videos = self.cf(cf::VIDEOS)?;
        let cf_by_user = self.cf(cf::VIDEOS_BY_USER)?;
        let cf_by_external = self.cf(cf::VIDEOS_BY_EXTERNAL_ID)?;

        let external_key = keys::external_id_key(&video.user_id, &video.external_id);
        let existing = self
            .db
            .get_cf(&cf_by_external, &external_key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if let Some(existing) = existing {
            if existing.as_slice() != video.id.as_bytes() {
                return Err(StoreError::Conflict(format!(
                    "video {} already exists for user",
                    video.external_id
                )));
            }
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_videos, keys::video_key(&video.id), Self::serialize(video)?);
        batch.put_cf(&cf_by_user, keys::user_video_key(&video.user_id, &video.id), []);
        batch.put_cf(&cf_by_external, external_key, video.id.as_bytes());
        self.write(batch)
    }

    fn get_video(&self, video_id: &VideoId) -> Result<Option<Video>> {
        self.get_value(cf::VIDEOS, &keys::video_key(video_id))
    }

    fn get_video_by_external_id(
        &self,
        user_id: &UserId,
        external_id: &str,
    ) -> Result<Option<Video>> {
        let cf = self.cf(cf::VIDEOS_BY_EXTERNAL_ID)?;
        let Some(id) = self
            .db
            .get_cf(&cf, keys::external_id_key(user_id, external_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        self.get_value(cf::VIDEOS, &id)
    }

    fn list_videos_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Video>> {
        let mut videos = Vec::new();
        for (key, _) in self.scan_prefix(cf::VIDEOS_BY_USER, &keys::user_prefix(user_id))? {
            let Some(id) = keys::trailing_id(&key) else {
                continue;
            };
            if let Some(video) = self.get_video(&VideoId::from_bytes(id))? {
                videos.push(video);
            }
        }
        videos.sort_by(|a: &Video, b: &Video| b.created_at.cmp(&a.created_at));
        Ok(paginate(videos, limit, offset))
    }

    fn delete_video(&self, video_id: &VideoId) -> Result<()> {
        let _guard = self.lock()?;
        let video = self
            .get_video(video_id)?
            .ok_or_else(|| StoreError::not_found("video", video_id))?;

        let cf_videos = self.cf(cf::VIDEOS)?;
        let cf_by_user = self.cf(cf::VIDEOS_BY_USER)?;
        let cf_by_external = self.cf(cf::VIDEOS_BY_EXTERNAL_ID)?;
        let cf_transcripts = self.cf(cf::TRANSCRIPTS)?;
        let cf_scripts = self.cf(cf::SCRIPTS)?;
        let cf_scripts_by_user = self.cf(cf::SCRIPTS_BY_USER)?;
        let cf_scripts_by_video = self.cf(cf::SCRIPTS_BY_VIDEO)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_videos, keys::video_key(video_id));
        batch.delete_cf(&cf_by_user, keys::user_video_key(&video.user_id, video_id));
        batch.delete_cf(
            &cf_by_external,
            keys::external_id_key(&video.user_id, &video.external_id),
        );
        batch.delete_cf(&cf_transcripts, keys::video_key(video_id));

        for (key, _) in self.scan_prefix(cf::SCRIPTS_BY_VIDEO, video_id.as_bytes())? {
            let Some(id) = keys::trailing_id(&key) else {
                continue;
            };
            let script_id = ScriptId::from_bytes(id);
            batch.delete_cf(&cf_scripts, keys::script_key(&script_id));
            batch.delete_cf(
                &cf_scripts_by_user,
                keys::user_script_key(&video.user_id, &script_id),
            );
            batch.delete_cf(&cf_scripts_by_video, &key);
        }

        self.write(batch)
    }

    // =========================================================================
    // Transcript Operations
    // =========================================================================

    fn put_transcript(&self, transcript: &Transcript) -> Result<()> {
        if self.get_video(&transcript.video_id)?.is_none() {
            return Err(StoreError::not_found("video", transcript.video_id));
        }
        let cf = self.cf(cf::TRANSCRIPTS)?;
        self.db
            .put_cf(
                &cf,
                keys::video_key(&transcript.video_id),
                Self::serialize(transcript)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_transcript(&self, video_id: &VideoId) -> Result<Option<Transcript>> {
        self.get_value(cf::TRANSCRIPTS, &keys::video_key(video_id))
    }

    // =========================================================================
    // Script Operations
    // =========================================================================

    fn put_script(&self, script: &Script) -> Result<()> {
        let _guard = self.lock()?;
        if self.get_video(&script.video_id)?.is_none() {
            return Err(StoreError::not_found("video", script.video_id));
        }

        let cf_scripts = self.cf(cf::SCRIPTS)?;
        let cf_by_user = self.cf(cf::SCRIPTS_BY_USER)?;
        let cf_by_video = self.cf(cf::SCRIPTS_BY_VIDEO)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_scripts, keys::script_key(&script.id), Self::serialize(script)?);
        batch.put_cf(&cf_by_user, keys::user_script_key(&script.user_id, &script.id), []);
        batch.put_cf(&cf_by_video, keys::video_script_key(&script.video_id, &script.id), []);
        self.write(batch)
    }

    fn get_script(&self, script_id: &ScriptId) -> Result<Option<Script>> {
        self.get_value(cf::SCRIPTS, &keys::script_key(script_id))
    }

    fn list_scripts_by_user(
        &self,
        user_id: &UserId,
        video_id: Option<&VideoId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Script>> {
        let mut scripts = Vec::new();
        for (key, _) in self.scan_prefix(cf::SCRIPTS_BY_USER, &keys::user_prefix(user_id))? {
            let Some(id) = keys::trailing_id(&key) else {
                continue;
            };
            if let Some(script) = self.get_script(&ScriptId::from_bytes(id))? {
                if video_id.map_or(true, |v| &script.video_id == v) {
                    scripts.push(script);
                }
            }
        }
        scripts.sort_by(|a: &Script, b: &Script| b.created_at.cmp(&a.created_at));
        Ok(paginate(scripts, limit, offset))
    }

    // =========================================================================
    // Health
    // =========================================================================

    fn ping(&self) -> Result<()> {
        self.cf(cf::USERS).map(|_| ())
    }
}
