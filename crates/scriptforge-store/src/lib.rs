//! Storage layer for ScriptForge.
//!
//! This crate persists users, videos, transcripts, scripts and the usage log
//! behind the [`Store`] trait. Two implementations are provided:
//!
//! - [`MemoryStore`]: in-process maps, used by tests and local development
//! - `RocksStore` (feature `rocksdb-backend`): `RocksDB` with column families
//!   and CBOR-encoded values
//!
//! # Atomicity
//!
//! [`Store::record_usage`] and [`Store::update_user`] re-read the user record
//! and write it back under the store's write lock, so concurrent updates to
//! the same user never overwrite each other. A usage log entry written with
//! the record lands together with it or not at all. Deleting a video removes
//! its transcript and scripts in the same write.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use scriptforge_core::{User, UserId};
//! use scriptforge_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let user = User::new(UserId::new("user_1").unwrap(), "a@example.com", Utc::now());
//! store.put_user(&user).unwrap();
//!
//! let found = store.get_user(&user.id).unwrap();
//! assert_eq!(found, Some(user));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use scriptforge_core::{
    Script, ScriptId, Transcript, UsageLog, User, UserId, Video, VideoId,
};

/// Decision returned by a [`Store::update_user`] closure.
#[derive(Debug, Clone, PartialEq)]
pub enum UserUpdate {
    /// Leave the stored record as it was.
    Unchanged,
    /// Persist the modified record.
    Save,
    /// Persist the modified record together with a usage log entry.
    SaveWithLog(UsageLog),
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert or update a user record.
    ///
    /// This also maintains the billing customer index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Get the user linked to a billing customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user_by_customer(&self, customer_id: &str) -> Result<Option<User>>;

    /// Insert a user record unless one with the same ID exists.
    ///
    /// Returns `false` and writes nothing when the user already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_user(&self, user: &User) -> Result<bool>;

    /// Modify the current record of `user_id` in place.
    ///
    /// `apply` runs on a freshly loaded copy while the write lock is held and
    /// must not call back into the store. Its [`UserUpdate`] decides what is
    /// persisted. Returns `None` if the user doesn't exist, otherwise the
    /// record as stored afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written.
    fn update_user(
        &self,
        user_id: &UserId,
        apply: &mut dyn FnMut(&mut User) -> UserUpdate,
    ) -> Result<Option<User>>;

    /// Count one generation for `log.user_id` and append `log`, atomically.
    ///
    /// The usage window is rolled first if the month changed since the last
    /// reset. Returns the updated user.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - Any database error; in that case neither write is applied.
    fn record_usage(&self, log: &UsageLog) -> Result<User>;

    // =========================================================================
    // Usage Log Operations
    // =========================================================================

    /// List usage log entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_usage_logs(&self, user_id: &UserId, limit: usize, offset: usize)
        -> Result<Vec<UsageLog>>;

    // =========================================================================
    // Video Operations
    // =========================================================================

    /// Insert or update a video record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another video of the same user
    /// already has this external id.
    fn put_video(&self, video: &Video) -> Result<()>;

    /// Get a video by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_video(&self, video_id: &VideoId) -> Result<Option<Video>>;

    /// Get a user's video by its external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_video_by_external_id(&self, user_id: &UserId, external_id: &str)
        -> Result<Option<Video>>;

    /// List a user's videos, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_videos_by_user(&self, user_id: &UserId, limit: usize, offset: usize)
        -> Result<Vec<Video>>;

    /// Delete a video with its transcript and scripts.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the video doesn't exist.
    fn delete_video(&self, video_id: &VideoId) -> Result<()>;

    // =========================================================================
    // Transcript Operations
    // =========================================================================

    /// Insert or replace the transcript of a video.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the video doesn't exist.
    fn put_transcript(&self, transcript: &Transcript) -> Result<()>;

    /// Get the transcript of a video.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transcript(&self, video_id: &VideoId) -> Result<Option<Transcript>>;

    // =========================================================================
    // Script Operations
    // =========================================================================

    /// Insert or update a script.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the script's video doesn't exist.
    fn put_script(&self, script: &Script) -> Result<()>;

    /// Get a script by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_script(&self, script_id: &ScriptId) -> Result<Option<Script>>;

    /// List a user's scripts, newest first, optionally for one video.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_scripts_by_user(
        &self,
        user_id: &UserId,
        video_id: Option<&VideoId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Script>>;

    // =========================================================================
    // Health
    // =========================================================================

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve requests.
    fn ping(&self) -> Result<()>;
}
