//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary user records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Index: billing customer id to `user_id`.
    pub const USERS_BY_CUSTOMER: &str = "users_by_customer";

    /// Usage log entries, keyed by `user_id || 0x00 || log_id` (ULID).
    pub const USAGE_LOGS: &str = "usage_logs";

    /// Video records, keyed by `video_id`.
    pub const VIDEOS: &str = "videos";

    /// Index: videos by user, keyed by `user_id || 0x00 || video_id`.
    /// Value is empty (index only).
    pub const VIDEOS_BY_USER: &str = "videos_by_user";

    /// Index: `user_id || 0x00 || external_id` to `video_id`.
    pub const VIDEOS_BY_EXTERNAL_ID: &str = "videos_by_external_id";

    /// Transcripts, keyed by `video_id`.
    pub const TRANSCRIPTS: &str = "transcripts";

    /// Script records, keyed by `script_id`.
    pub const SCRIPTS: &str = "scripts";

    /// Index: scripts by user, keyed by `user_id || 0x00 || script_id`.
    pub const SCRIPTS_BY_USER: &str = "scripts_by_user";

    /// Index: scripts by video, keyed by `video_id || script_id`.
    pub const SCRIPTS_BY_VIDEO: &str = "scripts_by_video";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::USERS_BY_CUSTOMER,
        cf::USAGE_LOGS,
        cf::VIDEOS,
        cf::VIDEOS_BY_USER,
        cf::VIDEOS_BY_EXTERNAL_ID,
        cf::TRANSCRIPTS,
        cf::SCRIPTS,
        cf::SCRIPTS_BY_USER,
        cf::SCRIPTS_BY_VIDEO,
    ]
}
