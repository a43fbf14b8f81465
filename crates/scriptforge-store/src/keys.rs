//! Key encoding utilities for `RocksDB`.
//!
//! User ids are variable-length strings without control characters, so a
//! `0x00` byte after the user id terminates it unambiguously in compound keys.

use scriptforge_core::{ScriptId, UsageLogId, UserId, VideoId};

const SEPARATOR: u8 = 0x00;

/// Create a user key from a user ID.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_str().as_bytes().to_vec()
}

/// Create a prefix for iterating all records of a user in an index.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.as_str().len() + 1);
    key.extend_from_slice(user_id.as_str().as_bytes());
    key.push(SEPARATOR);
    key
}

/// Create a usage log key.
///
/// Format: `user_id || 0x00 || log_id (16 bytes)`
///
/// Since ULIDs are time-ordered, a user's entries sort by time.
#[must_use]
pub fn usage_log_key(user_id: &UserId, log_id: &UsageLogId) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(&log_id.to_bytes());
    key
}

/// Create a video key from a video ID.
#[must_use]
pub fn video_key(video_id: &VideoId) -> Vec<u8> {
    video_id.as_bytes().to_vec()
}

/// Create a user-video index key.
#[must_use]
pub fn user_video_key(user_id: &UserId, video_id: &VideoId) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(video_id.as_bytes());
    key
}

/// Create an external-id index key.
#[must_use]
pub fn external_id_key(user_id: &UserId, external_id: &str) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(external_id.as_bytes());
    key
}

/// Create a script key from a script ID.
#[must_use]
pub fn script_key(script_id: &ScriptId) -> Vec<u8> {
    script_id.as_bytes().to_vec()
}

/// Create a user-script index key.
#[must_use]
pub fn user_script_key(user_id: &UserId, script_id: &ScriptId) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(script_id.as_bytes());
    key
}

/// Create a video-script index key.
///
/// Format: `video_id (16 bytes) || script_id (16 bytes)`
#[must_use]
pub fn video_script_key(video_id: &VideoId, script_id: &ScriptId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(video_id.as_bytes());
    key.extend_from_slice(script_id.as_bytes());
    key
}

/// Read the trailing 16-byte id of an index key.
#[must_use]
pub fn trailing_id(key: &[u8]) -> Option<[u8; 16]> {
    let start = key.len().checked_sub(16)?;
    key[start..].try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prefix_is_terminated() {
        let a = UserId::new("user_1").unwrap();
        let b = UserId::new("user_10").unwrap();
        assert!(!user_prefix(&b).starts_with(&user_prefix(&a)));
    }

    #[test]
    fn usage_log_key_format() {
        let user_id = UserId::new("user_1").unwrap();
        let log_id = UsageLogId::generate();
        let key = usage_log_key(&user_id, &log_id);

        assert_eq!(key.len(), "user_1".len() + 1 + 16);
        assert!(key.starts_with(&user_prefix(&user_id)));
        assert_eq!(trailing_id(&key), Some(log_id.to_bytes()));
    }

    #[test]
    fn video_script_key_format() {
        let video_id = VideoId::generate();
        let script_id = ScriptId::generate();
        let key = video_script_key(&video_id, &script_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], video_id.as_bytes());
        assert_eq!(trailing_id(&key), Some(*script_id.as_bytes()));
    }

    #[test]
    fn short_keys_have_no_trailing_id() {
        assert_eq!(trailing_id(b"short"), None);
    }
}
