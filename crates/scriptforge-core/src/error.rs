//! Error types for ScriptForge domain logic.

use crate::ids::IdError;

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by pure domain logic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// The input does not name a YouTube video.
    #[error("not a recognizable YouTube URL or video id: {input}")]
    InvalidVideoUrl {
        /// The rejected input.
        input: String,
    },

    /// An enum-like value could not be parsed.
    #[error("invalid {kind}: {value}")]
    InvalidValue {
        /// What was being parsed (e.g. "tier", "style").
        kind: &'static str,
        /// The rejected text.
        value: String,
    },

    /// A script was asked to leave a terminal state.
    #[error("script already finished with status {status:?}")]
    ScriptAlreadyFinished {
        /// The terminal status the script is in.
        status: crate::ScriptStatus,
    },
}
