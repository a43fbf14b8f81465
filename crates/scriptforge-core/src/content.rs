//! Videos, transcripts and generated scripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::{ScriptId, UserId, VideoId};

/// Shortest script that can be requested, in minutes.
pub const MIN_DURATION_MINUTES: u32 = 1;

/// Longest script that can be requested, in minutes.
pub const MAX_DURATION_MINUTES: u32 = 60;

/// A source video the user fetched a transcript for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    /// Internal id.
    pub id: VideoId,
    /// YouTube video id (11 characters).
    pub external_id: String,
    /// The user who fetched it.
    pub user_id: UserId,
    /// Video title.
    pub title: String,
    /// Length in seconds, when known.
    pub duration_seconds: Option<u32>,
    /// Thumbnail image URL.
    pub thumbnail_url: Option<String>,
    /// When the video was first fetched.
    pub created_at: DateTime<Utc>,
    /// When the metadata was last patched.
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a video record for a freshly fetched transcript.
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        user_id: UserId,
        metadata: VideoMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: VideoId::generate(),
            external_id: external_id.into(),
            user_id,
            title: metadata.title,
            duration_seconds: metadata.duration_seconds,
            thumbnail_url: metadata.thumbnail_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Patch title, duration and thumbnail. Identity fields never change.
    pub fn patch_metadata(&mut self, metadata: VideoMetadata, now: DateTime<Utc>) {
        self.title = metadata.title;
        if metadata.duration_seconds.is_some() {
            self.duration_seconds = metadata.duration_seconds;
        }
        if metadata.thumbnail_url.is_some() {
            self.thumbnail_url = metadata.thumbnail_url;
        }
        self.updated_at = now;
    }
}

/// Mutable descriptive fields of a video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Video title.
    pub title: String,
    /// Length in seconds, when known.
    pub duration_seconds: Option<u32>,
    /// Thumbnail image URL.
    pub thumbnail_url: Option<String>,
}

/// One timed caption line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Offset from the start of the video, in milliseconds.
    pub start_ms: u64,
    /// How long the line is shown, in milliseconds.
    pub duration_ms: u64,
    /// Caption text.
    pub text: String,
}

/// The ordered caption track of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// The video this transcript belongs to.
    pub video_id: VideoId,
    /// Caption language code, when known.
    pub language: Option<String>,
    /// Segments ordered by `start_ms`.
    pub segments: Vec<TranscriptSegment>,
    /// When the transcript was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Transcript {
    /// Build a transcript, sorting segments by start time.
    #[must_use]
    pub fn new(
        video_id: VideoId,
        language: Option<String>,
        mut segments: Vec<TranscriptSegment>,
        now: DateTime<Utc>,
    ) -> Self {
        segments.sort_by_key(|s| s.start_ms);
        Self {
            video_id,
            language,
            segments,
            fetched_at: now,
        }
    }

    /// All segment text joined by single spaces.
    #[must_use]
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        for segment in &self.segments {
            let line = segment.text.trim();
            if line.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(line);
        }
        text
    }

    /// Word count of the joined text.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum()
    }
}

/// Writing style of a generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptStyle {
    /// Clear, businesslike narration.
    Professional,
    /// Relaxed, conversational tone.
    Casual,
    /// Explains concepts step by step.
    Educational,
    /// Energetic, personality-driven.
    Entertaining,
    /// Argues toward a call to action.
    Persuasive,
    /// Story-driven structure.
    Narrative,
    /// Formal, citation-minded register.
    Academic,
}

impl ScriptStyle {
    /// Every style, in display order.
    pub const ALL: [ScriptStyle; 7] = [
        Self::Professional,
        Self::Casual,
        Self::Educational,
        Self::Entertaining,
        Self::Persuasive,
        Self::Narrative,
        Self::Academic,
    ];

    /// Whether the style is gated behind the advanced-styles entitlement.
    #[must_use]
    pub const fn is_advanced(self) -> bool {
        matches!(self, Self::Persuasive | Self::Narrative | Self::Academic)
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Educational => "educational",
            Self::Entertaining => "entertaining",
            Self::Persuasive => "persuasive",
            Self::Narrative => "narrative",
            Self::Academic => "academic",
        }
    }
}

impl fmt::Display for ScriptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == wanted)
            .ok_or_else(|| Error::InvalidValue {
                kind: "style",
                value: s.to_string(),
            })
    }
}

/// Lifecycle of a script. Leaves `Generating` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptStatus {
    /// The LLM call is in flight.
    Generating,
    /// Content is ready.
    Completed,
    /// The LLM provider returned an error.
    Error,
    /// The provider answered but produced no usable script.
    Failed,
}

impl ScriptStatus {
    /// Whether the status is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Generating)
    }
}

/// Optional content toggles for generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// Open with an attention hook.
    pub include_hook: bool,
    /// Close with a call to action.
    pub include_call_to_action: bool,
    /// Mark sections with approximate timestamps.
    pub include_timestamps: bool,
    /// Suggest B-roll shots in brackets.
    pub include_b_roll: bool,
}

/// A generated script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Script id.
    pub id: ScriptId,
    /// Source video.
    pub video_id: VideoId,
    /// Owner.
    pub user_id: UserId,
    /// Script this one was remixed from.
    pub parent_id: Option<ScriptId>,
    /// Generated text, or the failure reason for `Error`/`Failed`.
    pub content: String,
    /// Requested style.
    pub style: ScriptStyle,
    /// Target length in minutes.
    pub duration_minutes: u32,
    /// Intended audience.
    pub audience: String,
    /// Requested toggles.
    pub options: ScriptOptions,
    /// Lifecycle status.
    pub status: ScriptStatus,
    /// When generation started.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

/// Parameters for a new script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    /// Requested style.
    pub style: ScriptStyle,
    /// Target length in minutes.
    pub duration_minutes: u32,
    /// Intended audience.
    pub audience: String,
    /// Requested toggles.
    pub options: ScriptOptions,
}

impl Script {
    /// Start a script in the `Generating` state.
    #[must_use]
    pub fn start(
        video_id: VideoId,
        user_id: UserId,
        parent_id: Option<ScriptId>,
        request: ScriptRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ScriptId::generate(),
            video_id,
            user_id,
            parent_id,
            content: String::new(),
            style: request.style,
            duration_minutes: request.duration_minutes,
            audience: request.audience,
            options: request.options,
            status: ScriptStatus::Generating,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a terminal status with the given content.
    ///
    /// # Errors
    ///
    /// Returns `Error::ScriptAlreadyFinished` if the script already left
    /// `Generating`, or `Error::InvalidValue` if `status` is not terminal.
    pub fn finish(
        &mut self,
        status: ScriptStatus,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::ScriptAlreadyFinished {
                status: self.status,
            });
        }
        if !status.is_terminal() {
            return Err(Error::InvalidValue {
                kind: "script status",
                value: format!("{status:?}"),
            });
        }
        self.status = status;
        self.content = content.into();
        self.updated_at = now;
        Ok(())
    }
}
