//! Transcript source.
//!
//! [`YoutubeTranscriptClient`] reads video metadata from the public oEmbed
//! endpoint and captions from the timed-text endpoint in `json3` format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use scriptforge_core::{TranscriptSegment, VideoMetadata};

/// Caption language requested from the timed-text endpoint.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Error type for transcript fetching.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The video does not exist or is private.
    #[error("video {0} not found")]
    VideoNotFound(String),

    /// The video has no captions in the requested language.
    #[error("no captions available for video {0}")]
    NoCaptions(String),

    /// Upstream answered with an unexpected status.
    #[error("upstream returned {0}")]
    Upstream(StatusCode),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A fetched transcript with the video's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTranscript {
    /// Title and thumbnail.
    pub metadata: VideoMetadata,
    /// Caption language.
    pub language: Option<String>,
    /// Timed segments in source order.
    pub segments: Vec<TranscriptSegment>,
}

/// Fetches transcripts by external video id.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch metadata and captions for `video_id`.
    async fn fetch(&self, video_id: &str) -> Result<FetchedTranscript, TranscriptError>;
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<CaptionEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionEvent {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<CaptionSeg>,
}

#[derive(Debug, Deserialize)]
struct CaptionSeg {
    #[serde(default)]
    utf8: String,
}

/// YouTube oEmbed + timed-text client.
#[derive(Debug, Clone)]
pub struct YoutubeTranscriptClient {
    client: Client,
    base_url: String,
}

impl YoutubeTranscriptClient {
    /// Create a client against `base_url` (normally `https://www.youtube.com`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, TranscriptError> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn metadata(&self, video_id: &str) -> Result<VideoMetadata, TranscriptError> {
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        let response = self
            .client
            .get(format!("{}/oembed", self.base_url))
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => {
                return Err(TranscriptError::VideoNotFound(video_id.to_string()));
            }
            s => return Err(TranscriptError::Upstream(s)),
        }

        let oembed: OEmbed = response
            .json()
            .await
            .map_err(|e| TranscriptError::InvalidResponse(e.to_string()))?;

        Ok(VideoMetadata {
            title: oembed.title,
            duration_seconds: None,
            thumbnail_url: oembed.thumbnail_url,
        })
    }

    async fn captions(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let response = self
            .client
            .get(format!("{}/api/timedtext", self.base_url))
            .query(&[("v", video_id), ("lang", DEFAULT_LANGUAGE), ("fmt", "json3")])
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(TranscriptError::NoCaptions(video_id.to_string())),
            s => return Err(TranscriptError::Upstream(s)),
        }

        // An empty body means "no track in this language"
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(TranscriptError::NoCaptions(video_id.to_string()));
        }

        let timed: TimedText =
            serde_json::from_str(&body).map_err(|e| TranscriptError::InvalidResponse(e.to_string()))?;
        let segments = flatten_events(timed.events);

        if segments.is_empty() {
            return Err(TranscriptError::NoCaptions(video_id.to_string()));
        }
        Ok(segments)
    }
}

/// Join each event's pieces into one segment, skipping blank events.
fn flatten_events(events: Vec<CaptionEvent>) -> Vec<TranscriptSegment> {
    events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then_some(TranscriptSegment {
                start_ms: event.t_start_ms,
                duration_ms: event.d_duration_ms,
                text,
            })
        })
        .collect()
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscriptClient {
    async fn fetch(&self, video_id: &str) -> Result<FetchedTranscript, TranscriptError> {
        let metadata = self.metadata(video_id).await?;
        let segments = self.captions(video_id).await?;

        tracing::debug!(video_id = %video_id, segments = segments.len(), "Fetched transcript");

        Ok(FetchedTranscript {
            metadata,
            language: Some(DEFAULT_LANGUAGE.to_string()),
            segments,
        })
    }
}
