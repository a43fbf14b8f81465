//! Transcript extraction handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use scriptforge_core::{extract_video_id, Transcript, Video};

use super::{json_body, ok, ApiResponse};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::transcript::TranscriptError;
use crate::usage;

/// Name reported in 502 responses for transcript failures.
const SERVICE_NAME: &str = "youtube";

/// Transcript request.
#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    /// A YouTube URL or bare 11-character video id.
    pub url: String,
}

/// A video with its freshly fetched transcript.
#[derive(Debug, Serialize)]
pub struct VideoWithTranscript {
    /// The stored video.
    pub video: Video,
    /// The stored transcript.
    pub transcript: Transcript,
    /// Words across all segments.
    pub word_count: usize,
}

/// Fetch (or refetch) the transcript for a video.
///
/// The video record is created on first fetch; later fetches only patch its
/// metadata. The transcript is replaced each time.
pub async fn fetch_transcript(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<TranscriptRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<VideoWithTranscript>>, ApiError> {
    let request = json_body(body)?;
    let external_id = extract_video_id(&request.url)?;

    let fetcher = state
        .transcripts
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Transcript source not configured".into()))?;

    let now = Utc::now();
    usage::load_user(state.store.as_ref(), &auth, now)?;

    let fetched = fetcher.fetch(&external_id).await.map_err(|e| match e {
        TranscriptError::VideoNotFound(_) | TranscriptError::NoCaptions(_) => {
            ApiError::NotFound(e.to_string())
        }
        other => ApiError::external(SERVICE_NAME, other),
    })?;

    let video = match state
        .store
        .get_video_by_external_id(&auth.user_id, &external_id)?
    {
        Some(mut video) => {
            video.patch_metadata(fetched.metadata, now);
            video
        }
        None => Video::new(external_id, auth.user_id.clone(), fetched.metadata, now),
    };
    state.store.put_video(&video)?;

    let transcript = Transcript::new(video.id, fetched.language, fetched.segments, now);
    state.store.put_transcript(&transcript)?;

    tracing::info!(
        user_id = %auth.user_id,
        video_id = %video.id,
        external_id = %video.external_id,
        segments = transcript.segments.len(),
        "Stored transcript"
    );

    Ok(ok(VideoWithTranscript {
        word_count: transcript.word_count(),
        video,
        transcript,
    }))
}
