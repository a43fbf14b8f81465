//! Video handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use scriptforge_core::{Transcript, Video, VideoId};

use super::{ok, parse_id, ApiResponse, Pagination};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// A video with its transcript, if one was fetched.
#[derive(Debug, Serialize)]
pub struct VideoDetail {
    /// The video.
    pub video: Video,
    /// Its transcript.
    pub transcript: Option<Transcript>,
}

/// Deletion acknowledgement.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    /// The deleted video.
    pub id: VideoId,
    /// Always `true`.
    pub deleted: bool,
}

/// Load a video owned by the caller. Other users' videos are reported missing.
fn owned_video(state: &AppState, auth: &AuthUser, raw_id: &str) -> Result<Video, ApiError> {
    let video_id: VideoId = parse_id(raw_id, "video")?;
    state
        .store
        .get_video(&video_id)?
        .filter(|video| video.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("video not found: {video_id}")))
}

/// List the caller's videos, newest first.
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(page): Query<Pagination>,
) -> Result<Json<ApiResponse<Vec<Video>>>, ApiError> {
    let (limit, offset) = page.bounds();
    let videos = state.store.list_videos_by_user(&auth.user_id, limit, offset)?;
    Ok(ok(videos))
}

/// Get one video with its transcript.
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<VideoDetail>>, ApiError> {
    let video = owned_video(&state, &auth, &id)?;
    let transcript = state.store.get_transcript(&video.id)?;

    Ok(ok(VideoDetail { video, transcript }))
}

/// Delete a video together with its transcript and scripts.
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    let video = owned_video(&state, &auth, &id)?;
    state.store.delete_video(&video.id)?;

    tracing::info!(user_id = %auth.user_id, video_id = %video.id, "Deleted video");

    Ok(ok(DeletedResponse {
        id: video.id,
        deleted: true,
    }))
}
