//! Script generation handlers.
//!
//! Generation runs inline: the script row is stored as `GENERATING`, the LLM is
//! awaited, and the row moves to exactly one terminal status before the
//! response is sent. Provider errors leave the row in `ERROR` with the reason as
//! its content; an empty completion leaves it `FAILED`. Neither is retried.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use scriptforge_core::prompt::{apply_watermark, build_generation_prompt, build_remix_prompt};
use scriptforge_core::{
    has_advanced_style_access, has_priority_processing, has_remix_access, requires_watermark,
    Feature, GenerationBrief, Prompt, Script, ScriptId, ScriptOptions, ScriptRequest,
    ScriptStatus, ScriptStyle, UsageAction, UsageSnapshot, VideoId, MAX_DURATION_MINUTES,
    MIN_DURATION_MINUTES,
};

use super::{json_body, ok, parse_id, ApiResponse, Pagination};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::usage::{self, UsageCheck};

/// Name reported in 502 responses for generation failures.
const SERVICE_NAME: &str = "llm";

/// Longest accepted audience description, in characters.
pub const MAX_AUDIENCE_CHARS: usize = 200;

/// Generate request.
#[derive(Debug, Deserialize)]
pub struct GenerateScriptRequest {
    /// Video to write about; its transcript must have been fetched.
    pub video_id: String,
    /// Writing style.
    pub style: ScriptStyle,
    /// Target length in minutes (1-60).
    pub duration_minutes: u32,
    /// Who the script is for.
    pub audience: String,
    /// Content toggles.
    #[serde(default)]
    pub options: ScriptOptions,
}

/// Remix request. Omitted fields keep the source script's values.
#[derive(Debug, Deserialize)]
pub struct RemixScriptRequest {
    /// New writing style.
    pub style: ScriptStyle,
    /// New target length in minutes.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// New audience.
    #[serde(default)]
    pub audience: Option<String>,
    /// New content toggles.
    #[serde(default)]
    pub options: Option<ScriptOptions>,
}

/// `GET /api/scripts` filters.
#[derive(Debug, Deserialize)]
pub struct ListScriptsQuery {
    /// Only scripts for this video.
    #[serde(default)]
    pub video_id: Option<String>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Items to skip.
    #[serde(default)]
    pub offset: Option<usize>,
}

/// A finished script with the caller's remaining quota.
#[derive(Debug, Serialize)]
pub struct GeneratedScript {
    /// The script.
    pub script: Script,
    /// Quota after this generation.
    pub usage: UsageSnapshot,
}

fn validate_duration(minutes: u32) -> Result<u32, ApiError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(ApiError::validation(
            "duration_minutes",
            format!("duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"),
        ))
    }
}

fn validate_audience(audience: &str) -> Result<String, ApiError> {
    let audience = audience.trim();
    let chars = audience.chars().count();
    if chars == 0 || chars > MAX_AUDIENCE_CHARS {
        return Err(ApiError::validation(
            "audience",
            format!("audience must be 1 to {MAX_AUDIENCE_CHARS} characters"),
        ));
    }
    Ok(audience.to_string())
}

fn require_style(check: &UsageCheck, style: ScriptStyle) -> Result<(), ApiError> {
    if has_advanced_style_access(check.tier, style) {
        Ok(())
    } else {
        Err(ApiError::forbidden(Feature::AdvancedStyles, check.tier))
    }
}

fn owned_script(state: &AppState, auth: &AuthUser, raw_id: &str) -> Result<Script, ApiError> {
    let script_id: ScriptId = parse_id(raw_id, "script")?;
    state
        .store
        .get_script(&script_id)?
        .filter(|script| script.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("script not found: {script_id}")))
}

/// Generate a script from a video's transcript.
pub async fn generate_script(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<GenerateScriptRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<GeneratedScript>>, ApiError> {
    let request = json_body(body)?;
    let video_id: VideoId = request
        .video_id
        .parse()
        .map_err(|_| ApiError::validation("video_id", "video_id must be a UUID"))?;
    let duration_minutes = validate_duration(request.duration_minutes)?;
    let audience = validate_audience(&request.audience)?;

    let now = Utc::now();
    let check = usage::check(&state, &auth, now)?;
    check.require_quota()?;
    require_style(&check, request.style)?;

    let video = state
        .store
        .get_video(&video_id)?
        .filter(|video| video.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("video not found: {video_id}")))?;
    let transcript = state
        .store
        .get_transcript(&video.id)?
        .ok_or_else(|| ApiError::NotFound(format!("no transcript for video {video_id}")))?;

    let transcript_text = transcript.full_text();
    let prompt = build_generation_prompt(&GenerationBrief {
        title: &video.title,
        transcript: &transcript_text,
        style: request.style,
        duration_minutes,
        audience: &audience,
        options: request.options,
    });

    let script = Script::start(
        video.id,
        auth.user_id.clone(),
        None,
        ScriptRequest {
            style: request.style,
            duration_minutes,
            audience,
            options: request.options,
        },
        now,
    );

    run_generation(&state, &check, script, &prompt, UsageAction::ScriptGenerated).await
}

/// Rewrite a completed script in a new style, length or audience.
pub async fn remix_script(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<RemixScriptRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<GeneratedScript>>, ApiError> {
    let request = json_body(body)?;

    let now = Utc::now();
    let check = usage::check(&state, &auth, now)?;
    if !has_remix_access(check.tier) {
        return Err(ApiError::forbidden(Feature::Remix, check.tier));
    }
    check.require_quota()?;
    require_style(&check, request.style)?;

    let source = owned_script(&state, &auth, &id)?;
    if source.status != ScriptStatus::Completed {
        return Err(ApiError::BadRequest(
            "only completed scripts can be remixed".into(),
        ));
    }

    let duration_minutes =
        validate_duration(request.duration_minutes.unwrap_or(source.duration_minutes))?;
    let audience = validate_audience(request.audience.as_deref().unwrap_or(&source.audience))?;
    let options = request.options.unwrap_or(source.options);

    let prompt = build_remix_prompt(&source, request.style, duration_minutes, &audience, options);

    let script = Script::start(
        source.video_id,
        auth.user_id.clone(),
        Some(source.id),
        ScriptRequest {
            style: request.style,
            duration_minutes,
            audience,
            options,
        },
        now,
    );

    run_generation(&state, &check, script, &prompt, UsageAction::ScriptRemixed).await
}

/// Store the script, call the model, store the terminal state, count usage.
async fn run_generation(
    state: &AppState,
    check: &UsageCheck,
    mut script: Script,
    prompt: &Prompt,
    action: UsageAction,
) -> Result<Json<ApiResponse<GeneratedScript>>, ApiError> {
    let generator = state
        .generator
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Script generation not configured".into()))?;

    state.store.put_script(&script)?;

    let priority = has_priority_processing(check.tier);
    tracing::info!(
        user_id = %script.user_id,
        script_id = %script.id,
        tier = %check.tier,
        style = %script.style,
        priority,
        "Generating script"
    );

    let result = generator.generate(prompt, priority).await;
    let now = Utc::now();

    let completion = match result {
        Ok(completion) if !completion.content.trim().is_empty() => completion,
        Ok(_) => {
            finish(state, &mut script, ScriptStatus::Failed, "The model returned an empty script.")?;
            return Err(ApiError::external(SERVICE_NAME, "empty completion"));
        }
        Err(e) => {
            finish(state, &mut script, ScriptStatus::Error, &format!("Generation failed: {e}"))?;
            return Err(ApiError::external(SERVICE_NAME, e));
        }
    };

    let content = if requires_watermark(check.tier) {
        apply_watermark(&completion.content)
    } else {
        completion.content.trim().to_string()
    };
    finish(state, &mut script, ScriptStatus::Completed, &content)?;

    let metadata = serde_json::json!({
        "script_id": script.id,
        "video_id": script.video_id,
        "parent_id": script.parent_id,
        "style": script.style,
        "model": completion.model,
    });
    let usage = usage::record(state.store.as_ref(), &check.user, action, metadata, now)
        .map_or_else(
            || check.usage.clone(),
            |user| UsageSnapshot::compute(&user, check.tier, now),
        );

    tracing::info!(script_id = %script.id, status = ?script.status, "Script finished");

    Ok(ok(GeneratedScript { script, usage }))
}

/// Move the script to a terminal status and persist it.
fn finish(
    state: &AppState,
    script: &mut Script,
    status: ScriptStatus,
    content: &str,
) -> Result<(), ApiError> {
    script.finish(status, content, Utc::now())?;
    state.store.put_script(script).map_err(|e| {
        tracing::error!(script_id = %script.id, error = %e, "Failed to store finished script");
        ApiError::from(e)
    })
}

/// List the caller's scripts, newest first.
pub async fn list_scripts(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListScriptsQuery>,
) -> Result<Json<ApiResponse<Vec<Script>>>, ApiError> {
    let video_id = query
        .video_id
        .as_deref()
        .map(|raw| {
            raw.parse::<VideoId>()
                .map_err(|_| ApiError::validation("video_id", "video_id must be a UUID"))
        })
        .transpose()?;
    let (limit, offset) = Pagination {
        limit: query.limit,
        offset: query.offset,
    }
    .bounds();

    let scripts =
        state
            .store
            .list_scripts_by_user(&auth.user_id, video_id.as_ref(), limit, offset)?;
    Ok(ok(scripts))
}

/// Get one script.
pub async fn get_script(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Script>>, ApiError> {
    Ok(ok(owned_script(&state, &auth, &id)?))
}
