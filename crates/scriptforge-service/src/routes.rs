//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{billing, health, me, scripts, transcripts, videos, webhooks};
use crate::rate_limit;
use crate::state::AppState;

/// Requests served concurrently under `/api`.
const MAX_CONCURRENT_API_REQUESTS: usize = 256;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## User (JWT auth, rate limited)
/// - `GET /api/me` - Profile, effective tier, usage and entitlements
/// - `GET /api/me/usage` - Usage snapshot
/// - `GET /api/me/subscription` - Subscription and tier limits
/// - `GET /api/me/activity` - Usage log
///
/// ## Content (JWT auth, rate limited)
/// - `POST /api/transcripts` - Fetch a video transcript
/// - `GET /api/videos` - List videos
/// - `GET /api/videos/:id` - Get a video with its transcript
/// - `DELETE /api/videos/:id` - Delete a video
/// - `POST /api/scripts` - Generate a script
/// - `GET /api/scripts` - List scripts
/// - `GET /api/scripts/:id` - Get a script
/// - `POST /api/scripts/:id/remix` - Remix a script
///
/// ## Billing (JWT auth, rate limited)
/// - `POST /api/billing/checkout` - Open a subscription checkout
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api = Router::new()
        // Current user
        .route("/me", get(me::get_me))
        .route("/me/usage", get(me::get_usage))
        .route("/me/subscription", get(me::get_subscription))
        .route("/me/activity", get(me::get_activity))
        // Content
        .route("/transcripts", post(transcripts::fetch_transcript))
        .route("/videos", get(videos::list_videos))
        .route(
            "/videos/:id",
            get(videos::get_video).delete(videos::delete_video),
        )
        .route(
            "/scripts",
            post(scripts::generate_script).get(scripts::list_scripts),
        )
        .route("/scripts/:id", get(scripts::get_script))
        .route("/scripts/:id/remix", post(scripts::remix_script))
        // Billing
        .route("/billing/checkout", post(billing::create_checkout))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_API_REQUESTS))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ));

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        .nest("/api", api)
        // Webhooks
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
