//! ScriptForge HTTP API Service.
//!
//! This crate provides the HTTP API for ScriptForge, including:
//!
//! - Profile, usage and subscription views
//! - Transcript extraction from YouTube
//! - Script generation and remixing through an LLM provider
//! - Subscription checkout and Stripe webhook sync
//!
//! # Authentication
//!
//! End-user requests carry an HS256 JWT in `Authorization: Bearer`. When a
//! test-mode key is configured, `?test_mode=true&admin_key=...` lifts the
//! caller to the test tier for that request.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Axum handlers must be async

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod transcript;
pub mod usage;

pub use config::{LlmConfig, ServiceConfig, StripePrices};
pub use error::{expose_internal_errors, ApiError};
pub use llm::{Completion, LlmError, OpenAiClient, ScriptGenerator};
pub use rate_limit::{FixedWindowLimiter, RateDecision, RateLimiter};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
pub use transcript::{FetchedTranscript, TranscriptError, TranscriptFetcher, YoutubeTranscriptClient};
