//! Core types and entitlement logic for ScriptForge.
//!
//! This crate holds everything that can be decided without I/O:
//!
//! - **Identifiers**: `UserId`, `VideoId`, `ScriptId`, `UsageLogId`
//! - **Tiers**: `Tier`, `TierLimits`, `SubscriptionStatus`
//! - **Users**: `User`, `BillingLink`, the monthly usage window
//! - **Usage**: `UsageSnapshot`, `UsageLog`, `UsageAction`
//! - **Entitlements**: `AccessPolicy` tier resolution and feature predicates
//! - **Billing**: `BillingEvent` and how it moves a user's tier and status
//! - **Content**: `Video`, `Transcript`, `Script`, prompt construction
//!
//! # Usage Window
//!
//! Quotas count scripts per calendar month (UTC). The counter is reset on the
//! first access after a month boundary; `-1` in the tier table means unlimited.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod billing;
pub mod content;
pub mod entitlement;
pub mod error;
pub mod ids;
pub mod prompt;
pub mod tier;
pub mod usage;
pub mod user;
pub mod video_id;

pub use billing::{
    apply_event, BillingEvent, BillingOutcome, PriceTierMap, SubscriptionUpdate,
    SUBSCRIPTION_CYCLE,
};
pub use content::{
    Script, ScriptOptions, ScriptRequest, ScriptStatus, ScriptStyle, Transcript,
    TranscriptSegment, Video, VideoMetadata, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};
pub use entitlement::{
    has_advanced_style_access, has_api_access, has_priority_processing, has_remix_access,
    minimum_tier_for, requires_watermark, AccessPolicy, Entitlements, Feature,
    ResolutionSignals,
};
pub use error::{Error, Result};
pub use ids::{IdError, ScriptId, UsageLogId, UserId, VideoId};
pub use prompt::{GenerationBrief, Prompt};
pub use tier::{SubscriptionStatus, SupportLevel, Tier, TierLimits, UNLIMITED};
pub use usage::{next_window_start, UsageAction, UsageLog, UsageSnapshot};
pub use user::{BillingLink, User};
pub use video_id::extract_video_id;
