//! Stripe integration for subscriptions.
//!
//! Stripe handles:
//! - Customer registration
//! - Subscription checkout
//! - Webhook delivery of subscription and invoice events

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{StripeClient, StripeError};
pub use types::*;
pub use webhook::{decode_event, signature_header, verify_signature, SIGNATURE_TOLERANCE_SECS};
