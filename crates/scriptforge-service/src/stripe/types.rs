//! Stripe API types.

use serde::Deserialize;

/// A reference that Stripe returns either as a bare id or an expanded object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    /// Unexpanded id.
    Id(String),
    /// Expanded object; only its id is read.
    Object {
        /// Object id.
        id: String,
    },
}

impl Expandable {
    /// The referenced object's id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Object { id } => id,
        }
    }
}

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Session mode ("subscription", "payment", ...).
    #[serde(default)]
    pub mode: Option<String>,
    /// Customer.
    #[serde(default)]
    pub customer: Option<Expandable>,
    /// Subscription created by the session.
    #[serde(default)]
    pub subscription: Option<Expandable>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Session status.
    #[serde(default)]
    pub status: Option<String>,
}

/// Stripe price object (only the id is used).
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
}

/// One line of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// The subscribed price.
    pub price: Price,
    /// Period start on newer API versions (Unix).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Period end on newer API versions (Unix).
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Owning customer.
    pub customer: Expandable,
    /// Status string, e.g. "active" or "past_due".
    pub status: String,
    /// Whether the subscription ends with the current period.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Period start (Unix).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Period end (Unix).
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Subscription items.
    pub items: StripeList<SubscriptionItem>,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Billed customer.
    pub customer: Expandable,
    /// Why the invoice was created, e.g. "subscription_cycle".
    #[serde(default)]
    pub billing_reason: Option<String>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: Option<i64>,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "customer.subscription.updated").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Parameter that caused the error.
    #[serde(default)]
    pub param: Option<String>,
}
