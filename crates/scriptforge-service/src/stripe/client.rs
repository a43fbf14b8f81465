//! Stripe API client implementation.

use reqwest::Client;
use std::time::Duration;

use scriptforge_core::{Tier, UserId};

use super::types::{CheckoutSession, Customer, StripeErrorResponse};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid webhook signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The signed timestamp is outside the accepted tolerance.
    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,

    /// A verified event is missing data we need.
    #[error("Malformed event payload: {0}")]
    Payload(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Default Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `base_url` - API base, normally [`Self::BASE_URL`]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a customer for a ScriptForge user.
    pub async fn create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut params = vec![("metadata[user_id]", user_id.to_string())];
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            params.push(("email", email.to_string()));
        }

        tracing::debug!(user_id = %user_id, "Creating Stripe customer");

        let response = self
            .client
            .post(format!("{}/customers", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a subscription-mode Checkout session for `price_id`.
    ///
    /// The user id travels as `client_reference_id` so the completion webhook
    /// can link the customer back to the user.
    pub async fn create_subscription_checkout(
        &self,
        customer_id: &str,
        user_id: &UserId,
        price_id: &str,
        tier: Tier,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let params = [
            ("mode", "subscription".to_string()),
            ("customer", customer_id.to_string()),
            ("client_reference_id", user_id.to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[user_id]", user_id.to_string()),
            ("metadata[tier]", tier.to_string()),
            ("subscription_data[metadata][user_id]", user_id.to_string()),
        ];

        tracing::debug!(
            user_id = %user_id,
            tier = %tier,
            price_id = %price_id,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user() -> UserId {
        UserId::new("user_42").unwrap()
    }

    #[tokio::test]
    async fn create_customer_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .and(header_exists("authorization"))
            .and(body_string_contains("metadata%5Buser_id%5D=user_42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cus_123",
                "email": "a@example.com",
                "metadata": { "user_id": "user_42" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = StripeClient::new("sk_test_x", server.uri()).unwrap();
        let customer = client
            .create_customer(&user(), Some("a@example.com"))
            .await
            .unwrap();

        assert_eq!(customer.id, "cus_123");
    }

    #[tokio::test]
    async fn checkout_session_is_subscription_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkout/sessions"))
            .and(body_string_contains("mode=subscription"))
            .and(body_string_contains("client_reference_id=user_42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                "mode": "subscription"
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new("sk_test_x", server.uri()).unwrap();
        let session = client
            .create_subscription_checkout(
                "cus_123",
                &user(),
                "price_pro",
                Tier::Pro,
                "http://localhost/ok",
                "http://localhost/cancel",
            )
            .await
            .unwrap();

        assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.com/c/pay/cs_test_1"));
    }

    #[tokio::test]
    async fn api_errors_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": {
                    "type": "card_error",
                    "message": "Your card was declined.",
                    "code": "card_declined"
                }
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new("sk_test_x", server.uri()).unwrap();
        let err = client.create_customer(&user(), None).await.unwrap_err();

        match err {
            StripeError::Api { error_type, code, .. } => {
                assert_eq!(error_type, "card_error");
                assert_eq!(code.as_deref(), Some("card_declined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
