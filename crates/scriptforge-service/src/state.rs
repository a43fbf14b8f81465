//! Application state.

use std::sync::Arc;
use std::time::Duration;

use scriptforge_core::{AccessPolicy, PriceTierMap};
use scriptforge_store::Store;

use crate::config::ServiceConfig;
use crate::llm::{OpenAiClient, ScriptGenerator};
use crate::rate_limit::{FixedWindowLimiter, RateLimiter};
use crate::stripe::StripeClient;
use crate::transcript::{TranscriptFetcher, YoutubeTranscriptClient};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Admin allow-list for tier resolution.
    pub policy: AccessPolicy,

    /// Stripe price ids mapped to tiers.
    pub prices: PriceTierMap,

    /// Per-client request limiter for `/api`.
    pub rate_limiter: Arc<dyn RateLimiter>,

    /// Script generator (optional).
    pub generator: Option<Arc<dyn ScriptGenerator>>,

    /// Transcript source (optional).
    pub transcripts: Option<Arc<dyn TranscriptFetcher>>,

    /// Stripe client for checkout (optional).
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppState {
    /// Create application state, building clients from the configuration.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let policy = AccessPolicy::new(config.admin_emails.iter());
        let prices = config.stripe_prices.tier_map();

        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowLimiter::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_seconds),
        ));

        // Create LLM client if configured
        let generator = config.llm.api_key.as_ref().and_then(|key| {
            match OpenAiClient::new(&config.llm, key.clone()) {
                Ok(client) => {
                    tracing::info!(
                        base_url = %config.llm.base_url,
                        model = %config.llm.model,
                        "LLM integration enabled"
                    );
                    Some(Arc::new(client) as Arc<dyn ScriptGenerator>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create LLM client");
                    None
                }
            }
        });

        if generator.is_none() {
            tracing::warn!("LLM not configured - script generation will not be available");
        }

        let transcripts = match YoutubeTranscriptClient::new(config.youtube_base_url.clone()) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn TranscriptFetcher>),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create transcript client");
                None
            }
        };

        // Create Stripe client if configured
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key.clone(), config.stripe_api_base.clone()) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - checkout will not be available");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be rejected");
        }
        if config.test_mode_key.is_some() {
            tracing::warn!("Test-mode tier override is enabled");
        }

        Self {
            store,
            config,
            policy,
            prices,
            rate_limiter,
            generator,
            transcripts,
            stripe,
        }
    }

    /// Replace the script generator.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn ScriptGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Replace the transcript source.
    #[must_use]
    pub fn with_transcripts(mut self, transcripts: Arc<dyn TranscriptFetcher>) -> Self {
        self.transcripts = Some(transcripts);
        self
    }

    /// Replace the rate limiter.
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }
}
