//! Common test utilities for scriptforge integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use scriptforge_core::{Prompt, TranscriptSegment, UserId, VideoMetadata};
use scriptforge_service::stripe::signature_header;
use scriptforge_service::{
    create_router, AppState, Completion, FetchedTranscript, LlmError, ScriptGenerator,
    ServiceConfig, StripePrices, TranscriptError, TranscriptFetcher,
};
use scriptforge_store::MemoryStore;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const AUDIENCE: &str = "scriptforge";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const TEST_MODE_KEY: &str = "test-mode-key";
pub const ADMIN_EMAIL: &str = "admin@scriptforge.test";
pub const PRO_PRICE: &str = "price_pro";
pub const BUSINESS_PRICE: &str = "price_business";

/// Video id the stub fetcher has a transcript for.
pub const VIDEO: &str = "dQw4w9WgXcQ";
/// Video id the stub fetcher reports as missing.
pub const MISSING_VIDEO: &str = "missing0000";
/// Video id the stub fetcher has no captions for.
pub const SILENT_VIDEO: &str = "silent00000";

/// What the stub generator answers with.
#[derive(Debug, Clone)]
pub enum GeneratorMode {
    /// Return this text.
    Content(String),
    /// Return an empty completion.
    Empty,
    /// Fail like a provider error.
    Error,
}

/// Script generator that answers from a configurable mode.
pub struct StubGenerator {
    mode: Mutex<GeneratorMode>,
    calls: AtomicUsize,
    last_priority: AtomicBool,
    last_prompt: Mutex<Option<Prompt>>,
}

impl StubGenerator {
    fn new() -> Self {
        Self {
            mode: Mutex::new(GeneratorMode::Content("HOOK: Here is your script.".into())),
            calls: AtomicUsize::new(0),
            last_priority: AtomicBool::new(false),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn set_mode(&self, mode: GeneratorMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_priority(&self) -> bool {
        self.last_priority.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptGenerator for StubGenerator {
    async fn generate(&self, prompt: &Prompt, priority: bool) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_priority.store(priority, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());

        let mode = self.mode.lock().unwrap().clone();
        match mode {
            GeneratorMode::Content(content) => Ok(Completion {
                content,
                model: "stub-model".into(),
            }),
            GeneratorMode::Empty => Ok(Completion {
                content: "   ".into(),
                model: "stub-model".into(),
            }),
            GeneratorMode::Error => Err(LlmError::Api {
                status: 500,
                message: "provider exploded".into(),
            }),
        }
    }
}

/// Transcript source with canned answers per video id.
pub struct StubFetcher;

#[async_trait]
impl TranscriptFetcher for StubFetcher {
    async fn fetch(&self, video_id: &str) -> Result<FetchedTranscript, TranscriptError> {
        match video_id {
            MISSING_VIDEO => Err(TranscriptError::VideoNotFound(video_id.to_string())),
            SILENT_VIDEO => Err(TranscriptError::NoCaptions(video_id.to_string())),
            _ => Ok(FetchedTranscript {
                metadata: VideoMetadata {
                    title: format!("Video {video_id}"),
                    duration_seconds: Some(212),
                    thumbnail_url: None,
                },
                language: Some("en".into()),
                segments: vec![
                    TranscriptSegment {
                        start_ms: 0,
                        duration_ms: 2000,
                        text: "We're no strangers to love".into(),
                    },
                    TranscriptSegment {
                        start_ms: 2000,
                        duration_ms: 2000,
                        text: "You know the rules and so do I".into(),
                    },
                ],
            }),
        }
    }
}

/// Base configuration shared by all harnesses.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        data_dir: "unused".into(),
        auth_jwt_secret: Some(JWT_SECRET.into()),
        auth_audience: AUDIENCE.into(),
        admin_emails: vec![ADMIN_EMAIL.into()],
        test_mode_key: Some(TEST_MODE_KEY.into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        stripe_prices: StripePrices {
            pro: Some(PRO_PRICE.into()),
            business: Some(BUSINESS_PRICE.into()),
            enterprise: None,
        },
        request_timeout_seconds: 30,
        rate_limit_max_requests: 10_000,
        ..ServiceConfig::default()
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The backing store, for direct inspection.
    pub store: Arc<MemoryStore>,
    /// The stub script generator.
    pub generator: Arc<StubGenerator>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The test user's email.
    pub test_email: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after adjusting the base configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let mut config = test_config();
        adjust(&mut config);

        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(StubGenerator::new());

        let state = AppState::new(store.clone(), config)
            .with_generator(generator.clone())
            .with_transcripts(Arc::new(StubFetcher));
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            generator,
            test_user_id: UserId::new("user_test_1").unwrap(),
            test_email: "creator@example.com".into(),
        }
    }

    /// Mint a token for any subject.
    pub fn token_for(user_id: &str, email: &str) -> String {
        let claims = json!({
            "sub": user_id,
            "email": email,
            "aud": AUDIENCE,
            "exp": Utc::now().timestamp() + 3600,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap()
    }

    /// Authorization header value for the test user.
    pub fn user_auth_header(&self) -> HeaderValue {
        Self::bearer(&Self::token_for(self.test_user_id.as_str(), &self.test_email))
    }

    /// Authorization header value for an admin user.
    pub fn admin_auth_header() -> HeaderValue {
        Self::bearer(&Self::token_for("user_admin", ADMIN_EMAIL))
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> HeaderValue {
        Self::bearer(&Self::token_for("user_other", "other@example.com"))
    }

    pub fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    /// GET as the test user.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.server
            .get(path)
            .add_header(AUTHORIZATION, self.user_auth_header())
            .await
    }

    /// POST JSON as the test user.
    pub async fn post(&self, path: &str, body: &Value) -> TestResponse {
        self.server
            .post(path)
            .add_header(AUTHORIZATION, self.user_auth_header())
            .json(body)
            .await
    }

    /// Fetch a transcript for `external_id` and return the stored video id.
    pub async fn fetch_video(&self, external_id: &str) -> String {
        let response = self
            .post("/api/transcripts", &json!({ "url": external_id }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["data"]["video"]["id"].as_str().unwrap().to_string()
    }

    /// Generate a script for `video_id` as the test user.
    pub async fn generate(&self, video_id: &str, style: &str) -> TestResponse {
        self.post(
            "/api/scripts",
            &json!({
                "video_id": video_id,
                "style": style,
                "duration_minutes": 5,
                "audience": "indie game developers",
            }),
        )
        .await
    }

    /// Deliver a signed Stripe webhook.
    pub async fn send_webhook(&self, event: &Value) -> TestResponse {
        let payload = event.to_string();
        let signature = signature_header(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
        self.server
            .post("/webhooks/stripe")
            .add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(&signature).unwrap(),
            )
            .text(payload)
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A Stripe event envelope.
pub fn stripe_event(id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": object },
    })
}

/// A `customer.subscription.*` object.
pub fn subscription_object(customer: &str, price: &str, status: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "id": "sub_test",
        "object": "subscription",
        "customer": customer,
        "status": status,
        "cancel_at_period_end": false,
        "current_period_start": now,
        "current_period_end": now + 30 * 86_400,
        "items": { "object": "list", "data": [ { "price": { "id": price } } ] },
    })
}
