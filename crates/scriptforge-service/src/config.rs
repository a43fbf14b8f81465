//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use scriptforge_core::{PriceTierMap, Tier};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    /// Local development: internal error messages are returned to clients.
    Development,
    /// Production: internal error messages are suppressed.
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Self::Development,
            _ => Self::Production,
        }
    }
}

/// LLM provider settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key (generation is unavailable without one).
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model for standard generation.
    pub model: String,
    /// Model for tiers with priority processing, if different.
    pub priority_model: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            priority_model: None,
            timeout_seconds: 60,
        }
    }
}

/// Stripe price ids for each paid tier.
#[derive(Debug, Clone, Default)]
pub struct StripePrices {
    /// Price for the PRO tier.
    pub pro: Option<String>,
    /// Price for the BUSINESS tier.
    pub business: Option<String>,
    /// Price for the ENTERPRISE tier.
    pub enterprise: Option<String>,
}

impl StripePrices {
    /// Build the price-to-tier lookup used by billing sync and checkout.
    #[must_use]
    pub fn tier_map(&self) -> PriceTierMap {
        let mut map = PriceTierMap::new();
        for (price, tier) in [
            (&self.pro, Tier::Pro),
            (&self.business, Tier::Business),
            (&self.enterprise, Tier::Enterprise),
        ] {
            if let Some(price) = price {
                map = map.with_price(price.clone(), tier);
            }
        }
        map
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Deployment environment (default: production).
    pub environment: AppEnv,

    /// Path to `RocksDB` data directory (default: "/data/scriptforge").
    pub data_dir: String,

    /// HS256 secret used to verify auth provider tokens.
    pub auth_jwt_secret: Option<String>,

    /// Expected JWT issuer, if enforced.
    pub auth_issuer: Option<String>,

    /// Expected JWT audience (default: "scriptforge").
    pub auth_audience: String,

    /// Emails that always resolve to the ENTERPRISE tier.
    pub admin_emails: Vec<String>,

    /// Shared key enabling the test-mode tier override. Disabled when unset.
    pub test_mode_key: Option<String>,

    /// LLM provider settings.
    pub llm: LlmConfig,

    /// Base URL for YouTube oEmbed and timed-text requests.
    pub youtube_base_url: String,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Stripe API base URL.
    pub stripe_api_base: String,

    /// Stripe price ids per tier.
    pub stripe_prices: StripePrices,

    /// Frontend URL for checkout redirects.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Requests allowed per client per rate-limit window.
    pub rate_limit_max_requests: u32,

    /// Rate-limit window length in seconds.
    pub rate_limit_window_seconds: u64,

    /// Key rate limits on `X-Forwarded-For`/`X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// LLM secrets file structure.
#[derive(Debug, Deserialize)]
struct LlmSecrets {
    api_key: String,
    #[serde(default)]
    base_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Secrets files win over env vars
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();
        let (llm_api_key, llm_base_url) = load_llm_secrets();

        Self {
            listen_addr: env_or("LISTEN_ADDR", defaults.listen_addr),
            environment: std::env::var("APP_ENV")
                .map_or(defaults.environment, |v| AppEnv::parse(&v)),
            data_dir: env_or("DATA_DIR", defaults.data_dir),
            auth_jwt_secret: env_opt("AUTH_JWT_SECRET"),
            auth_issuer: env_opt("AUTH_ISSUER"),
            auth_audience: env_or("AUTH_AUDIENCE", defaults.auth_audience),
            admin_emails: env_list("ADMIN_EMAILS").unwrap_or_default(),
            test_mode_key: env_opt("TEST_MODE_KEY"),
            llm: LlmConfig {
                api_key: llm_api_key,
                base_url: llm_base_url.unwrap_or(defaults.llm.base_url),
                model: env_or("LLM_MODEL", defaults.llm.model),
                priority_model: env_opt("LLM_PRIORITY_MODEL"),
                timeout_seconds: env_parse("LLM_TIMEOUT_SECONDS", defaults.llm.timeout_seconds),
            },
            youtube_base_url: env_or("YOUTUBE_BASE_URL", defaults.youtube_base_url),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_api_base: env_or("STRIPE_API_BASE", defaults.stripe_api_base),
            stripe_prices: StripePrices {
                pro: env_opt("STRIPE_PRICE_PRO"),
                business: env_opt("STRIPE_PRICE_BUSINESS"),
                enterprise: env_opt("STRIPE_PRICE_ENTERPRISE"),
            },
            frontend_url: env_or("FRONTEND_URL", defaults.frontend_url),
            cors_origins: env_list("CORS_ORIGINS").unwrap_or(defaults.cors_origins),
            max_body_bytes: env_parse("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_parse(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            rate_limit_max_requests: env_parse(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_window_seconds: env_parse(
                "RATE_LIMIT_WINDOW_SECONDS",
                defaults.rate_limit_window_seconds,
            ),
            trust_proxy_headers: env_parse("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers),
        }
    }

    /// Whether the service runs in development mode.
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment == AppEnv::Development
    }
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "scriptforge/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (env_opt("STRIPE_API_KEY"), env_opt("STRIPE_WEBHOOK_SECRET"))
}

/// Load LLM secrets from file or environment.
fn load_llm_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/llm.json",
        "scriptforge/.secrets/llm.json",
        "../.secrets/llm.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<LlmSecrets>(path) {
            tracing::info!(path = %path, "Loaded LLM secrets from file");
            return (
                Some(secrets.api_key),
                secrets.base_url.or_else(|| env_opt("LLM_BASE_URL")),
            );
        }
    }

    tracing::debug!("LLM secrets file not found, using environment variables");
    (env_opt("LLM_API_KEY"), env_opt("LLM_BASE_URL"))
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// A non-blank env var.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: String) -> String {
    env_opt(name).unwrap_or(default)
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match env_opt(name).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            tracing::warn!(var = %name, "Ignoring unparsable value, using default");
            default
        }
        None => default,
    }
}

/// A comma-separated env var, blanks dropped.
fn env_list(name: &str) -> Option<Vec<String>> {
    env_opt(name).map(|v| split_list(&v))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            environment: AppEnv::Production,
            data_dir: "/data/scriptforge".into(),
            auth_jwt_secret: None,
            auth_issuer: None,
            auth_audience: "scriptforge".into(),
            admin_emails: Vec::new(),
            test_mode_key: None,
            llm: LlmConfig::default(),
            youtube_base_url: "https://www.youtube.com".into(),
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "https://api.stripe.com/v1".into(),
            stripe_prices: StripePrices::default(),
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 90,
            rate_limit_max_requests: 60,
            rate_limit_window_seconds: 60,
            trust_proxy_headers: false,
        }
    }
}
