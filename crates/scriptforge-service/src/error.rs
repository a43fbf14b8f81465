//! API error types and responses.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use scriptforge_core::{Feature, Tier, UsageSnapshot};
use scriptforge_store::StoreError;

/// Whether internal error messages may be shown to clients.
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Show internal error messages in responses (development only).
pub fn expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request body or parameters failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// Summary of the problem.
        message: String,
        /// Offending field.
        field: &'static str,
    },

    /// Bad request - malformed input that is not a field error.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The effective tier does not grant a feature.
    #[error("{feature} requires the {required_tier} plan")]
    Forbidden {
        /// The gated feature.
        feature: Feature,
        /// Lowest tier granting it.
        required_tier: Tier,
        /// The caller's effective tier.
        current_tier: Tier,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Monthly script quota exhausted.
    #[error("monthly script limit reached")]
    QuotaExceeded(UsageSnapshot),

    /// Too many requests from one client.
    #[error("rate limit exceeded")]
    RateLimited {
        /// Seconds until the window resets.
        retry_after_secs: u64,
    },

    /// An upstream dependency failed.
    #[error("{service} error: {message}")]
    ExternalService {
        /// Name of the upstream service.
        service: &'static str,
        /// What went wrong.
        message: String,
    },

    /// A required dependency is missing or down.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Validation error on a single field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field,
        }
    }

    /// Entitlement denial for `feature` at `current_tier`.
    #[must_use]
    pub fn forbidden(feature: Feature, current_tier: Tier) -> Self {
        Self::Forbidden {
            feature,
            required_tier: feature.minimum_tier(),
            current_tier,
        }
    }

    /// Upstream failure attributed to `service`.
    pub fn external(service: &'static str, message: impl ToString) -> Self {
        Self::ExternalService {
            service,
            message: message.to_string(),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error, code, message, details) = match self {
            Self::Validation { field, .. } => (
                StatusCode::BAD_REQUEST,
                "Validation Error",
                "validation_error",
                message,
                Some(serde_json::json!({ "field": field })),
            ),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "Bad Request",
                "bad_request",
                msg,
                None,
            ),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "unauthorized",
                "Authentication required".to_string(),
                None,
            ),
            Self::Forbidden {
                feature,
                required_tier,
                current_tier,
            } => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                "upgrade_required",
                message,
                Some(serde_json::json!({
                    "feature": feature,
                    "required_tier": required_tier,
                    "current_tier": current_tier,
                })),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", "not_found", msg, None),
            Self::QuotaExceeded(usage) => (
                StatusCode::TOO_MANY_REQUESTS,
                "Quota Exceeded",
                "quota_exceeded",
                message,
                Some(serde_json::json!({ "usage": usage })),
            ),
            Self::RateLimited { retry_after_secs } => {
                let body = ErrorResponse {
                    error: "Too Many Requests",
                    message,
                    code: "rate_limited",
                    details: Some(serde_json::json!({ "retry_after": retry_after_secs })),
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                return response;
            }
            Self::ExternalService { service, .. } => {
                tracing::warn!(service = %service, error = %message, "Upstream service failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Bad Gateway",
                    "external_service_error",
                    message,
                    Some(serde_json::json!({ "service": service })),
                )
            }
            Self::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                "service_unavailable",
                msg,
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                let message = if EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
                    msg
                } else {
                    "An internal error occurred".to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "internal_error",
                    message,
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error,
            message,
            code,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::Conflict(msg) => Self::BadRequest(msg),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<scriptforge_core::Error> for ApiError {
    fn from(err: scriptforge_core::Error) -> Self {
        match err {
            scriptforge_core::Error::InvalidVideoUrl { .. } => Self::validation("url", err.to_string()),
            scriptforge_core::Error::InvalidId(_) | scriptforge_core::Error::InvalidValue { .. } => {
                Self::BadRequest(err.to_string())
            }
            scriptforge_core::Error::ScriptAlreadyFinished { .. } => Self::Internal(err.to_string()),
        }
    }
}
