//! Authentication extractor.
//!
//! Users sign in with a third-party provider; we only verify the HS256 token it
//! issues. The verified claims become an [`AuthUser`] that handlers receive as
//! an explicit argument.
//!
//! The extractor also reads the optional test-mode query parameters
//! (`test_mode=true&admin_key=...`). They only take effect when a test-mode key
//! is configured and the supplied key matches it.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use scriptforge_core::{ResolutionSignals, UserId};

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID (token subject).
    pub user_id: UserId,
    /// Email claim, empty if the provider omitted it.
    pub email: String,
    /// Tier-resolution signals carried by this request.
    pub signals: ResolutionSignals,
}

/// JWT claims issued by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Primary email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Audience.
    #[serde(default)]
    pub aud: Option<String>,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Expiration time (Unix seconds).
    pub exp: i64,
}

/// Test-mode query parameters.
#[derive(Debug, Default, Deserialize)]
struct TestModeParams {
    #[serde(default)]
    test_mode: Option<String>,
    #[serde(default)]
    admin_key: Option<String>,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(ApiError::Unauthorized)?;

        let claims = validate_token(token, state)?;

        let user_id = UserId::new(claims.sub).map_err(|_| ApiError::Unauthorized)?;
        let email = claims.email.unwrap_or_default();
        let signals = resolution_signals(parts, state);

        if signals.verified_test_mode {
            tracing::info!(user_id = %user_id, "Test-mode tier override applied");
        }

        Ok(AuthUser {
            user_id,
            email,
            signals,
        })
    }
}

/// Verify signature, expiry, audience and (when configured) issuer.
fn validate_token(token: &str, state: &AppState) -> Result<Claims, ApiError> {
    let Some(secret) = state.config.auth_jwt_secret.as_deref() else {
        tracing::warn!("AUTH_JWT_SECRET not configured - rejecting authenticated request");
        return Err(ApiError::Unauthorized);
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[&state.config.auth_audience]);
    if let Some(issuer) = &state.config.auth_issuer {
        validation.set_issuer(&[issuer]);
    }

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(data.claims)
}

/// Test mode counts only with a configured key and a matching `admin_key`.
fn resolution_signals(parts: &Parts, state: &AppState) -> ResolutionSignals {
    let Some(expected) = state.config.test_mode_key.as_deref() else {
        return ResolutionSignals::default();
    };

    let params = Query::<TestModeParams>::try_from_uri(&parts.uri)
        .map(|Query(params)| params)
        .unwrap_or_default();

    let requested = params.test_mode.as_deref() == Some("true");
    let verified = requested
        && params
            .admin_key
            .as_deref()
            .is_some_and(|key| constant_time_eq(key.as_bytes(), expected.as_bytes()));

    if requested && !verified {
        tracing::warn!("Test-mode requested with a wrong or missing admin key");
    }

    ResolutionSignals {
        verified_test_mode: verified,
    }
}
