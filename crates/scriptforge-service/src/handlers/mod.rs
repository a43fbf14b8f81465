//! API handlers.

use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub mod billing;
pub mod health;
pub mod me;
pub mod scripts;
pub mod transcripts;
pub mod videos;
pub mod webhooks;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures use the error body instead.
    pub success: bool,
    /// Response payload.
    pub data: T,
}

/// Wrap `data` in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

/// `?limit=&offset=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    /// Page size (default 20, at most 100).
    pub limit: Option<usize>,
    /// Items to skip.
    pub offset: Option<usize>,
}

impl Pagination {
    /// Clamped `(limit, offset)`.
    #[must_use]
    pub fn bounds(&self) -> (usize, usize) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (limit, self.offset.unwrap_or(0))
    }
}

/// Unwrap a JSON body, turning rejections into validation errors.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation("body", rejection.body_text()))
}

/// Parse a path id; anything unparsable cannot exist.
pub fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("{entity} not found: {raw}")))
}
