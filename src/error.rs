//! Typed error enums for the HTTP-facing layers, each with a hand-written
//! `IntoResponse` impl — matching `auth::api::AuthApiError` rather than
//! deriving from `thiserror`, which the teacher doesn't use at this seam.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::scope::ScopeError;

#[derive(Debug)]
pub enum IngestError {
    Unauthorized,
    ScopeMismatch(ScopeError),
    InvalidTimestamp { field: String, value: String },
    Storage(anyhow::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Unauthorized => write!(f, "missing or invalid edge credential"),
            IngestError::ScopeMismatch(e) => write!(f, "{e}"),
            IngestError::InvalidTimestamp { field, value } => write!(f, "invalid timestamp in field {field}: {value}"),
            IngestError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl From<ScopeError> for IngestError {
    fn from(e: ScopeError) -> Self {
        IngestError::ScopeMismatch(e)
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            IngestError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            IngestError::ScopeMismatch(_) => (StatusCode::FORBIDDEN, self.to_string()),
            IngestError::InvalidTimestamp { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            IngestError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal storage error".to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug)]
pub enum QueryApiError {
    InvalidParameter { field: String, reason: String },
    UnknownMetric(String),
    UnknownBucket(String),
    Storage(anyhow::Error),
}

impl std::fmt::Display for QueryApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryApiError::InvalidParameter { field, reason } => write!(f, "invalid parameter {field}: {reason}"),
            QueryApiError::UnknownMetric(m) => write!(f, "unknown metric: {m}"),
            QueryApiError::UnknownBucket(b) => write!(f, "unknown bucket: {b} (expected hour or day)"),
            QueryApiError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl IntoResponse for QueryApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            QueryApiError::InvalidParameter { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            QueryApiError::UnknownMetric(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            QueryApiError::UnknownBucket(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            QueryApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal storage error".to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<anyhow::Error> for QueryApiError {
    fn from(e: anyhow::Error) -> Self {
        QueryApiError::Storage(e)
    }
}
