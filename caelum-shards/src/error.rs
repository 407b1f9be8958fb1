//! HTTP error type
//!
//! Every failure is rendered as the standard envelope
//! `{ok: false, data: null, error, detail?}` with a matching status code.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use caelum_common::ApiResponse;
use serde_json::{json, Value};
use thiserror::Error;

use crate::mint::{IntentError, MintError, RelayFailure};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or wrong shared secret (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// State conflict (409), e.g. re-queueing a minted shard
    #[error("{0}")]
    Conflict(String),

    /// Server-side configuration missing (500)
    #[error("{0}")]
    Configuration(String),

    /// Relay rejected or failed the request (502)
    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn detail(&self) -> Option<Value> {
        match self {
            ApiError::Upstream { status, body, .. } => Some(json!({
                "status": status,
                "body": body,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let mut body = ApiResponse::<Value>::failure(self.to_string());
        if let Some(detail) = self.detail() {
            body = body.with_detail(detail);
        }
        (status, Json(body)).into_response()
    }
}

impl From<caelum_common::Error> for ApiError {
    fn from(err: caelum_common::Error) -> Self {
        use caelum_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::AlreadyExists(msg) | Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Config(msg) => ApiError::Configuration(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RelayFailure> for ApiError {
    fn from(failure: RelayFailure) -> Self {
        ApiError::Upstream {
            message: failure.to_string(),
            status: failure.status(),
            body: failure.body().map(str::to_string),
        }
    }
}

impl From<IntentError> for ApiError {
    fn from(err: IntentError) -> Self {
        match err {
            IntentError::Signing(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<MintError> for ApiError {
    fn from(err: MintError) -> Self {
        match err {
            MintError::NotConfigured(msg) => ApiError::Configuration(msg),
            MintError::MissingUser { .. } => ApiError::BadRequest(err.to_string()),
            MintError::Held { .. } => ApiError::Conflict(err.to_string()),
            MintError::Intent(e) => e.into(),
            MintError::Relay { failure, .. } => failure.into(),
            MintError::Store(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
