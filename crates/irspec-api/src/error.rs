//! API error types and conversions

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use irspec_core::DeviceError;
use serde_json::Value;

use crate::response::{ApiResponse, Outcome};

/// API error type that converts to an error envelope
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 404 Not Found
    NotFound(String),
    /// 409 Conflict
    Conflict(String),
    /// 500 Internal Server Error
    Internal(String),
    /// Any of the above with a `data` object attached
    WithData { error: Box<ApiError>, data: Value },
}

impl ApiError {
    /// Attach a `data` object to the error envelope
    pub fn with_data(self, data: Value) -> Self {
        ApiError::WithData {
            error: Box::new(self),
            data,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::WithData { error, .. } => error.status_code(),
        }
    }

    fn into_parts(self) -> (String, Option<Value>) {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => (msg, None),
            ApiError::WithData { error, data } => (error.into_parts().0, Some(data)),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => f.write_str(msg),
            ApiError::WithData { error, .. } => error.fmt(f),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, data) = self.into_parts();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), %message, "API error");
        } else {
            tracing::debug!(status = status.as_u16(), %message, "API client error");
        }

        let body = Json(ApiResponse {
            status: Outcome::Error,
            message: Some(message),
            data,
        });
        (status, body).into_response()
    }
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            DeviceError::Busy(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
