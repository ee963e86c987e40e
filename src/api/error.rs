//! Response envelopes and error handling for API endpoints.
//!
//! Every API response has the shape `{"success", "message", "data"}` on
//! success or `{"success", "message", "error"}` on failure.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// Validation messages keyed by request field.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error with automatic response conversion.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    error: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: Value::Null,
        }
    }

    /// Attach a detail payload to the `error` field.
    pub fn with_detail(mut self, detail: impl Serialize) -> Self {
        self.error = serde_json::to_value(detail).unwrap_or(Value::Null);
        self
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// 400 carrying per-field messages.
    pub fn invalid_form(errors: FieldErrors) -> Self {
        Self::bad_request("Invalid form submission").with_detail(errors)
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::internal("Database error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    message: String,
    error: Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorEnvelope {
                success: false,
                message: self.message,
                error: self.error,
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<T: Serialize> {
    success: bool,
    message: String,
    data: T,
}

/// Wrap a payload in the success envelope.
pub fn success_response<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (
        status,
        Json(SuccessEnvelope {
            success: true,
            message: message.to_string(),
            data,
        }),
    )
        .into_response()
}

/// Unwrap a JSON body, answering malformed input with the error envelope.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request("Invalid request body").with_detail(e.body_text()))
}

/// Parse a numeric path id.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::not_found("Not found"))
}
