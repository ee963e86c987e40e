//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use super::cookie::CookieSettings;
use crate::jwt::TokenError;

/// Why a credential could not be turned into a principal. Never leaves the
/// auth gate; it only drives the session state and the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MalformedToken,
    ExpiredToken,
    UnknownPrincipal,
    RefreshRejected,
}

impl AuthFailure {
    pub fn from_token_error(e: &TokenError) -> Self {
        match e {
            TokenError::Expired => AuthFailure::ExpiredToken,
            _ => AuthFailure::MalformedToken,
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::MalformedToken => write!(f, "malformed token"),
            AuthFailure::ExpiredToken => write!(f, "expired token"),
            AuthFailure::UnknownPrincipal => write!(f, "unknown principal"),
            AuthFailure::RefreshRejected => write!(f, "refresh rejected"),
        }
    }
}

impl std::error::Error for AuthFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiAuthErrorKind {
    NotAuthenticated,
    InsufficientRole,
}

/// API guard rejection. Answers with the JSON error envelope; a 401 also
/// clears any stale session cookies.
#[derive(Debug)]
pub struct ApiAuthError {
    kind: ApiAuthErrorKind,
    cookies: CookieSettings,
}

impl ApiAuthError {
    pub(super) fn new(kind: ApiAuthErrorKind, cookies: CookieSettings) -> Self {
        Self { kind, cookies }
    }

    pub fn kind(&self) -> ApiAuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            ApiAuthErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiAuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ApiAuthErrorKind::NotAuthenticated => {
                "Authentication credentials were not provided."
            }
            ApiAuthErrorKind::InsufficientRole => {
                "You do not have permission to perform this action."
            }
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            success: bool,
            message: &'static str,
            error: &'static str,
        }

        let mut response = (
            self.status_code(),
            Json(ErrorResponse {
                success: false,
                message: self.message(),
                error: self.message(),
            }),
        )
            .into_response();

        if self.kind == ApiAuthErrorKind::NotAuthenticated {
            self.cookies.clear(response.headers_mut());
        }

        response
    }
}

/// Page guard rejection: always a redirect to the login page, whatever the
/// reason, so protected pages are not revealed.
#[derive(Debug)]
pub struct LoginRedirect {
    pub login_path: String,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::temporary(&self.login_path).into_response()
    }
}
