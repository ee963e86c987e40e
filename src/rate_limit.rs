//! Per-IP rate limiting for login and registration.
//!
//! Uses a token bucket per client IP to slow down credential stuffing and signup spam.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::IpAddr, num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::api::error::ApiError;
use crate::auth::client_ip;
use crate::cli::IpExtractor;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const LOGIN_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();
const REGISTER_PER_MINUTE: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Quotas for the rate-limited endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Login attempts: bursts of 5, refilling 10 per minute
    pub login: Arc<IpLimiter>,
    /// Registrations: 3 per minute
    pub register: Arc<IpLimiter>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(
            Quota::per_minute(LOGIN_PER_MINUTE).allow_burst(LOGIN_BURST),
            Quota::per_minute(REGISTER_PER_MINUTE),
        )
    }
}

impl RateLimitConfig {
    pub fn new(login: Quota, register: Quota) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(login)),
            register: Arc::new(RateLimiter::keyed(register)),
        }
    }
}

/// State for the rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<IpLimiter>,
    pub ip_extractor: Option<IpExtractor>,
    pub message: &'static str,
}

/// Reject the request with 429 once the client's bucket is empty.
pub async fn rate_limit(State(state): State<RateLimitState>, request: Request, next: Next) -> Response {
    let ip = match client_ip(
        request.headers(),
        request.extensions(),
        state.ip_extractor.as_ref(),
    ) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Unable to determine client IP");
            return ApiError::forbidden("Unable to determine client IP.").into_response();
        }
    };

    match state.limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            ApiError::new(StatusCode::TOO_MANY_REQUESTS, state.message).into_response()
        }
    }
}
