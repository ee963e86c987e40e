//! Per-request session handling.
//!
//! Every non-exempt request passes through [`auth_gate`], which decides the
//! [`SessionState`], attaches an [`AuthContext`] to the request, and after the
//! handler has run writes any freshly minted token pair onto the response.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use super::cookie::{ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME, get_cookie, sets_cookie};
use super::errors::AuthFailure;
use super::principal::resolve_principal;
use super::state::{HasAuthBackend, HasPageAuthBackend};
use super::types::{AuthContext, Principal, SessionState};
use crate::db::Database;
use crate::flash::{SESSION_EXPIRED_NOTICE, set_flash};
use crate::impl_has_auth_backend;
use crate::jwt::{JwtConfig, TokenPair};

/// Paths that skip the gate unless configured otherwise.
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &[
    "/api/users/login",
    "/api/users/register",
    "/login/",
    "/register/",
];

pub const DEFAULT_LOGIN_PATH: &str = "/login/";

const API_PREFIX: &str = "/api/";

/// Which paths the gate applies to and where it sends lost sessions.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    exempt_paths: Vec<String>,
    login_path: String,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect())
    }
}

impl GatePolicy {
    pub fn new(exempt_paths: Vec<String>) -> Self {
        Self {
            exempt_paths,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    /// Exempt entries are path prefixes.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_api(&self, path: &str) -> bool {
        path.starts_with(API_PREFIX)
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}

/// Everything the gate and guards need. Cheap to clone.
#[derive(Clone)]
pub struct AuthBackend {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookieSettings,
    pub policy: Arc<GatePolicy>,
}

impl_has_auth_backend!(AuthBackend);

impl HasPageAuthBackend for AuthBackend {
    fn login_path(&self) -> &str {
        self.policy.login_path()
    }
}

/// Result of inspecting the session cookies of one request.
#[derive(Debug)]
pub struct GateOutcome {
    pub state: SessionState,
    pub principal: Option<Principal>,
    /// Token pair minted by a silent refresh, not yet written to the response.
    pub pending: Option<TokenPair>,
}

impl GateOutcome {
    fn anonymous(state: SessionState) -> Self {
        Self {
            state,
            principal: None,
            pending: None,
        }
    }
}

/// Decide the session state from the request cookies. Refresh is attempted
/// at most once.
pub async fn authenticate<B: HasAuthBackend + ?Sized>(backend: &B, headers: &HeaderMap) -> GateOutcome {
    let access = get_cookie(headers, ACCESS_COOKIE_NAME).filter(|v| !v.is_empty());
    let refresh = get_cookie(headers, REFRESH_COOKIE_NAME).filter(|v| !v.is_empty());

    if access.is_none() && refresh.is_none() {
        return GateOutcome::anonymous(SessionState::NoCredentials);
    }

    if let Some(access) = access {
        match backend.jwt().validate_access_token(access) {
            Ok(_) => {
                if let Some(principal) = resolve_principal(backend.jwt(), backend.db(), access).await {
                    return GateOutcome {
                        state: SessionState::ValidAccess,
                        principal: Some(principal),
                        pending: None,
                    };
                }
                // A deleted or deactivated user gets no VALID_ACCESS; the
                // refresh token decides instead.
                debug!(reason = %AuthFailure::UnknownPrincipal, "Access token rejected");
            }
            Err(e) => {
                debug!(reason = %AuthFailure::from_token_error(&e), "Access token rejected");
            }
        }
    }

    let Some(refresh) = refresh else {
        return GateOutcome::anonymous(SessionState::ExpiredNoRefresh);
    };

    let pair = match backend.jwt().refresh(refresh) {
        Ok(pair) => pair,
        Err(e) => {
            debug!(reason = %AuthFailure::RefreshRejected, error = %e, "Refresh failed");
            return GateOutcome::anonymous(SessionState::RefreshFailed);
        }
    };

    match resolve_principal(backend.jwt(), backend.db(), &pair.access.token).await {
        Some(principal) => {
            debug!(user_id = principal.id, "Session refreshed");
            GateOutcome {
                state: SessionState::Refreshed,
                principal: Some(principal),
                pending: Some(pair),
            }
        }
        None => {
            // The new pair is discarded and the session counts as lost.
            debug!(reason = %AuthFailure::RefreshRejected, "Refreshed token names no active user");
            GateOutcome::anonymous(SessionState::RefreshFailed)
        }
    }
}

/// Middleware: run the session state machine, then finalize the response.
pub async fn auth_gate(State(backend): State<AuthBackend>, mut request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    if backend.policy.is_exempt(&path) {
        return next.run(request).await;
    }

    let outcome = authenticate(&backend, request.headers()).await;
    debug!(path = %path, state = outcome.state.as_str(), "Auth gate");

    if outcome.state.is_session_lost() && !backend.policy.is_api(&path) {
        info!(path = %path, state = outcome.state.as_str(), "Session lost, forcing logout");
        return forced_logout(&backend);
    }

    request.extensions_mut().insert(AuthContext {
        principal: outcome.principal,
        state: outcome.state,
    });

    let mut response = next.run(request).await;

    if let Some(pair) = outcome.pending {
        finalize(&backend.cookies, &mut response, &pair);
    }

    response
}

/// Write the pending pair unless the handler already replaced the session
/// (e.g. logout cleared it).
fn finalize(cookies: &CookieSettings, response: &mut Response, pair: &TokenPair) {
    let headers = response.headers_mut();
    if sets_cookie(headers, ACCESS_COOKIE_NAME) || sets_cookie(headers, REFRESH_COOKIE_NAME) {
        debug!("Handler replaced the session, dropping refreshed tokens");
        return;
    }
    cookies.issue(headers, pair);
}

/// Clear the session, leave a notice and send the client to login.
fn forced_logout<B: HasPageAuthBackend>(backend: &B) -> Response {
    let mut response = Redirect::temporary(backend.login_path()).into_response();
    let headers = response.headers_mut();
    backend.cookies().clear(headers);
    set_flash(headers, backend.cookies(), SESSION_EXPIRED_NOTICE);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exempt_paths_are_prefixes() {
        let policy = GatePolicy::default();
        assert!(policy.is_exempt("/api/users/login/"));
        assert!(policy.is_exempt("/api/users/register/"));
        assert!(policy.is_exempt("/login/"));
        assert!(!policy.is_exempt("/api/users/logout/"));
        assert!(!policy.is_exempt("/"));
        assert!(!policy.is_exempt("/admin-panel/"));
    }

    #[test]
    fn test_api_paths() {
        let policy = GatePolicy::default();
        assert!(policy.is_api("/api/posts/post/"));
        assert!(!policy.is_api("/post-list/"));
        assert!(!policy.is_api("/apiary/"));
    }
}
