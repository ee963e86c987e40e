//! Role guards built on the auth gate's result.
//!
//! A guard is the `authenticated` check followed by one role predicate.
//! `Auth<R>` answers API callers with 401/403; `PageAuth<R>` redirects to
//! login on any failure.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::errors::{ApiAuthError, ApiAuthErrorKind, LoginRedirect};
use super::state::{HasAuthBackend, HasPageAuthBackend};
use super::types::{AuthContext, Principal, SessionState};

/// The principal attached by the gate, if any.
pub fn authenticated(context: Option<&AuthContext>) -> Option<&Principal> {
    context.and_then(|c| c.principal.as_ref())
}

pub fn elevated(principal: &Principal) -> bool {
    principal.is_elevated()
}

pub fn standard(principal: &Principal) -> bool {
    !principal.is_elevated()
}

/// Marker for the role predicate a guard applies after authentication.
pub trait RoleConstraint: Send + Sync + 'static {
    fn permits(principal: &Principal) -> bool;
}

/// Any authenticated principal.
pub struct AnyRole;

/// Administrators only.
pub struct ElevatedOnly;

/// Regular users only; administrators are turned away.
pub struct StandardOnly;

impl RoleConstraint for AnyRole {
    fn permits(_principal: &Principal) -> bool {
        true
    }
}

impl RoleConstraint for ElevatedOnly {
    fn permits(principal: &Principal) -> bool {
        elevated(principal)
    }
}

impl RoleConstraint for StandardOnly {
    fn permits(principal: &Principal) -> bool {
        standard(principal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardFailure {
    Unauthenticated,
    WrongRole,
}

/// Apply `authenticated`, then the role predicate.
pub fn check<R: RoleConstraint>(context: Option<&AuthContext>) -> Result<&Principal, GuardFailure> {
    let principal = authenticated(context).ok_or(GuardFailure::Unauthenticated)?;
    if R::permits(principal) {
        Ok(principal)
    } else {
        Err(GuardFailure::WrongRole)
    }
}

fn guarded<R: RoleConstraint>(parts: &Parts) -> Result<(Principal, SessionState), GuardFailure> {
    let context = parts.extensions.get::<AuthContext>();
    let principal = check::<R>(context)?.clone();
    let state = context.map(|c| c.state).unwrap_or(SessionState::NoCredentials);
    Ok((principal, state))
}

/// Extractor for API endpoints.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub principal: Principal,
    pub state: SessionState,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let kind = match guarded::<R>(parts) {
            Ok((principal, session)) => {
                return Ok(Auth {
                    principal,
                    state: session,
                    _role: PhantomData,
                });
            }
            Err(GuardFailure::Unauthenticated) => ApiAuthErrorKind::NotAuthenticated,
            Err(GuardFailure::WrongRole) => ApiAuthErrorKind::InsufficientRole,
        };
        let error = ApiAuthError::new(kind, *state.cookies());
        debug!(path = %parts.uri.path(), kind = ?error.kind(), "API guard rejected request");
        Err(error)
    }
}

/// Extractor for HTML pages.
pub struct PageAuth<R: RoleConstraint = AnyRole> {
    pub principal: Principal,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for PageAuth<R>
where
    S: HasPageAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guarded::<R>(parts)
            .map(|(principal, _)| PageAuth {
                principal,
                _role: PhantomData,
            })
            .map_err(|_| LoginRedirect {
                login_path: state.login_path().to_string(),
            })
    }
}
