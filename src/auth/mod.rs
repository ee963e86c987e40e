//! Cookie-based JWT sessions with role guards.
//!
//! Short-lived access tokens and longer-lived refresh tokens travel in two
//! HttpOnly cookies. The [`auth_gate`] middleware resolves the principal for
//! each request, silently refreshing an expired access token when a valid
//! refresh token is present, and forces a logout on page routes when the
//! session cannot be recovered.

mod cookie;
mod errors;
mod gate;
mod guards;
mod ip;
mod principal;
mod redirect;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME, SameSite, get_cookie, sets_cookie,
};
pub use errors::{ApiAuthError, ApiAuthErrorKind, AuthFailure, LoginRedirect};
pub use gate::{
    AuthBackend, DEFAULT_EXEMPT_PATHS, DEFAULT_LOGIN_PATH, GateOutcome, GatePolicy, auth_gate,
    authenticate,
};
pub use guards::{
    AnyRole, Auth, ElevatedOnly, GuardFailure, PageAuth, RoleConstraint, StandardOnly,
    authenticated, check, elevated, standard,
};
pub use ip::client_ip;
pub use principal::resolve_principal;
pub use redirect::{LANDING_PAGES, landing_page, redirect_if_authenticated};
pub use state::{HasAuthBackend, HasPageAuthBackend};
pub use types::{AuthContext, Principal, SessionState};
