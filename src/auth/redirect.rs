//! Send signed-in visitors away from the login and registration pages.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use super::gate::{AuthBackend, authenticate};
use super::guards::{elevated, standard};
use super::types::Principal;

/// Where a signed-in principal lands, first match wins.
pub const LANDING_PAGES: &[(fn(&Principal) -> bool, &str)] = &[
    (elevated, "/admin-panel/"),
    (standard, "/"),
];

pub fn landing_page(principal: &Principal) -> &'static str {
    LANDING_PAGES
        .iter()
        .find(|(applies, _)| applies(principal))
        .map(|(_, path)| *path)
        .unwrap_or("/")
}

/// Middleware for entry pages. A principal from a valid access cookie or a
/// silent refresh is redirected to its landing page; a refresh here also
/// writes the new cookies.
pub async fn redirect_if_authenticated(
    State(backend): State<AuthBackend>,
    request: Request,
    next: Next,
) -> Response {
    let outcome = authenticate(&backend, request.headers()).await;

    let Some(principal) = outcome.principal else {
        return next.run(request).await;
    };

    let target = landing_page(&principal);
    debug!(user_id = principal.id, landing = target, "Already signed in");

    let mut response = Redirect::temporary(target).into_response();
    if let Some(pair) = outcome.pending {
        backend.cookies.issue(response.headers_mut(), &pair);
    }
    response
}
