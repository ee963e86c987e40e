//! Resolve a token to the principal it names.

use tracing::{debug, error};

use super::errors::AuthFailure;
use super::types::Principal;
use crate::db::Database;
use crate::jwt::JwtConfig;

/// Decode the token, read its subject id and load the user. Returns None if
/// any step fails; inactive users resolve to nothing.
pub async fn resolve_principal(jwt: &JwtConfig, db: &Database, token: &str) -> Option<Principal> {
    match lookup(jwt, db, token).await {
        Ok(principal) => Some(principal),
        Err(failure) => {
            debug!(reason = %failure, "Could not resolve principal");
            None
        }
    }
}

async fn lookup(jwt: &JwtConfig, db: &Database, token: &str) -> Result<Principal, AuthFailure> {
    let claims = jwt.decode(token).ok_or(AuthFailure::MalformedToken)?;
    let user_id = claims.subject_id().ok_or(AuthFailure::MalformedToken)?;

    let user = db
        .users()
        .get_by_id(user_id)
        .await
        .map_err(|e| {
            error!(user_id, error = %e, "Failed to load user");
            AuthFailure::UnknownPrincipal
        })?
        .ok_or(AuthFailure::UnknownPrincipal)?;

    if !user.is_active {
        return Err(AuthFailure::UnknownPrincipal);
    }

    Ok(Principal::from(user))
}
