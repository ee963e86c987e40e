//! Traits tying handler state to the session machinery.

use super::cookie::CookieSettings;
use crate::db::Database;
use crate::jwt::JwtConfig;

/// What a state type must expose for the gate and the API guards.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn cookies(&self) -> &CookieSettings;
}

/// Page guards also need to know where to send a rejected visitor.
pub trait HasPageAuthBackend: HasAuthBackend {
    fn login_path(&self) -> &str;
}

/// Implements [`HasAuthBackend`] for a struct with `jwt: Arc<JwtConfig>`,
/// `db: Database` and `cookies: CookieSettings` fields.
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn cookies(&self) -> &$crate::auth::CookieSettings {
                &self.cookies
            }
        }
    };
}
