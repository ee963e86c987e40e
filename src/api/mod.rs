mod admin;
pub mod error;
mod posts;
mod users;
pub mod validation;

use axum::Router;
use std::sync::Arc;

use crate::auth::CookieSettings;
use crate::cli::IpExtractor;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

/// Shared inputs for the API routers.
pub struct ApiConfig {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookieSettings,
    pub no_signup: bool,
    pub rate_limits: RateLimitConfig,
    pub ip_extractor: Option<IpExtractor>,
}

/// Create the API router.
pub fn create_api_router(config: ApiConfig) -> Router {
    let users_state = users::UsersState {
        db: config.db.clone(),
        jwt: config.jwt.clone(),
        cookies: config.cookies,
        no_signup: config.no_signup,
        rate_limits: config.rate_limits,
        ip_extractor: config.ip_extractor,
    };

    let admin_state = admin::AdminState {
        db: config.db.clone(),
        jwt: config.jwt.clone(),
        cookies: config.cookies,
    };

    let posts_state = posts::PostsState {
        db: config.db,
        jwt: config.jwt,
        cookies: config.cookies,
        ip_extractor: config.ip_extractor,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/admin", admin::router(admin_state))
        .nest("/posts", posts::router(posts_state))
}
