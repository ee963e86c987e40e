pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod flash;
pub mod jwt;
pub mod pages;
pub mod password;
pub mod rate_limit;

use api::{ApiConfig, create_api_router};
use auth::{AuthBackend, CookieSettings, GatePolicy, auth_gate};
use axum::{Router, middleware};
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Security attributes for every cookie the server sets
    pub cookies: CookieSettings,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    /// Mint a new refresh token on every silent refresh
    pub rotate_refresh_tokens: bool,
    /// Path prefixes that bypass the session gate
    pub exempt_paths: Vec<String>,
    /// Whether new user signups are disabled
    pub no_signup: bool,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_extractor: Option<cli::IpExtractor>,
    pub rate_limits: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(
        JwtConfig::new(&config.jwt_secret)
            .with_lifetimes(config.access_token_lifetime, config.refresh_token_lifetime)
            .with_refresh_rotation(config.rotate_refresh_tokens),
    );
    tracing::info!(
        access_secs = jwt.access_lifetime().as_secs(),
        refresh_secs = jwt.refresh_lifetime().as_secs(),
        rotate = jwt.rotates_refresh_tokens(),
        secure_cookies = config.cookies.secure(),
        same_site = config.cookies.same_site().as_str(),
        "Session settings"
    );

    let backend = AuthBackend {
        db: config.db.clone(),
        jwt: jwt.clone(),
        cookies: config.cookies,
        policy: Arc::new(GatePolicy::new(config.exempt_paths.clone())),
    };

    let api_router = create_api_router(ApiConfig {
        db: config.db.clone(),
        jwt,
        cookies: config.cookies,
        no_signup: config.no_signup,
        rate_limits: config.rate_limits.clone(),
        ip_extractor: config.ip_extractor,
    });

    Router::new()
        .nest("/api", api_router)
        .merge(pages::router(backend.clone()))
        .layer(middleware::from_fn_with_state(backend, auth_gate))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
