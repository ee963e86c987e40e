#![allow(dead_code)]

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, header},
};
use governor::Quota;
use quillpost::{
    ServerConfig,
    auth::{CookieSettings, DEFAULT_EXEMPT_PATHS},
    create_app,
    db::{Database, NewPost, NewUser, UserRole},
    jwt::{Claims, JwtConfig, TokenType},
    password::hash_password,
    rate_limit::RateLimitConfig,
};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-long-enough-for-hs256";
pub const PASSWORD: &str = "Passw0rd!";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

/// Rate limits high enough that tests never hit them.
pub fn permissive_rate_limits() -> RateLimitConfig {
    let quota = Quota::per_second(NonZeroU32::new(10_000).unwrap());
    RateLimitConfig::new(quota, quota)
}

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: JWT_SECRET.to_vec(),
        cookies: CookieSettings::default(),
        access_token_lifetime: Duration::from_secs(5 * 60),
        refresh_token_lifetime: Duration::from_secs(24 * 60 * 60),
        rotate_refresh_tokens: false,
        exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
        no_signup: false,
        ip_extractor: None,
        rate_limits: permissive_rate_limits(),
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

pub async fn test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = test_config(db.clone());
    configure(&mut config);
    let jwt = JwtConfig::new(&config.jwt_secret)
        .with_lifetimes(config.access_token_lifetime, config.refresh_token_lifetime)
        .with_refresh_rotation(config.rotate_refresh_tokens);
    TestApp {
        app: create_app(&config),
        db,
        jwt,
    }
}

/// Insert a user without paying for password hashing.
pub async fn create_user(db: &Database, username: &str, role: UserRole) -> i64 {
    let email = format!("{}@example.com", username);
    db.users()
        .create(&NewUser {
            email: &email,
            username,
            first_name: "Test",
            last_name: "User",
            password_hash: "unusable",
            role,
        })
        .await
        .expect("Failed to create user")
}

/// Insert a user that can log in with [`PASSWORD`].
pub async fn create_user_with_password(db: &Database, username: &str, role: UserRole) -> i64 {
    let email = format!("{}@example.com", username);
    let hash = hash_password(PASSWORD).expect("Failed to hash password");
    db.users()
        .create(&NewUser {
            email: &email,
            username,
            first_name: "Test",
            last_name: "User",
            password_hash: &hash,
            role,
        })
        .await
        .expect("Failed to create user")
}

pub async fn create_category(db: &Database, name: &str) -> i64 {
    db.categories()
        .create(name, "")
        .await
        .expect("Failed to create category")
}

pub async fn create_post(db: &Database, author_id: i64, category_id: i64, title: &str, is_draft: bool) -> i64 {
    db.posts()
        .create(&NewPost {
            author_id,
            category_id,
            title,
            content: "<p>Body text</p>",
            is_draft,
        })
        .await
        .expect("Failed to create post")
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// A correctly signed token of the given type that expired a minute ago.
pub fn expired_token(jwt: &JwtConfig, user_id: i64, token_type: TokenType) -> String {
    jwt.encode_claims(&Claims {
        sub: user_id.to_string(),
        token_type,
        jti: "expired".to_string(),
        iat: now() - 600,
        exp: now() - 60,
    })
    .unwrap()
}

pub fn access_token(jwt: &JwtConfig, user_id: i64) -> String {
    jwt.generate_access_token(user_id).unwrap().token
}

pub fn refresh_token(jwt: &JwtConfig, user_id: i64) -> String {
    jwt.generate_refresh_token(user_id).unwrap().token
}

/// Cookie header carrying both session tokens.
pub fn session_cookies(jwt: &JwtConfig, user_id: i64) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token(jwt, user_id),
        refresh_token(jwt, user_id)
    )
}

fn builder(method: &str, uri: &str, cookies: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder
}

pub fn get(uri: &str, cookies: Option<&str>) -> Request<Body> {
    builder("GET", uri, cookies).body(Body::empty()).unwrap()
}

pub fn empty(method: &str, uri: &str, cookies: Option<&str>) -> Request<Body> {
    builder(method, uri, cookies).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookies: Option<&str>, body: serde_json::Value) -> Request<Body> {
    builder(method, uri, cookies)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value a Set-Cookie header assigns to `name`, if any.
pub fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?.to_string();
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
}
