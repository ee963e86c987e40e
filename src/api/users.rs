//! Account endpoints: registration, login, logout and the current user.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{ApiError, ResultExt, json_body, success_response};
use super::posts::PostListItem;
use super::validation::{
    FormErrors, validate_email, validate_name, validate_password, validate_username,
};
use crate::auth::{Auth, CookieSettings, Principal, StandardOnly};
use crate::cli::IpExtractor;
use crate::db::{Comment, Database, NewUser, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, RateLimitState, rate_limit};

/// State for user endpoints.
#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookieSettings,
    pub no_signup: bool,
    pub rate_limits: RateLimitConfig,
    pub ip_extractor: Option<IpExtractor>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let login_limit = RateLimitState {
        limiter: state.rate_limits.login.clone(),
        ip_extractor: state.ip_extractor,
        message: "Too many login attempts. Please wait before trying again.",
    };

    let account_router = Router::new()
        .route("/logout/", post(logout))
        .route("/me/", get(me))
        .route("/me/activity/", get(activity))
        .with_state(state.clone());

    let login_router = Router::new()
        .route("/login/", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(login_limit, rate_limit));

    let router = Router::new().merge(account_router).merge(login_router);

    if state.no_signup {
        return router;
    }

    let register_limit = RateLimitState {
        limiter: state.rate_limits.register.clone(),
        ip_extractor: state.ip_extractor,
        message: "Too many signup attempts. Please wait before trying again.",
    };
    let register_router = Router::new()
        .route("/register/", post(register))
        .with_state(state)
        .layer(middleware::from_fn_with_state(register_limit, rate_limit));

    router.merge(register_router)
}

#[derive(Deserialize)]
pub(super) struct UserForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

fn required(form: &mut FormErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        form.add(field, "This field is required.");
        false
    } else {
        true
    }
}

/// Field checks shared by self-registration and admin user creation.
/// Uniqueness is checked against the database.
pub(super) async fn validate_user_form(
    db: &Database,
    request: &UserForm,
    require_confirmation: bool,
) -> Result<(), ApiError> {
    let mut form = FormErrors::default();

    if required(&mut form, "email", &request.email) {
        form.check("email", validate_email(&request.email));
    }
    if required(&mut form, "username", &request.username) {
        form.check("username", validate_username(&request.username));
    }
    if required(&mut form, "first_name", &request.first_name) {
        form.check("first_name", validate_name(&request.first_name, "First name"));
    }
    if required(&mut form, "last_name", &request.last_name) {
        form.check("last_name", validate_name(&request.last_name, "Last name"));
    }
    if required(&mut form, "password", &request.password) {
        form.check("password", validate_password(&request.password));
    }

    if require_confirmation {
        match request.confirm_password.as_deref() {
            None | Some("") => form.add("confirm_password", "This field is required."),
            Some(confirm) if confirm != request.password => {
                form.add("confirm_password", "Passwords do not match.")
            }
            Some(_) => {}
        }
    }

    if !form.has("email")
        && db
            .users()
            .is_email_taken(&request.email)
            .await
            .db_err("Failed to check email")?
    {
        form.add("email", "A user with this email already exists.");
    }
    if !form.has("username")
        && db
            .users()
            .is_username_taken(&request.username)
            .await
            .db_err("Failed to check username")?
    {
        form.add("username", "A user with that username already exists.");
    }

    form.into_result().map_err(ApiError::invalid_form)
}

/// Hash the password and insert a user from a validated form.
pub(super) async fn insert_user(db: &Database, request: &UserForm, role: UserRole) -> Result<i64, ApiError> {
    let password_hash = hash_password(&request.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create user")
    })?;

    db.users()
        .create(&NewUser {
            email: &request.email,
            username: &request.username,
            first_name: &request.first_name,
            last_name: &request.last_name,
            password_hash: &password_hash,
            role,
        })
        .await
        .db_err("Failed to create user")
}

async fn register(
    State(state): State<UsersState>,
    payload: Result<Json<UserForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    validate_user_form(&state.db, &request, true).await?;

    let id = insert_user(&state.db, &request, UserRole::User).await?;
    info!(user_id = id, username = %request.username, "User registered");

    Ok(success_response(StatusCode::CREATED, "User registered successfully.", ()))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    id: i64,
    email: String,
    username: String,
}

async fn login(
    State(state): State<UsersState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let (Some(email), Some(password)) = (
        request.email.filter(|e| !e.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Invalid form submission")
            .with_detail("Email and password are required."));
    };

    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to look up user")?
        .filter(|user| verify_password(&password, &user.password_hash));

    let Some(user) = user else {
        warn!("Failed login attempt");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !user.is_active {
        return Err(ApiError::forbidden("Restricted account").with_detail("User account is deactivated."));
    }

    let principal = Principal::from(user);
    let pair = state.jwt.issue_for_principal(&principal).map_err(|e| {
        tracing::error!(error = %e, "Failed to issue tokens");
        ApiError::internal("Failed to issue tokens")
    })?;
    info!(user_id = principal.id, "User logged in");

    let mut response = success_response(
        StatusCode::OK,
        "Success",
        LoginResponse {
            id: principal.id,
            email: principal.email,
            username: principal.username,
        },
    );
    state.cookies.issue(response.headers_mut(), &pair);
    Ok(response)
}

async fn logout(State(state): State<UsersState>, auth: Auth) -> Response {
    info!(user_id = auth.principal.id, session = auth.state.as_str(), "User logged out");
    let mut response = success_response(StatusCode::OK, "Logged out successfully", ());
    state.cookies.clear(response.headers_mut());
    response
}

async fn me(State(state): State<UsersState>, auth: Auth) -> Result<Response, ApiError> {
    let profile = state
        .db
        .users()
        .get_summary(auth.principal.id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(success_response(StatusCode::OK, "Success", profile))
}

#[derive(Serialize)]
struct Activity {
    liked_posts: Vec<PostListItem>,
    comments: Vec<Comment>,
}

async fn activity(
    State(state): State<UsersState>,
    auth: Auth<StandardOnly>,
) -> Result<Response, ApiError> {
    let liked_posts = state
        .db
        .posts()
        .list_liked_by(auth.principal.id)
        .await
        .db_err("Failed to list liked posts")?
        .into_iter()
        .map(PostListItem::from)
        .collect();
    let comments = state
        .db
        .comments()
        .list_by_user(auth.principal.id)
        .await
        .db_err("Failed to list comments")?;

    Ok(success_response(
        StatusCode::OK,
        "Success",
        Activity {
            liked_posts,
            comments,
        },
    ))
}
