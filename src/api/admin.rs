//! Admin API endpoints.
//!
//! All endpoints require the admin role. Admin accounts themselves are not
//! manageable through these endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
    routing::{delete, get, patch},
};
use tracing::info;

use super::error::{ApiError, ResultExt, json_body, parse_id, success_response};
use super::users::{UserForm, insert_user, validate_user_form};
use crate::auth::{Auth, CookieSettings, ElevatedOnly};
use crate::db::{Database, UserRole, UserSummary};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookieSettings,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users/", get(list_users).post(create_user))
        .route("/users/{id}/", get(get_user).delete(delete_user))
        .route("/users/{id}/toggle-status/", patch(toggle_status))
        .route("/comments/", get(list_pending_comments))
        .route("/comments/{id}/approve/", patch(approve_comment))
        .route("/comments/{id}/", delete(delete_comment))
        .with_state(state)
}

/// Load a non-admin user by raw path id.
async fn managed_user(state: &AdminState, raw_id: &str) -> Result<UserSummary, ApiError> {
    let id = parse_id(raw_id)?;
    state
        .db
        .users()
        .get_summary(id)
        .await
        .db_err("Failed to get user")?
        .filter(|user| user.role != UserRole::Admin)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn list_users(
    State(state): State<AdminState>,
    _auth: Auth<ElevatedOnly>,
) -> Result<Response, ApiError> {
    let users = state
        .db
        .users()
        .list_non_admin()
        .await
        .db_err("Failed to list users")?;
    Ok(success_response(StatusCode::OK, "Success", users))
}

async fn create_user(
    State(state): State<AdminState>,
    auth: Auth<ElevatedOnly>,
    payload: Result<Json<UserForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    validate_user_form(&state.db, &request, false).await?;

    let id = insert_user(&state.db, &request, UserRole::User).await?;
    info!(user_id = id, admin_id = auth.principal.id, "User created by admin");

    let user = state
        .db
        .users()
        .get_summary(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::internal("User vanished"))?;
    Ok(success_response(StatusCode::CREATED, "User created", user))
}

async fn get_user(
    State(state): State<AdminState>,
    _auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let user = managed_user(&state, &id).await?;
    Ok(success_response(StatusCode::OK, "Success", user))
}

async fn delete_user(
    State(state): State<AdminState>,
    auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let user = managed_user(&state, &id).await?;
    state
        .db
        .users()
        .delete(user.id)
        .await
        .db_err("Failed to delete user")?;
    info!(user_id = user.id, admin_id = auth.principal.id, "User deleted");
    Ok(success_response(StatusCode::OK, "User deleted successfully", ()))
}

async fn toggle_status(
    State(state): State<AdminState>,
    auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let user = managed_user(&state, &id).await?;
    let is_active = state
        .db
        .users()
        .toggle_active(user.id)
        .await
        .db_err("Failed to toggle user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(user_id = user.id, admin_id = auth.principal.id, is_active, "User status toggled");
    Ok(success_response(
        StatusCode::OK,
        "User status toggled",
        serde_json::json!({ "id": user.id, "is_active": is_active }),
    ))
}

async fn list_pending_comments(
    State(state): State<AdminState>,
    _auth: Auth<ElevatedOnly>,
) -> Result<Response, ApiError> {
    let comments = state
        .db
        .comments()
        .list_pending()
        .await
        .db_err("Failed to list comments")?;
    Ok(success_response(StatusCode::OK, "Success", comments))
}

async fn approve_comment(
    State(state): State<AdminState>,
    _auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let approved = state
        .db
        .comments()
        .approve(id)
        .await
        .db_err("Failed to approve comment")?;
    if !approved {
        return Err(ApiError::not_found("Comment not found"));
    }
    Ok(success_response(StatusCode::OK, "Comment approved", ()))
}

async fn delete_comment(
    State(state): State<AdminState>,
    _auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .db
        .comments()
        .delete(id)
        .await
        .db_err("Failed to delete comment")?;
    if !deleted {
        return Err(ApiError::not_found("Comment not found"));
    }
    Ok(success_response(StatusCode::OK, "Comment deleted", ()))
}
