//! Posts, categories, likes and comments.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    response::Response,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{ApiError, ResultExt, json_body, parse_id, success_response};
use super::validation::FormErrors;
use crate::auth::{Auth, CookieSettings, ElevatedOnly, client_ip};
use crate::cli::IpExtractor;
use crate::db::{Database, NewPost, Post, PostSummary};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

const EXCERPT_LENGTH: usize = 150;
const MAX_TITLE_LENGTH: usize = 255;
const MAX_CATEGORY_NAME_LENGTH: usize = 100;

/// State for post endpoints.
#[derive(Clone)]
pub struct PostsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookieSettings,
    pub ip_extractor: Option<IpExtractor>,
}

impl_has_auth_backend!(PostsState);

pub fn router(state: PostsState) -> Router {
    Router::new()
        .route("/category/", get(list_categories).post(create_category))
        .route("/post/", get(list_posts).post(create_post))
        .route(
            "/post/{id}/",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/post/{id}/publish/", post(publish_post))
        .route("/post/{id}/unpublish/", post(unpublish_post))
        .route("/post/{id}/like/", post(toggle_like))
        .route(
            "/post/{id}/comments/",
            get(list_comments).post(create_comment),
        )
        .with_state(state)
}

/// Plain-text preview of HTML content: tags removed, common entities
/// decoded, cut to `max_chars` with `...` when shortened.
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    if text.chars().count() > max_chars {
        let mut short: String = text.chars().take(max_chars).collect();
        short.push_str("...");
        short
    } else {
        text
    }
}

/// A post as shown in listings.
#[derive(Serialize)]
pub struct PostListItem {
    id: i64,
    title: String,
    excerpt: String,
    author: String,
    category: i64,
    category_name: String,
    view_count: i64,
    like_count: i64,
    is_draft: bool,
    created_at: String,
}

impl From<PostSummary> for PostListItem {
    fn from(post: PostSummary) -> Self {
        Self {
            id: post.id,
            title: post.title,
            excerpt: excerpt(&post.content, EXCERPT_LENGTH),
            author: post.author_username,
            category: post.category_id,
            category_name: post.category_name,
            view_count: post.view_count,
            like_count: post.like_count,
            is_draft: post.is_draft,
            created_at: post.created_at,
        }
    }
}

#[derive(Serialize)]
struct PostDetail {
    id: i64,
    title: String,
    content: String,
    author: i64,
    author_username: String,
    category: i64,
    category_name: String,
    view_count: i64,
    like_count: i64,
    liked: bool,
    is_draft: bool,
    created_at: String,
    updated_at: String,
}

impl PostDetail {
    fn new(post: Post, like_count: i64, liked: bool) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            author: post.author_id,
            author_username: post.author_username,
            category: post.category_id,
            category_name: post.category_name,
            view_count: post.view_count,
            like_count,
            liked,
            is_draft: post.is_draft,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Load a post the principal may see. Drafts are hidden from standard users.
async fn visible_post(state: &PostsState, id: i64, elevated: bool) -> Result<Post, ApiError> {
    state
        .db
        .posts()
        .get(id)
        .await
        .db_err("Failed to get post")?
        .filter(|post| elevated || !post.is_draft)
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

// =============================================================================
// Categories
// =============================================================================

async fn list_categories(State(state): State<PostsState>, _auth: Auth) -> Result<Response, ApiError> {
    let categories = state
        .db
        .categories()
        .list()
        .await
        .db_err("Failed to list categories")?;
    Ok(success_response(StatusCode::OK, "Success", categories))
}

#[derive(Deserialize)]
struct CategoryRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

async fn create_category(
    State(state): State<PostsState>,
    _auth: Auth<ElevatedOnly>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let name = request.name.trim();

    let mut form = FormErrors::default();
    if name.is_empty() {
        form.add("name", "This field may not be blank.");
    } else if name.chars().count() > MAX_CATEGORY_NAME_LENGTH {
        form.add("name", "Ensure this field has no more than 100 characters.");
    } else if state
        .db
        .categories()
        .get_by_name(name)
        .await
        .db_err("Failed to get category")?
        .is_some()
    {
        form.add("name", "category with this name already exists.");
    }
    form.into_result().map_err(ApiError::invalid_form)?;

    let id = state
        .db
        .categories()
        .create(name, request.description.trim())
        .await
        .db_err("Failed to create category")?;
    let category = state
        .db
        .categories()
        .get(id)
        .await
        .db_err("Failed to get category")?
        .ok_or_else(|| ApiError::internal("Category vanished"))?;

    Ok(success_response(StatusCode::CREATED, "Category created", category))
}

// =============================================================================
// Posts
// =============================================================================

async fn list_posts(State(state): State<PostsState>, auth: Auth) -> Result<Response, ApiError> {
    let posts = state
        .db
        .posts()
        .list(auth.principal.is_elevated())
        .await
        .db_err("Failed to list posts")?;
    let items: Vec<PostListItem> = posts.into_iter().map(PostListItem::from).collect();
    Ok(success_response(StatusCode::OK, "Success", items))
}

#[derive(Deserialize)]
struct PostRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    category: Option<i64>,
    #[serde(default)]
    is_draft: bool,
}

/// Validate a create/update body. Returns the category id.
async fn validate_post(state: &PostsState, request: &PostRequest) -> Result<i64, ApiError> {
    let mut form = FormErrors::default();
    let title = request.title.trim();
    if title.is_empty() {
        form.add("title", "This field may not be blank.");
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        form.add("title", "Ensure this field has no more than 255 characters.");
    }
    if request.content.trim().is_empty() {
        form.add("content", "This field may not be blank.");
    }

    let category = match request.category {
        None => {
            form.add("category", "This field is required.");
            None
        }
        Some(id) => {
            let found = state
                .db
                .categories()
                .get(id)
                .await
                .db_err("Failed to get category")?;
            if found.is_none() {
                form.add("category", "Invalid category.");
            }
            found.map(|c| c.id)
        }
    };

    form.into_result().map_err(ApiError::invalid_form)?;
    category.ok_or_else(|| ApiError::bad_request("Invalid category."))
}

async fn create_post(
    State(state): State<PostsState>,
    auth: Auth<ElevatedOnly>,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let category_id = validate_post(&state, &request).await?;

    let id = state
        .db
        .posts()
        .create(&NewPost {
            author_id: auth.principal.id,
            category_id,
            title: request.title.trim(),
            content: &request.content,
            is_draft: request.is_draft,
        })
        .await
        .db_err("Failed to create post")?;
    info!(post_id = id, user_id = auth.principal.id, "Post created");

    let post = visible_post(&state, id, true).await?;
    Ok(success_response(
        StatusCode::CREATED,
        "Post created",
        PostDetail::new(post, 0, false),
    ))
}

/// Extracts the client IP for view tracking without failing the request.
struct ClientIp(Option<String>);

impl axum::extract::FromRequestParts<PostsState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &PostsState) -> Result<Self, Self::Rejection> {
        match client_ip(&parts.headers, &parts.extensions, state.ip_extractor.as_ref()) {
            Ok(ip) => Ok(ClientIp(Some(ip.to_string()))),
            Err(reason) => {
                warn!(reason, "Recording view without client IP");
                Ok(ClientIp(None))
            }
        }
    }
}

async fn get_post(
    State(state): State<PostsState>,
    auth: Auth,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let principal = &auth.principal;
    let mut post = visible_post(&state, id, principal.is_elevated()).await?;

    state
        .db
        .posts()
        .record_view(id, Some(principal.id), ip.as_deref())
        .await
        .db_err("Failed to record view")?;
    post.view_count += 1;

    let like_count = state
        .db
        .reactions()
        .count(id)
        .await
        .db_err("Failed to count likes")?;
    let liked = state
        .db
        .reactions()
        .has_liked(principal.id, id)
        .await
        .db_err("Failed to check like")?;

    Ok(success_response(
        StatusCode::OK,
        "Success",
        PostDetail::new(post, like_count, liked),
    ))
}

async fn update_post(
    State(state): State<PostsState>,
    _auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let existing = visible_post(&state, id, true).await?;
    let request = json_body(payload)?;
    let category_id = validate_post(&state, &request).await?;

    state
        .db
        .posts()
        .update(
            id,
            &NewPost {
                author_id: existing.author_id,
                category_id,
                title: request.title.trim(),
                content: &request.content,
                is_draft: request.is_draft,
            },
        )
        .await
        .db_err("Failed to update post")?;

    let post = visible_post(&state, id, true).await?;
    let like_count = state
        .db
        .reactions()
        .count(id)
        .await
        .db_err("Failed to count likes")?;
    Ok(success_response(
        StatusCode::OK,
        "Post updated",
        PostDetail::new(post, like_count, false),
    ))
}

async fn delete_post(
    State(state): State<PostsState>,
    auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .db
        .posts()
        .delete(id)
        .await
        .db_err("Failed to delete post")?;
    if !deleted {
        return Err(ApiError::not_found("Post not found"));
    }
    info!(post_id = id, user_id = auth.principal.id, "Post deleted");
    Ok(success_response(StatusCode::OK, "Post deleted successfully", ()))
}

async fn set_draft(state: &PostsState, raw_id: &str, is_draft: bool) -> Result<(), ApiError> {
    let id = parse_id(raw_id)?;
    let updated = state
        .db
        .posts()
        .set_draft(id, is_draft)
        .await
        .db_err("Failed to update post")?;
    if !updated {
        return Err(ApiError::not_found("Post not found"));
    }
    Ok(())
}

async fn publish_post(
    State(state): State<PostsState>,
    _auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_draft(&state, &id, false).await?;
    Ok(success_response(StatusCode::OK, "Post published", serde_json::json!({ "is_draft": false })))
}

async fn unpublish_post(
    State(state): State<PostsState>,
    _auth: Auth<ElevatedOnly>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_draft(&state, &id, true).await?;
    Ok(success_response(StatusCode::OK, "Post unpublished", serde_json::json!({ "is_draft": true })))
}

#[derive(Serialize)]
struct LikeResponse {
    liked: bool,
    like_count: i64,
}

async fn toggle_like(
    State(state): State<PostsState>,
    auth: Auth,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    visible_post(&state, id, auth.principal.is_elevated()).await?;

    let liked = state
        .db
        .reactions()
        .toggle(auth.principal.id, id)
        .await
        .db_err("Failed to toggle like")?;
    let like_count = state
        .db
        .reactions()
        .count(id)
        .await
        .db_err("Failed to count likes")?;

    let message = if liked { "Post liked" } else { "Post unliked" };
    Ok(success_response(StatusCode::OK, message, LikeResponse { liked, like_count }))
}

// =============================================================================
// Comments
// =============================================================================

async fn list_comments(
    State(state): State<PostsState>,
    auth: Auth,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    visible_post(&state, id, auth.principal.is_elevated()).await?;

    let comments = state
        .db
        .comments()
        .list_approved(id)
        .await
        .db_err("Failed to list comments")?;
    Ok(success_response(StatusCode::OK, "Success", comments))
}

#[derive(Deserialize)]
struct CommentRequest {
    #[serde(default)]
    content: String,
}

async fn create_comment(
    State(state): State<PostsState>,
    auth: Auth,
    Path(id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    visible_post(&state, id, auth.principal.is_elevated()).await?;
    let request = json_body(payload)?;

    let content = request.content.trim();
    let mut form = FormErrors::default();
    if content.is_empty() {
        form.add("content", "This field may not be blank.");
    }
    form.into_result().map_err(ApiError::invalid_form)?;

    let comment_id = state
        .db
        .comments()
        .create(auth.principal.id, id, content)
        .await
        .db_err("Failed to create comment")?;

    Ok(success_response(
        StatusCode::CREATED,
        "Comment submitted and awaiting approval",
        serde_json::json!({ "id": comment_id, "is_approved": false }),
    ))
}
