//! Posts API.
//!
//! Reads of published posts are public. Drafts are only visible to their
//! author. Every mutation requires a bearer token belonging to the author.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::comments::CommentResponse;
use super::error::{ApiError, ResultExt, validate_username, validate_uuid};
use crate::auth::{ApiAuth, AuthenticatedUser, MaybeAuth, require_auth};
use crate::db::{Database, NewPost, Post, PostStatus};
use crate::impl_has_authenticator;
use crate::token::Authenticator;

const MAX_TITLE_LENGTH: usize = 200;

/// State for posts endpoints.
#[derive(Clone)]
pub struct PostsState {
    pub db: Database,
    pub authenticator: Arc<dyn Authenticator>,
}

impl_has_authenticator!(PostsState);

pub fn router(state: PostsState) -> Router {
    let public = Router::new()
        .route("/{id}", get(get_post))
        .route("/{id}/comments", get(list_comments))
        .route("/category/{category}", get(list_by_category))
        .route("/user/{username}", get(list_by_user));

    let protected = Router::new()
        .route("/", post(create_post))
        .route("/{id}", put(update_post).delete(delete_post))
        .route("/{id}/publish", post(publish_post))
        .route("/{id}/comments", post(create_comment))
        .route("/user/{username}/drafts", get(list_drafts))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<PostsState>,
        ));

    public.merge(protected).with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreatePostRequest {
    title: String,
    body: String,
    #[serde(default = "default_status")]
    status: PostStatus,
    category: String,
}

fn default_status() -> PostStatus {
    PostStatus::Draft
}

#[derive(Deserialize)]
struct UpdatePostRequest {
    body: String,
}

#[derive(Deserialize)]
struct CreateCommentRequest {
    body: String,
}

#[derive(Serialize)]
struct PostResponse {
    id: String,
    username: String,
    title: String,
    body: String,
    status: PostStatus,
    category: String,
    created_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            username: post.username,
            title: post.title,
            body: post.body,
            status: post.status,
            category: post.category,
            created_at: post.created_at,
            published_at: post.published_at,
            last_modified: post.last_modified,
        }
    }
}

#[derive(Serialize)]
struct ListPostsResponse {
    posts: Vec<PostResponse>,
}

impl From<Vec<Post>> for ListPostsResponse {
    fn from(posts: Vec<Post>) -> Self {
        Self {
            posts: posts.into_iter().map(PostResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct ListCommentsResponse {
    comments: Vec<CommentResponse>,
}

// --- Helpers ---

/// Load a post the caller is allowed to see. Drafts of other users look
/// exactly like missing posts.
async fn load_visible_post(
    db: &Database,
    id: &str,
    viewer: Option<&AuthenticatedUser>,
) -> Result<Post, ApiError> {
    validate_uuid(id)?;

    let post = db
        .posts()
        .get_by_id(id)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let visible = post.is_published() || viewer.is_some_and(|user| user.owns(&post.username));
    if !visible {
        return Err(ApiError::not_found("Post not found"));
    }

    Ok(post)
}

/// Load a post for mutation: syntax, then existence, then ownership.
async fn load_owned_post(
    db: &Database,
    id: &str,
    auth: &AuthenticatedUser,
) -> Result<Post, ApiError> {
    validate_uuid(id)?;

    let post = db
        .posts()
        .get_by_id(id)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if !auth.owns(&post.username) {
        return Err(ApiError::not_owner());
    }

    Ok(post)
}

fn require_text(value: &str, name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} cannot be empty", name)));
    }
    Ok(())
}

// --- Handlers ---

async fn create_post(
    State(state): State<PostsState>,
    ApiAuth(auth): ApiAuth,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    require_text(title, "Title")?;
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Title cannot be longer than {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    require_text(&payload.body, "Body")?;
    let category = payload.category.trim().to_lowercase();
    require_text(&category, "Category")?;

    let post = state
        .db
        .posts()
        .create(&NewPost {
            username: auth.username(),
            title,
            body: &payload.body,
            status: payload.status,
            category: &category,
        })
        .await
        .db_err("Failed to create post")?;

    info!(post_id = %post.id, username = %post.username, "Post created");

    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

async fn get_post(
    State(state): State<PostsState>,
    MaybeAuth(viewer): MaybeAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post = load_visible_post(&state.db, &id, viewer.as_ref()).await?;
    Ok(Json(PostResponse::from(post)))
}

async fn list_by_category(
    State(state): State<PostsState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = category.trim().to_lowercase();
    require_text(&category, "Category")?;

    let posts = state
        .db
        .posts()
        .list_published_by_category(&category)
        .await
        .db_err("Failed to list posts")?;

    Ok(Json(ListPostsResponse::from(posts)))
}

async fn list_by_user(
    State(state): State<PostsState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&username)?;

    let exists = state
        .db
        .users()
        .exists(&username)
        .await
        .db_err("Failed to get user")?;
    if !exists {
        return Err(ApiError::not_found("User not found"));
    }

    let posts = state
        .db
        .posts()
        .list_published_by_username(&username)
        .await
        .db_err("Failed to list posts")?;

    Ok(Json(ListPostsResponse::from(posts)))
}

async fn list_drafts(
    State(state): State<PostsState>,
    ApiAuth(auth): ApiAuth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&username)?;
    if !auth.owns(&username) {
        return Err(ApiError::not_owner());
    }

    let posts = state
        .db
        .posts()
        .list_drafts_by_username(&username)
        .await
        .db_err("Failed to list drafts")?;

    Ok(Json(ListPostsResponse::from(posts)))
}

async fn update_post(
    State(state): State<PostsState>,
    ApiAuth(auth): ApiAuth,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_post(&state.db, &id, &auth).await?;
    require_text(&payload.body, "Body")?;

    let post = state
        .db
        .posts()
        .update_body(&id, &payload.body)
        .await
        .db_err("Failed to update post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(PostResponse::from(post)))
}

async fn publish_post(
    State(state): State<PostsState>,
    ApiAuth(auth): ApiAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_post(&state.db, &id, &auth).await?;

    let post = state
        .db
        .posts()
        .publish(&id)
        .await
        .db_err("Failed to publish post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    info!(post_id = %post.id, "Post published");

    Ok(Json(PostResponse::from(post)))
}

async fn delete_post(
    State(state): State<PostsState>,
    ApiAuth(auth): ApiAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_post(&state.db, &id, &auth).await?;

    let deleted = state
        .db
        .posts()
        .delete(&id)
        .await
        .db_err("Failed to delete post")?;

    if !deleted {
        return Err(ApiError::not_found("Post not found"));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn create_comment(
    State(state): State<PostsState>,
    ApiAuth(auth): ApiAuth,
    Path(id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = load_visible_post(&state.db, &id, Some(&auth)).await?;
    require_text(&payload.body, "Comment")?;

    let comment = state
        .db
        .comments()
        .create(&post.id, auth.username(), &payload.body)
        .await
        .db_err("Failed to create comment")?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

async fn list_comments(
    State(state): State<PostsState>,
    MaybeAuth(viewer): MaybeAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post = load_visible_post(&state.db, &id, viewer.as_ref()).await?;

    let comments = state
        .db
        .comments()
        .list_by_post(&post.id)
        .await
        .db_err("Failed to list comments")?;

    Ok(Json(ListCommentsResponse {
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}
