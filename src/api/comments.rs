//! Comments API.
//!
//! Comments are created and listed under `/posts/{id}/comments`; this router
//! only handles deletion by the comment's author.

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::delete,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{ApiAuth, require_auth};
use crate::db::{Comment, Database};
use crate::impl_has_authenticator;
use crate::token::Authenticator;

/// State for comments endpoints.
#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
    pub authenticator: Arc<dyn Authenticator>,
}

impl_has_authenticator!(CommentsState);

pub fn router(state: CommentsState) -> Router {
    Router::new()
        .route("/{id}", delete(delete_comment))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<CommentsState>,
        ))
        .with_state(state)
}

#[derive(Serialize)]
pub(super) struct CommentResponse {
    id: String,
    post_id: String,
    username: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            username: comment.username,
            body: comment.body,
            created_at: comment.created_at,
        }
    }
}

async fn delete_comment(
    State(state): State<CommentsState>,
    ApiAuth(auth): ApiAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let comment = state
        .db
        .comments()
        .get_by_id(&id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    if !auth.owns(&comment.username) {
        return Err(ApiError::not_owner());
    }

    state
        .db
        .comments()
        .delete(&id)
        .await
        .db_err("Failed to delete comment")?;

    Ok(Json(serde_json::json!({ "success": true })))
}
