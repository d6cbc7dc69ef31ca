mod comments;
mod error;
mod posts;
mod tokens;
mod users;

use axum::Router;
use chrono::Duration;
use std::sync::Arc;

use crate::auth::IpExtractor;
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use crate::token::Authenticator;

pub use error::{ApiError, MAX_USERNAME_LENGTH, ResultExt, validate_username, validate_uuid};
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    authenticator: Arc<dyn Authenticator>,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
    no_signup: bool,
    rate_limit_config: Arc<RateLimitConfig>,
    ip_extractor: Option<IpExtractor>,
) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        authenticator: authenticator.clone(),
        access_token_duration,
        refresh_token_duration,
        no_signup,
        rate_limit_config,
        ip_extractor,
    };

    let posts_state = posts::PostsState {
        db: db.clone(),
        authenticator: authenticator.clone(),
    };

    let comments_state = comments::CommentsState {
        db: db.clone(),
        authenticator: authenticator.clone(),
    };

    let tokens_state = tokens::TokensState {
        db,
        authenticator,
        access_token_duration,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/posts", posts::router(posts_state))
        .nest("/comments", comments::router(comments_state))
        .nest("/tokens", tokens::router(tokens_state))
}
