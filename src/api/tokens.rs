//! Session and token management API endpoints.
//!
//! - POST `/renew` - Exchange a refresh token for a new access token
//! - POST `/logout` - Revoke the session behind a refresh token
//! - GET `/` - List own active sessions
//! - POST `/{id}/block` - Block one of own sessions
//! - DELETE `/{id}` - Revoke one of own sessions

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{ApiAuth, AuthenticatedUser, RenewError, renew_access_token, require_auth};
use crate::db::{Database, Session};
use crate::impl_has_authenticator;
use crate::token::Authenticator;

#[derive(Clone)]
pub struct TokensState {
    pub db: Database,
    pub authenticator: Arc<dyn Authenticator>,
    pub access_token_duration: Duration,
}

impl_has_authenticator!(TokensState);

pub fn router(state: TokensState) -> Router {
    let public = Router::new()
        .route("/renew", post(renew_token))
        .route("/logout", post(logout));

    let protected = Router::new()
        .route("/", get(list_sessions))
        .route("/{id}/block", post(block_session))
        .route("/{id}", delete(revoke_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<TokensState>,
        ));

    public.merge(protected).with_state(state)
}

#[derive(Deserialize)]
struct RefreshTokenRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct RenewResponse {
    access_token: String,
    access_token_expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct SessionInfo {
    id: String,
    user_agent: String,
    client_ip: String,
    is_blocked: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            user_agent: session.user_agent,
            client_ip: session.client_ip,
            is_blocked: session.is_blocked,
            expires_at: session.expires_at,
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize)]
struct ListSessionsResponse {
    sessions: Vec<SessionInfo>,
}

impl From<RenewError> for ApiError {
    fn from(err: RenewError) -> Self {
        match err {
            RenewError::Unauthenticated(reason) => {
                debug!(reason = %reason, "Refresh token rejected");
                ApiError::unauthorized("unauthorized")
            }
            RenewError::NotFound => ApiError::not_found("Session not found"),
            RenewError::Forbidden => ApiError::forbidden("Session is blocked"),
            RenewError::Database(e) => ApiError::db_error("Failed to get session", e),
            RenewError::Token(e) => {
                error!("Failed to create access token: {}", e);
                ApiError::internal("Failed to create token")
            }
        }
    }
}

/// Syntax, then existence, then ownership.
async fn load_owned_session(
    db: &Database,
    id: &str,
    auth: &AuthenticatedUser,
) -> Result<Session, ApiError> {
    validate_uuid(id)?;

    let session = db
        .sessions()
        .get_by_id(id)
        .await
        .db_err("Failed to get session")?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if !auth.owns(&session.username) {
        return Err(ApiError::not_owner());
    }

    Ok(session)
}

async fn renew_token(
    State(state): State<TokensState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let renewed = renew_access_token(
        state.authenticator.as_ref(),
        &state.db.sessions(),
        &payload.refresh_token,
        state.access_token_duration,
    )
    .await?;

    Ok(Json(RenewResponse {
        access_token: renewed.access_token,
        access_token_expires_at: renewed.access_token_expires_at,
    }))
}

/// Logout always succeeds. The session is only removed when the presented
/// token is the one stored for it.
async fn logout(
    State(state): State<TokensState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Ok(claims) = state.authenticator.verify_token(&payload.refresh_token) {
        let id = claims.id.to_string();
        match state.db.sessions().get_by_id(&id).await {
            Ok(Some(session)) if session.refresh_token == payload.refresh_token => {
                if let Err(e) = state.db.sessions().delete_by_id(&id).await {
                    tracing::warn!("Failed to delete session on logout: {}", e);
                } else {
                    info!(username = %session.username, session_id = %id, "User logged out");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to look up session on logout: {}", e),
        }
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn list_sessions(
    State(state): State<TokensState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state
        .db
        .sessions()
        .list_by_username(auth.username())
        .await
        .db_err("Failed to list sessions")?;

    Ok(Json(ListSessionsResponse {
        sessions: sessions.into_iter().map(SessionInfo::from).collect(),
    }))
}

async fn block_session(
    State(state): State<TokensState>,
    ApiAuth(auth): ApiAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_session(&state.db, &id, &auth).await?;

    state
        .db
        .sessions()
        .block(&id)
        .await
        .db_err("Failed to block session")?;

    info!(session_id = %id, "Session blocked");

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn revoke_session(
    State(state): State<TokensState>,
    ApiAuth(auth): ApiAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_session(&state.db, &id, &auth).await?;

    state
        .db
        .sessions()
        .delete_by_id(&id)
        .await
        .db_err("Failed to revoke session")?;

    Ok(Json(serde_json::json!({ "success": true })))
}
