//! Exchanging refresh tokens for new access tokens.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::db::SessionStore;
use crate::token::{Authenticator, TokenError};

/// A freshly minted access token.
#[derive(Debug, Clone)]
pub struct RenewedAccessToken {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

/// Why a refresh token could not be exchanged.
#[derive(Debug, Error)]
pub enum RenewError {
    /// The token or the session it points at does not check out
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),
    /// No session exists for the token's id
    #[error("session not found")]
    NotFound,
    /// The session has been blocked
    #[error("session is blocked")]
    Forbidden,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Minting the new access token failed
    #[error("failed to create access token: {0}")]
    Token(TokenError),
}

/// Validate `refresh_token` against its stored session and mint a new
/// access token for the session's user.
pub async fn renew_access_token(
    authenticator: &dyn Authenticator,
    sessions: &SessionStore,
    refresh_token: &str,
    access_token_duration: Duration,
) -> Result<RenewedAccessToken, RenewError> {
    let payload = authenticator.verify_token(refresh_token).map_err(|e| {
        tracing::debug!(error = %e, "Refresh token failed verification");
        RenewError::Unauthenticated("invalid refresh token")
    })?;

    let session = sessions
        .get_by_id(&payload.id.to_string())
        .await?
        .ok_or(RenewError::NotFound)?;

    if session.refresh_token != refresh_token {
        return Err(RenewError::Unauthenticated("mismatched session token"));
    }

    if session.is_blocked {
        return Err(RenewError::Forbidden);
    }

    if session.username != payload.username {
        return Err(RenewError::Unauthenticated("incorrect session user"));
    }

    if session.is_expired_at(Utc::now()) {
        return Err(RenewError::Unauthenticated("expired session"));
    }

    let (access_token, access_payload) = authenticator
        .create_token(&session.username, access_token_duration)
        .map_err(RenewError::Token)?;

    Ok(RenewedAccessToken {
        access_token,
        access_token_expires_at: access_payload.expired_at,
    })
}
