//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::token::TokenError;

/// Why a request failed authentication. Only ever logged, never returned to
/// the client.
#[derive(Debug, Error)]
pub enum AuthErrorKind {
    #[error("authorization header is not provided")]
    MissingHeader,
    #[error("invalid authorization header format")]
    MalformedHeader,
    #[error("unsupported authorization type {0}")]
    UnsupportedScheme(String),
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("no authenticated user on request")]
    MissingIdentity,
}

/// API authentication error. Always rendered as a generic 401.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    /// The underlying reason, for logging and tests.
    pub fn kind(&self) -> &AuthErrorKind {
        &self.kind
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        tracing::warn!(reason = %self.kind, "Rejected unauthenticated request");

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized",
            }),
        )
            .into_response()
    }
}
