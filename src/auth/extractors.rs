//! Bearer authentication middleware and extractors.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthenticator;
use super::types::AuthenticatedUser;
use crate::token::Authenticator;

const BEARER: &str = "bearer";

/// Verify the `Authorization` header and return the identity it carries.
pub fn authenticate_headers(
    headers: &HeaderMap,
    authenticator: &dyn Authenticator,
) -> Result<AuthenticatedUser, AuthErrorKind> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthErrorKind::MissingHeader)?;

    let mut fields = header.split_whitespace();
    let (Some(scheme), Some(token)) = (fields.next(), fields.next()) else {
        return Err(AuthErrorKind::MalformedHeader);
    };

    if !scheme.eq_ignore_ascii_case(BEARER) {
        return Err(AuthErrorKind::UnsupportedScheme(scheme.to_string()));
    }

    let payload = authenticator.verify_token(token)?;
    Ok(AuthenticatedUser { payload })
}

/// Middleware for routes that require a valid access token.
/// On success the [`AuthenticatedUser`] is added to the request extensions.
pub async fn require_auth<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiAuthError>
where
    S: HasAuthenticator + Clone + Send + Sync + 'static,
{
    let user = authenticate_headers(request.headers(), state.authenticator())?;
    tracing::debug!(username = %user.username(), "Authenticated request");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extractor for the identity placed on the request by [`require_auth`].
/// A missing identity is rejected with 401.
pub struct ApiAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for ApiAuth
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(ApiAuth)
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::MissingIdentity))
    }
}

/// Optional authentication extractor - never fails.
/// Useful for public endpoints that show more to an authenticated caller.
pub struct MaybeAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: HasAuthenticator + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(MaybeAuth(Some(user.clone())));
        }
        Ok(MaybeAuth(
            authenticate_headers(&parts.headers, state.authenticator()).ok(),
        ))
    }
}
