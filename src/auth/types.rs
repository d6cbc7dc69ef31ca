//! Authentication user types.

use crate::token::TokenPayload;

/// Identity attached to a request once its bearer token has been verified.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Decoded access token payload
    pub payload: TokenPayload,
}

impl AuthenticatedUser {
    /// The authenticated principal.
    pub fn username(&self) -> &str {
        &self.payload.username
    }

    /// Whether this user owns a resource belonging to `owner`.
    pub fn owns(&self, owner: &str) -> bool {
        self.payload.username == owner
    }
}
