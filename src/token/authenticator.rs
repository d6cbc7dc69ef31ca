//! Token issuing and verification.

use chrono::Duration;

use super::{TokenCodec, TokenError, TokenPayload};

/// Issues and verifies tokens for a principal.
///
/// Kept as a trait so the HTTP layer works against any token scheme; the
/// server uses [`PasetoAuthenticator`].
pub trait Authenticator: Send + Sync {
    /// Issue a token for `username` valid for `duration`. Returns the token
    /// together with its payload so callers can read the expiry without
    /// decoding again.
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, TokenPayload), TokenError>;

    /// Decode a token and check that it has not expired.
    fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError>;
}

/// [`Authenticator`] backed by `v2.local` tokens.
#[derive(Clone)]
pub struct PasetoAuthenticator {
    codec: TokenCodec,
}

impl PasetoAuthenticator {
    /// Create an authenticator from a 32-byte symmetric key.
    pub fn new(symmetric_key: &[u8]) -> Result<Self, TokenError> {
        Ok(Self {
            codec: TokenCodec::new(symmetric_key)?,
        })
    }
}

impl Authenticator for PasetoAuthenticator {
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, TokenPayload), TokenError> {
        let payload = TokenPayload::new(username, duration)?;
        let token = self.codec.encode(&payload)?;
        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let payload = self.codec.decode(token)?;
        payload.validate()?;
        Ok(payload)
    }
}
