//! Token error types.

use thiserror::Error;

/// Errors that can occur while sealing or opening tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The symmetric key does not have the required length
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },
    /// The token string or its payload could not be parsed
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    /// The ciphertext failed its integrity check (tampered or wrong key)
    #[error("token decryption failed")]
    DecryptionFailed,
    /// The token decrypted fine but its expiry is in the past
    #[error("token has expired")]
    ExpiredToken,
    /// The requested lifetime puts the expiry out of range
    #[error("token duration is out of range")]
    InvalidDuration,
    /// The payload could not be serialized or encrypted
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Whether the failure is purely time based, as opposed to a bad or
    /// tampered token.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::ExpiredToken)
    }
}
