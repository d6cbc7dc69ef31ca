use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TokenError;

/// Claims carried inside every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Unique token identifier, also used as the session id for refresh tokens
    pub id: Uuid,
    /// Principal the token was issued to
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl TokenPayload {
    /// Build a payload for `username` that expires `duration` from now.
    /// Negative durations yield a payload that is already expired; an expiry
    /// outside the representable range is rejected.
    pub fn new(username: &str, duration: Duration) -> Result<Self, TokenError> {
        let now = Utc::now();
        let expired_at = now
            .checked_add_signed(duration)
            .ok_or(TokenError::InvalidDuration)?;
        Ok(Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            issued_at: now,
            expired_at,
        })
    }

    /// Check the expiry against the given instant.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if now > self.expired_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }

    /// Check the expiry against the current time.
    pub fn validate(&self) -> Result<(), TokenError> {
        self.validate_at(Utc::now())
    }
}
