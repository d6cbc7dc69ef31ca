//! Encrypted bearer tokens.
//!
//! Tokens are PASETO `v2.local` style: the JSON payload is sealed with
//! XChaCha20-Poly1305 under a 32-byte symmetric key, so clients can carry
//! them but never read or alter the claims. Access and refresh tokens share
//! the same format and differ only in their lifetime.

mod authenticator;
mod codec;
mod error;
mod payload;

pub use authenticator::{Authenticator, PasetoAuthenticator};
pub use codec::{KEY_SIZE, TokenCodec};
pub use error::TokenError;
pub use payload::TokenPayload;
