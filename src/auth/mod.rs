//! Bearer token authentication.
//!
//! Protected routes sit behind [`require_auth`], which verifies the
//! `Authorization: bearer <token>` header and stores the resulting
//! [`AuthenticatedUser`] in the request extensions. Handlers read it back
//! with the [`ApiAuth`] extractor. Refresh tokens are exchanged for new
//! access tokens through [`renew_access_token`].

mod errors;
mod extractors;
mod ip;
mod refresh;
mod state;
mod types;

pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{ApiAuth, MaybeAuth, authenticate_headers, require_auth};
pub use ip::{HasHeadersAndExtensions, IpExtractor, extract_client_ip};
pub use refresh::{RenewError, RenewedAccessToken, renew_access_token};
pub use state::HasAuthenticator;
pub use types::AuthenticatedUser;
