//! Authentication state trait and macro.

use std::sync::Arc;

use crate::token::Authenticator;

/// Trait for state types that can verify bearer tokens.
pub trait HasAuthenticator {
    fn authenticator(&self) -> &dyn Authenticator;
}

impl HasAuthenticator for Arc<dyn Authenticator> {
    fn authenticator(&self) -> &dyn Authenticator {
        self.as_ref()
    }
}

/// Macro to implement `HasAuthenticator` for state structs with an
/// `authenticator: Arc<dyn Authenticator>` field.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub authenticator: Arc<dyn Authenticator>,
/// }
///
/// impl_has_authenticator!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_authenticator {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthenticator for $state_type {
            fn authenticator(&self) -> &dyn $crate::token::Authenticator {
                self.authenticator.as_ref()
            }
        }
    };
}
