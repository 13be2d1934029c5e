//! Registration and login state machine.
//!
//! An account moves `Unregistered → Registered → session issued`, and every
//! successful login rotates the stored session token. Both flows share the
//! same shape: validate the payload, talk to the store, hash or verify the
//! password off the async threads, then mint a signed token.
//!
//! Store and hashing failures are collapsed into a generic `Internal` error at
//! the call site; the cause is only ever logged.

mod authenticator;
mod error;
pub mod password;
mod registrar;
pub mod token;
pub mod validate;

use std::sync::Arc;

use crate::store::AccountStore;

pub use error::{AuthError, Operation, UnauthorizedReason};
pub use password::PasswordHasher;
pub use token::{Claims, TokenError, TokenIssuer};
pub use validate::{check_password_length, validate, ValidationError};

/// Token handed back to the HTTP layer after a successful register/login.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken(String);

impl IssuedToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IssuedToken(***)")
    }
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
    issuer: Arc<TokenIssuer>,
}

impl AuthService {
    #[must_use]
    pub fn new(store: Arc<dyn AccountStore>, hasher: PasswordHasher, issuer: TokenIssuer) -> Self {
        Self {
            store,
            hasher,
            issuer: Arc::new(issuer),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("hasher", &self.hasher)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
