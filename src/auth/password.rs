//! Salted password hashing with bcrypt.
//!
//! bcrypt is CPU bound on purpose, so both hashing and verification are moved
//! to the blocking pool. The current span is carried over so the work still
//! shows up under the request that triggered it.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tracing::Span;

pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// Run a blocking closure on the blocking pool inside the caller's span.
pub fn spawn_blocking_with_tracing<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let current_span = Span::current();
    tokio::task::spawn_blocking(move || current_span.in_scope(f))
}

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    // Verified against when the mail is unknown so both rejection paths pay
    // the same bcrypt price.
    dummy_hash: String,
}

impl PasswordHasher {
    /// Build a hasher for the given bcrypt cost.
    ///
    /// # Errors
    /// Returns an error if the cost is outside `4..=31`.
    pub fn new(cost: u32) -> Result<Self> {
        let dummy_hash =
            bcrypt::hash("accountd-dummy-password", cost).context("invalid bcrypt cost")?;
        Ok(Self { cost, dummy_hash })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Derive a salted hash; a fresh random salt is drawn on every call.
    ///
    /// # Errors
    /// Returns an error if the blocking task fails or bcrypt rejects the input.
    #[tracing::instrument(name = "Hash password", skip_all)]
    pub async fn hash(&self, password: SecretString) -> Result<String> {
        let cost = self.cost;
        spawn_blocking_with_tracing(move || bcrypt::hash(password.expose_secret(), cost))
            .await
            .context("failed to spawn blocking task")?
            .context("failed to hash password")
    }

    /// Check `candidate` against a stored hash.
    ///
    /// `Ok(false)` means the password does not match; errors are reserved for
    /// malformed hashes and runtime failures.
    ///
    /// # Errors
    /// Returns an error if the stored hash cannot be parsed or the task fails.
    #[tracing::instrument(name = "Verify password", skip_all)]
    pub async fn verify(&self, candidate: SecretString, expected_hash: String) -> Result<bool> {
        spawn_blocking_with_tracing(move || {
            bcrypt::verify(candidate.expose_secret(), &expected_hash)
        })
        .await
        .context("failed to spawn blocking task")?
        .context("failed to verify password hash")
    }

    /// Burn one verification against a throwaway hash.
    pub async fn verify_dummy(&self, candidate: SecretString) {
        let _ = self.verify(candidate, self.dummy_hash.clone()).await;
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}
