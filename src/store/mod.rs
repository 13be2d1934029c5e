//! Account persistence.
//!
//! Handlers only ever see `Arc<dyn AccountStore>`; the Postgres pool is built
//! once at startup and injected, and tests swap in the in-memory store.

use async_trait::async_trait;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint on `mail` or `username` rejected the write.
    #[error("mail or username already registered")]
    Conflict,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persisted account, minus the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub mail: String,
    pub session_token: Option<String>,
}

/// Row to insert on registration.
#[derive(Clone, Copy)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub mail: &'a str,
    pub password_hash: &'a str,
    pub session_token: &'a str,
}

impl std::fmt::Debug for NewAccount<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("mail", &self.mail)
            .field("password_hash", &"***")
            .field("session_token", &"***")
            .finish()
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Round trip to the backend.
    async fn ping(&self) -> Result<(), StoreError>;

    /// True when any account already uses `mail` or `username`.
    async fn identity_taken(&self, mail: &str, username: &str) -> Result<bool, StoreError>;

    /// Insert a new account and return its id.
    ///
    /// Returns `StoreError::Conflict` when a uniqueness constraint fires.
    async fn insert(&self, account: NewAccount<'_>) -> Result<i64, StoreError>;

    /// Stored password hash for `mail`, if the account exists.
    async fn password_hash(&self, mail: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the session token of `mail`. Returns false if no row matched.
    async fn update_token(&self, mail: &str, token: &str) -> Result<bool, StoreError>;

    async fn find_by_mail(&self, mail: &str) -> Result<Option<Account>, StoreError>;

    /// Release backend resources during shutdown.
    async fn close(&self);
}
