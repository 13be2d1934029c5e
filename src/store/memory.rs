//! In-process account store with the same uniqueness rules as the Postgres
//! schema. Used by the test suites and for running the service without a
//! database.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Account, AccountStore, NewAccount, StoreError};

#[derive(Debug)]
struct Row {
    account: Account,
    password_hash: String,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Row>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn identity_taken(&self, mail: &str, username: &str) -> Result<bool, StoreError> {
        Ok(self
            .rows()
            .iter()
            .any(|row| row.account.mail == mail || row.account.username == username))
    }

    async fn insert(&self, account: NewAccount<'_>) -> Result<i64, StoreError> {
        // Check and insert under one lock, mirroring the table constraints.
        let mut rows = self.rows();
        if rows
            .iter()
            .any(|row| row.account.mail == account.mail || row.account.username == account.username)
        {
            return Err(StoreError::Conflict);
        }

        let id = i64::try_from(rows.len()).unwrap_or(i64::MAX - 1) + 1;
        rows.push(Row {
            account: Account {
                id,
                username: account.username.to_string(),
                mail: account.mail.to_string(),
                session_token: Some(account.session_token.to_string()),
            },
            password_hash: account.password_hash.to_string(),
        });
        Ok(id)
    }

    async fn password_hash(&self, mail: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .rows()
            .iter()
            .find(|row| row.account.mail == mail)
            .map(|row| row.password_hash.clone()))
    }

    async fn update_token(&self, mail: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .rows()
            .iter_mut()
            .find(|row| row.account.mail == mail)
            .map(|row| row.account.session_token = Some(token.to_string()))
            .is_some())
    }

    async fn find_by_mail(&self, mail: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .rows()
            .iter()
            .find(|row| row.account.mail == mail)
            .map(|row| row.account.clone()))
    }

    async fn close(&self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_account<'a>(username: &'a str, mail: &'a str) -> NewAccount<'a> {
        NewAccount {
            username,
            mail,
            password_hash: "$2b$04$hash",
            session_token: "token-1",
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        assert_eq!(store.insert(new_account("alice", "a@x.com")).await.unwrap(), 1);
        assert_eq!(store.insert(new_account("bob", "b@x.com")).await.unwrap(), 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn insert_enforces_unique_mail_and_username() {
        let store = MemoryStore::new();
        store.insert(new_account("alice", "a@x.com")).await.unwrap();

        let same_mail = store.insert(new_account("bob", "a@x.com")).await;
        assert!(matches!(same_mail, Err(StoreError::Conflict)));

        let same_username = store.insert(new_account("alice", "b@x.com")).await;
        assert!(matches!(same_username, Err(StoreError::Conflict)));

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn identity_taken_matches_either_field() {
        let store = MemoryStore::new();
        store.insert(new_account("alice", "a@x.com")).await.unwrap();
        assert!(store.identity_taken("a@x.com", "zed").await.unwrap());
        assert!(store.identity_taken("z@x.com", "alice").await.unwrap());
        assert!(!store.identity_taken("z@x.com", "zed").await.unwrap());
    }

    #[tokio::test]
    async fn update_token_overwrites_previous_value() {
        let store = MemoryStore::new();
        store.insert(new_account("alice", "a@x.com")).await.unwrap();

        assert!(store.update_token("a@x.com", "token-2").await.unwrap());
        assert!(!store.update_token("nobody@x.com", "token-3").await.unwrap());

        let account = store.find_by_mail("a@x.com").await.unwrap().unwrap();
        assert_eq!(account.session_token.as_deref(), Some("token-2"));
    }

    #[tokio::test]
    async fn password_hash_lookup() {
        let store = MemoryStore::new();
        store.insert(new_account("alice", "a@x.com")).await.unwrap();
        assert_eq!(
            store.password_hash("a@x.com").await.unwrap().as_deref(),
            Some("$2b$04$hash")
        );
        assert_eq!(store.password_hash("b@x.com").await.unwrap(), None);
    }
}
