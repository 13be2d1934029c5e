//! Postgres-backed account store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Connection, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument};

use super::{Account, AccountStore, NewAccount, StoreError};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the first connection cannot be established.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `accounts` table and its unique constraints if missing.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl AccountStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }

    async fn identity_taken(&self, mail: &str, username: &str) -> Result<bool, StoreError> {
        const QUERY: &str =
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE mail = $1 OR username = $2) AS taken";
        let row = sqlx::query(QUERY)
            .bind(mail)
            .bind(username)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await?;
        Ok(row.try_get("taken")?)
    }

    async fn insert(&self, account: NewAccount<'_>) -> Result<i64, StoreError> {
        const QUERY: &str = r"
            INSERT INTO accounts
                (username, mail, password_hash, session_token)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let row = sqlx::query(QUERY)
            .bind(account.username)
            .bind(account.mail)
            .bind(account.password_hash)
            .bind(account.session_token)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", QUERY))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict
                } else {
                    StoreError::Database(err)
                }
            })?;
        Ok(row.try_get("id")?)
    }

    async fn password_hash(&self, mail: &str) -> Result<Option<String>, StoreError> {
        const QUERY: &str = "SELECT password_hash FROM accounts WHERE mail = $1";
        let row = sqlx::query(QUERY)
            .bind(mail)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await?;
        row.map(|row| row.try_get("password_hash"))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn update_token(&self, mail: &str, token: &str) -> Result<bool, StoreError> {
        const QUERY: &str = "UPDATE accounts SET session_token = $1 WHERE mail = $2";
        let result = sqlx::query(QUERY)
            .bind(token)
            .bind(mail)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", QUERY))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_mail(&self, mail: &str) -> Result<Option<Account>, StoreError> {
        const QUERY: &str =
            "SELECT id, username, mail, session_token FROM accounts WHERE mail = $1";
        let row = sqlx::query(QUERY)
            .bind(mail)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", QUERY))
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Account {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            mail: row.try_get("mail")?,
            session_token: row.try_get("session_token")?,
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
