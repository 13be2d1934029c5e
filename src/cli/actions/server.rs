use crate::{
    api::{self, RateLimiter, SessionCookie},
    auth::{AuthService, PasswordHasher, TokenIssuer},
    cli::telemetry,
    store::{AccountStore, PgStore},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{debug, info};
use url::Url;

pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub db_max_connections: u32,
    pub token_secret: SecretString,
    pub token_ttl_seconds: u64,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window_seconds: u64,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &redact_dsn(self.dsn.expose_secret()))
            .field("db_max_connections", &self.db_max_connections)
            .field("token_secret", &"***")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("cookie_secure", &self.cookie_secure)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window_seconds", &self.rate_limit_window_seconds)
            .finish()
    }
}

/// DSN with the password masked, safe to log.
fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable dsn>".to_string(),
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the credential settings are
/// invalid, or the listener cannot be bound.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let ttl = Duration::from_secs(args.token_ttl_seconds);
    let issuer =
        TokenIssuer::new(&args.token_secret, ttl).context("Invalid --token-secret")?;
    let hasher = PasswordHasher::new(args.bcrypt_cost)?;

    info!(
        "Connecting to database {}",
        redact_dsn(args.dsn.expose_secret())
    );
    let store = PgStore::connect(args.dsn.expose_secret(), args.db_max_connections).await?;
    store
        .ensure_schema()
        .await
        .context("Failed to apply database schema")?;

    let store: Arc<dyn AccountStore> = Arc::new(store);
    let service = Arc::new(AuthService::new(store.clone(), hasher, issuer));
    let cookie = SessionCookie::new(ttl, args.cookie_secure);
    let limiter = Arc::new(RateLimiter::new(
        args.rate_limit_max,
        Duration::from_secs(args.rate_limit_window_seconds),
    ));

    let app = api::router(service, cookie, limiter);

    let listener = TcpListener::bind(format!("::0:{}", args.port))
        .await
        .with_context(|| format!("Failed to bind port {}", args.port))?;

    let result = api::serve(listener, app, api::shutdown_signal()).await;

    store.close().await;
    telemetry::shutdown_tracer();

    result
}
