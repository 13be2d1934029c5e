//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, limits, ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let db_max_connections = matches
        .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);

    let auth_opts = auth::Options::parse(matches)?;
    let limit_opts = limits::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        db_max_connections,
        token_secret: auth_opts.token_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        bcrypt_cost: auth_opts.bcrypt_cost,
        cookie_secure: auth_opts.cookie_secure,
        rate_limit_max: limit_opts.max_requests,
        rate_limit_window_seconds: limit_opts.window_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn maps_arguments_to_server_args() {
        temp_env::with_vars(
            [
                ("ACCOUNTD_DSN", Some("postgres://app:pw@db:5432/accounts")),
                (
                    "ACCOUNTD_TOKEN_SECRET",
                    Some("0123456789abcdef0123456789abcdef"),
                ),
                ("ACCOUNTD_PORT", Some("3000")),
                ("ACCOUNTD_BCRYPT_COST", Some("4")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["accountd"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 3000);
                    assert_eq!(args.bcrypt_cost, 4);
                    assert_eq!(
                        args.dsn.expose_secret(),
                        "postgres://app:pw@db:5432/accounts"
                    );
                    assert_eq!(args.rate_limit_max, 500);
                    // Secrets never show up in debug output.
                    let debug = format!("{args:?}");
                    assert!(!debug.contains("0123456789abcdef"));
                    assert!(!debug.contains(":pw@"));
                }
            },
        );
    }

    #[test]
    fn blank_token_secret_is_rejected() {
        temp_env::with_vars(
            [
                ("ACCOUNTD_DSN", Some("postgres://localhost/accounts")),
                ("ACCOUNTD_TOKEN_SECRET", Some("   ")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["accountd"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --token-secret"));
                }
            },
        );
    }
}
