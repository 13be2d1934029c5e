//! # Accountd (Account Registration & Credential Login)
//!
//! `accountd` registers accounts and authenticates them with a mail address and
//! password, handing out a signed session token on success.
//!
//! ## Credentials
//!
//! - **Passwords:** stored only as salted bcrypt hashes. Hashing and verification
//!   run on the blocking pool so the async workers never stall on the work factor.
//! - **Tokens:** HS256 JWTs carrying the account mail, issued-at, expiry and a
//!   unique id. A fresh token is issued on every register and login and persisted
//!   as the account's current session token.
//! - **Cookie:** the token travels back in the `HttpOnly` `userToken` cookie; the
//!   response body only carries a status message.
//!
//! ## Input Validation
//!
//! Every credential field must be present and free of `' " ; < >`. Failures are
//! aggregated so one response names every offending field.
//!
//! ## Errors
//!
//! Missing fields answer `409`, forbidden characters, duplicates and bad
//! credentials answer `401`, and store or hashing failures answer `500` with a
//! per-operation message. Login failures never reveal whether the mail exists.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }
}
