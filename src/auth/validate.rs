//! Boundary checks for account payloads.
//!
//! Values are rejected when a required field is empty or when they carry any
//! of `' " ; < >`. Every offending field is reported, not just the first one,
//! so a client can fix the whole payload in one round trip.
//!
//! Passwords are also capped at `MAX_PASSWORD_BYTES`: bcrypt only reads the
//! first 72 bytes, so anything longer would verify against other plaintexts
//! sharing that prefix.

use regex::Regex;
use std::sync::OnceLock;

const FORBIDDEN_CHARS: &str = r#"['";<>]"#;

/// Longest password bcrypt hashes without truncation.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{}", missing_message(.0))]
    MissingField(Vec<&'static str>),
    #[error("{}", forbidden_message(.0))]
    InvalidCharacters(Vec<&'static str>),
    #[error("{}", too_long_message(.0))]
    TooLong(Vec<&'static str>),
}

impl ValidationError {
    /// Names of the fields that failed.
    #[must_use]
    pub fn fields(&self) -> &[&'static str] {
        match self {
            Self::MissingField(fields)
            | Self::InvalidCharacters(fields)
            | Self::TooLong(fields) => fields,
        }
    }
}

fn missing_message(fields: &[&'static str]) -> String {
    fields
        .iter()
        .map(|field| format!("The {field} field is missing."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn forbidden_message(fields: &[&'static str]) -> String {
    fields
        .iter()
        .map(|field| format!("The {field} field contains forbidden characters."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn too_long_message(fields: &[&'static str]) -> String {
    fields
        .iter()
        .map(|field| format!("The {field} field is longer than {MAX_PASSWORD_BYTES} bytes."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn forbidden() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FORBIDDEN_CHARS).ok()).as_ref()
}

/// Returns true when `input` carries a quoting or markup character.
#[must_use]
pub fn contains_invalid_chars(input: &str) -> bool {
    // Fail closed if the pattern could not be compiled.
    forbidden().map_or(true, |re| re.is_match(input))
}

/// Validate `(name, value)` pairs.
///
/// Missing fields take precedence: a payload with an empty field is reported
/// as incomplete before any character check runs.
///
/// # Errors
/// Returns `MissingField` or `InvalidCharacters` listing every offending field.
pub fn validate(fields: &[(&'static str, Option<&str>)]) -> Result<(), ValidationError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.map_or(true, str::is_empty))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingField(missing));
    }

    let invalid: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.is_some_and(contains_invalid_chars))
        .map(|(name, _)| *name)
        .collect();
    if !invalid.is_empty() {
        return Err(ValidationError::InvalidCharacters(invalid));
    }

    Ok(())
}

/// Reject passwords bcrypt would silently truncate.
///
/// # Errors
/// Returns `TooLong` naming the password field.
pub fn check_password_length(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong(vec!["password"]));
    }
    Ok(())
}
