use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};

use super::{
    check_password_length, validate, AuthError, AuthService, IssuedToken, Operation,
    ValidationError,
};
use crate::store::{NewAccount, StoreError};

impl AuthService {
    /// Create an account and issue its first session token.
    ///
    /// # Errors
    /// - `Validation` for missing fields or forbidden characters
    /// - `Conflict` when the mail or username is already registered
    /// - `Internal` for store, hashing or signing failures
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        mail: Option<&str>,
        username: Option<&str>,
        password: Option<SecretString>,
    ) -> Result<IssuedToken, AuthError> {
        validate(&[
            ("mail", mail),
            ("username", username),
            ("password", password.as_ref().map(|p| p.expose_secret())),
        ])?;
        let (Some(mail), Some(username), Some(password)) = (mail, username, password) else {
            return Err(ValidationError::MissingField(vec!["mail", "username", "password"]).into());
        };
        check_password_length(password.expose_secret())?;

        // Fast path; the unique constraints below settle races.
        let taken = self
            .store
            .identity_taken(mail, username)
            .await
            .map_err(|err| AuthError::internal(Operation::Register, err))?;
        if taken {
            debug!("Mail or username already registered");
            return Err(AuthError::Conflict);
        }

        let password_hash = self
            .hasher
            .hash(password)
            .await
            .map_err(|err| AuthError::internal(Operation::Register, err))?;

        let token = self
            .issuer
            .issue(mail)
            .map_err(|err| AuthError::internal(Operation::Register, err))?;

        let id = self
            .store
            .insert(NewAccount {
                username,
                mail,
                password_hash: &password_hash,
                session_token: &token,
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict => AuthError::Conflict,
                err => AuthError::internal(Operation::Register, err),
            })?;

        info!(account_id = id, "Account created");

        Ok(IssuedToken(token))
    }
}
