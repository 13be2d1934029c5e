use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use super::{
    check_password_length, validate, AuthError, AuthService, IssuedToken, Operation,
    UnauthorizedReason, ValidationError,
};
use crate::store::Account;

impl AuthService {
    /// Check a mail/password pair and rotate the account's session token.
    ///
    /// Unknown mail and wrong password are both `Unauthorized`; the unknown
    /// mail path still runs one bcrypt verification so the two cannot be told
    /// apart by timing.
    ///
    /// # Errors
    /// - `Validation` for missing fields or forbidden characters
    /// - `Unauthorized` for an unknown mail or a wrong password
    /// - `Internal` for store, hashing or signing failures
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        mail: Option<&str>,
        password: Option<SecretString>,
    ) -> Result<IssuedToken, AuthError> {
        validate(&[
            ("mail", mail),
            ("password", password.as_ref().map(|p| p.expose_secret())),
        ])?;
        let (Some(mail), Some(password)) = (mail, password) else {
            return Err(ValidationError::MissingField(vec!["mail", "password"]).into());
        };
        check_password_length(password.expose_secret())?;

        let stored_hash = self
            .store
            .password_hash(mail)
            .await
            .map_err(|err| AuthError::internal(Operation::Login, err))?;

        let Some(stored_hash) = stored_hash else {
            self.hasher.verify_dummy(password).await;
            return Err(AuthError::Unauthorized(UnauthorizedReason::UnknownMail));
        };

        let valid = self
            .hasher
            .verify(password, stored_hash)
            .await
            .map_err(|err| AuthError::internal(Operation::Login, err))?;
        if !valid {
            return Err(AuthError::Unauthorized(UnauthorizedReason::InvalidPassword));
        }

        let token = self
            .issuer
            .issue(mail)
            .map_err(|err| AuthError::internal(Operation::Login, err))?;

        let updated = self
            .store
            .update_token(mail, &token)
            .await
            .map_err(|err| AuthError::internal(Operation::Login, err))?;
        if !updated {
            // Row disappeared between the lookup and the update.
            return Err(AuthError::Unauthorized(UnauthorizedReason::UnknownMail));
        }

        debug!("Session token rotated");

        Ok(IssuedToken(token))
    }

    /// Resolve a presented bearer token to its account.
    ///
    /// # Errors
    /// - `Unauthorized` when the token is absent, forged, expired or points
    ///   to a mail with no account
    /// - `Internal` when the store lookup fails
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Account, AuthError> {
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            return Err(AuthError::Unauthorized(UnauthorizedReason::MissingToken));
        };

        let claims = self.issuer.verify(token).map_err(|err| {
            debug!("Token rejected: {err}");
            AuthError::Unauthorized(UnauthorizedReason::InvalidToken)
        })?;

        self.store
            .find_by_mail(&claims.mail)
            .await
            .map_err(|err| AuthError::internal(Operation::Authenticate, err))?
            .ok_or(AuthError::Unauthorized(UnauthorizedReason::UnknownAccount))
    }
}
