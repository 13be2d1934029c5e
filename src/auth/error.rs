use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

use super::validate::ValidationError;

/// Why a credential check was refused. Never shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    UnknownMail,
    InvalidPassword,
    MissingToken,
    InvalidToken,
    UnknownAccount,
}

impl UnauthorizedReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownMail => "mail unknown",
            Self::InvalidPassword => "invalid password",
            Self::MissingToken => "missing token",
            Self::InvalidToken => "invalid token",
            Self::UnknownAccount => "token subject has no account",
        }
    }
}

/// Operation that hit an internal failure, used for the client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    Authenticate,
}

impl Operation {
    fn failure_message(self) -> &'static str {
        match self {
            Self::Register => "account creation failed",
            Self::Login => "login failed",
            Self::Authenticate => "authentication failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("mail already in use")]
    Conflict,
    #[error("unauthorized: {}", .0.as_str())]
    Unauthorized(UnauthorizedReason),
    #[error("{}", .operation.failure_message())]
    Internal {
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },
}

impl AuthError {
    pub(crate) fn internal(operation: Operation, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            operation,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(ValidationError::MissingField(_)) => StatusCode::CONFLICT,
            Self::Validation(
                ValidationError::InvalidCharacters(_) | ValidationError::TooLong(_),
            )
            | Self::Conflict
            | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            // Same wording for unknown mail and bad password.
            Self::Unauthorized(_) => "Invalid mail or password".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal { operation, source } => {
                error!("{}: {source:#}", operation.failure_message());
            }
            Self::Unauthorized(reason) => debug!("Unauthorized: {}", reason.as_str()),
            other => debug!("Request rejected: {other}"),
        }

        (self.status(), Json(json!({ "message": self.client_message() }))).into_response()
    }
}
