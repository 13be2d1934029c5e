use axum::{
    extract::Extension,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{session_response, MessageResponse, Payload, SessionCookie};
use crate::auth::{AuthService, Operation};

#[derive(ToSchema, Serialize, Deserialize)]
pub struct UserRegister {
    mail: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegister")
            .field("mail", &self.mail)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/register",
    request_body(
        content(
            (UserRegister = "application/json"),
            (UserRegister = "application/x-www-form-urlencoded")
        )
    ),
    responses (
        (status = 200, description = "Account created, session cookie set", body = MessageResponse, content_type = "application/json"),
        (status = 400, description = "Missing or malformed JSON or form payload", body = MessageResponse),
        (status = 401, description = "Forbidden characters or mail/username already in use", body = MessageResponse),
        (status = 409, description = "A required field is missing", body = MessageResponse),
        (status = 500, description = "Account creation failed", body = MessageResponse),
    ),
    tag= "register"
)]
#[instrument(skip_all)]
pub async fn register(
    service: Extension<Arc<AuthService>>,
    cookie: Extension<SessionCookie>,
    Payload(user): Payload<UserRegister>,
) -> Response {

    let password = user.password.map(SecretString::from);
    match service
        .register(user.mail.as_deref(), user.username.as_deref(), password)
        .await
    {
        Ok(token) => session_response(&cookie, &token, Operation::Register, "Account created"),
        Err(err) => err.into_response(),
    }
}
