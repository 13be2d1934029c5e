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
pub struct UserLogin {
    mail: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLogin")
            .field("mail", &self.mail)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/login",
    request_body(
        content(
            (UserLogin = "application/json"),
            (UserLogin = "application/x-www-form-urlencoded")
        )
    ),
    responses (
        (status = 200, description = "Login successful, session cookie rotated", body = MessageResponse, content_type = "application/json"),
        (status = 400, description = "Missing or malformed JSON or form payload", body = MessageResponse),
        (status = 401, description = "Forbidden characters, unknown mail or wrong password", body = MessageResponse),
        (status = 409, description = "A required field is missing", body = MessageResponse),
        (status = 500, description = "Login failed", body = MessageResponse),
    ),
    tag= "login"
)]
#[instrument(skip_all)]
pub async fn login(
    service: Extension<Arc<AuthService>>,
    cookie: Extension<SessionCookie>,
    Payload(user): Payload<UserLogin>,
) -> Response {

    let password = user.password.map(SecretString::from);
    match service.login(user.mail.as_deref(), password).await {
        Ok(token) => session_response(&cookie, &token, Operation::Login, "Login successful"),
        Err(err) => err.into_response(),
    }
}
