pub mod health;
pub use self::health::health;

pub mod register;
pub use self::register::register;

pub mod login;
pub use self::login::login;

pub mod me;
pub use self::me::me;

// common functions for the handlers
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use utoipa::ToSchema;

use crate::auth::{AuthError, IssuedToken, Operation};

pub const SESSION_COOKIE_NAME: &str = "userToken";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Attributes of the `userToken` cookie.
#[derive(Clone, Copy, Debug)]
pub struct SessionCookie {
    pub max_age: Duration,
    pub secure: bool,
}

impl SessionCookie {
    #[must_use]
    pub fn new(max_age: Duration, secure: bool) -> Self {
        Self { max_age, secure }
    }

    /// `HttpOnly` cookie carrying the token; `Secure` only when configured.
    ///
    /// # Errors
    /// Returns an error if the token contains bytes not allowed in a header.
    pub fn header(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let max_age = self.max_age.as_secs();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// 200 with the session cookie set and only a message in the body.
pub(crate) fn session_response(
    cookie: &SessionCookie,
    token: &IssuedToken,
    operation: Operation,
    message: &str,
) -> Response {
    match cookie.header(token.as_str()) {
        Ok(value) => {
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, value);
            (StatusCode::OK, headers, Json(MessageResponse::new(message))).into_response()
        }
        Err(err) => AuthError::internal(operation, err).into_response(),
    }
}

pub(crate) fn missing_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(MessageResponse::new("Missing payload")),
    )
        .into_response()
}

/// Request body accepted either as JSON or as an HTML form post.
///
/// Anything that fails to parse, or carries another content type, is rejected
/// with `400 Missing payload`.
#[derive(Debug)]
pub struct Payload<T>(pub T);

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(req.headers()) {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| Self(value))
                .map_err(|err| {
                    debug!("Rejected form payload: {err}");
                    missing_payload()
                })
        } else {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| Self(value))
                .map_err(|err| {
                    debug!("Rejected JSON payload: {err}");
                    missing_payload()
                })
        }
    }
}

/// Token from `Authorization: Bearer` or, failing that, the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME).then(|| val.trim().to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_http_only_and_not_secure_by_default() {
        let cookie = SessionCookie::new(Duration::from_secs(43_200), false);
        let value = cookie.header("abc.def.ghi").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "userToken=abc.def.ghi; Path=/; HttpOnly; SameSite=Lax; Max-Age=43200"
        );
    }

    #[test]
    fn cookie_secure_flag() {
        let cookie = SessionCookie::new(Duration::from_secs(60), true);
        let value = cookie.header("t").unwrap();
        assert!(value.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn extracts_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; userToken=abc.def; other=1"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("userToken=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn form_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
        );
        assert!(is_form(&headers));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_form(&headers));
    }

    #[test]
    fn no_token_present() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(extract_session_token(&headers), None);
    }
}
