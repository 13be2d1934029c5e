//! Bearer-token verification for requests made after login.
//!
//! `CurrentAccount` is an extractor: any handler that takes it only runs once
//! the presented token's signature and expiry check out and its mail still
//! maps to an account.

use anyhow::anyhow;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{extract_session_token, MessageResponse};
use crate::{
    auth::{AuthError, AuthService, Operation},
    store::Account,
};

#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or_else(|| {
                AuthError::internal(Operation::Authenticate, anyhow!("auth service not wired"))
            })?;

        let token = extract_session_token(&parts.headers);
        service.authenticate(token.as_deref()).await.map(Self)
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AccountResponse {
    pub username: String,
    pub mail: String,
}

#[utoipa::path(
    get,
    path= "/me",
    responses (
        (status = 200, description = "Token is valid", body = AccountResponse, content_type = "application/json"),
        (status = 401, description = "Missing, invalid or expired token", body = MessageResponse),
    ),
    security(
        ("userToken" = [])
    ),
    tag= "session"
)]
pub async fn me(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(AccountResponse {
            username: account.username,
            mail: account.mail,
        }),
    )
}
