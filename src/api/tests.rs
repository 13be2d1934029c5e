#![allow(clippy::unwrap_used)]

use super::*;
use crate::{
    auth::{password::MIN_COST, token::DEFAULT_TOKEN_TTL, PasswordHasher, TokenIssuer},
    store::MemoryStore,
};
use axum::{
    body::to_bytes,
    http::{header::SET_COOKIE, StatusCode},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "0123456789abcdef0123456789abcdef";

fn app_with_limit(max_requests: u32) -> Router {
    let issuer =
        TokenIssuer::new(&SecretString::from(SECRET.to_string()), DEFAULT_TOKEN_TTL).unwrap();
    let service = Arc::new(AuthService::new(
        Arc::new(MemoryStore::new()),
        PasswordHasher::new(MIN_COST).unwrap(),
        issuer,
    ));
    router(
        service,
        SessionCookie::new(DEFAULT_TOKEN_TTL, false),
        Arc::new(RateLimiter::new(max_requests, Duration::from_secs(60))),
    )
}

fn app() -> Router {
    app_with_limit(100)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn cookie_pair(response: &axum::response::Response) -> String {
    let value = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    value.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn root_answers() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_sets_cookie_and_me_accepts_it() {
    let app = app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/register",
            &json!({"mail": "alice@example.com", "username": "alice", "password": "pw1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&response);
    assert!(cookie.starts_with("userToken="));
    let body = json_body(response).await;
    assert_eq!(body, json!({"message": "Account created"}));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/me")
                .header("cookie", cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, json!({"username": "alice", "mail": "alice@example.com"}));
}

fn post_form(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn html_form_can_register_and_login() {
    let app = app();
    let response = app
        .clone()
        .oneshot(post_form(
            "/register",
            "mail=carol%40example.com&username=carol&password=pw%201",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_pair(&response).starts_with("userToken="));
    assert_eq!(
        json_body(response).await,
        json!({"message": "Account created"})
    );

    let response = app
        .clone()
        .oneshot(post_form(
            "/login",
            "mail=carol%40example.com&password=pw%201",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Login successful"})
    );

    // Form posts go through the same field validation.
    let response = app
        .oneshot(post_form("/login", "mail=carol%40example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        json_body(response).await,
        json!({"message": "The password field is missing."})
    );
}

#[tokio::test]
async fn missing_payload_is_bad_request() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/login")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"message": "Missing payload"}));
}

#[tokio::test]
async fn missing_field_is_conflict_status() {
    let response = app()
        .oneshot(post_json("/login", &json!({"mail": "alice@example.com"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        json_body(response).await,
        json!({"message": "The password field is missing."})
    );
}

#[tokio::test]
async fn me_without_token_is_unauthorized() {
    let response = app()
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_id_is_generated_and_propagated() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers().get("x-request-id").unwrap();
    assert!(Ulid::from_string(generated.to_str().unwrap()).is_ok());

    let response = app()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", "caller-chosen")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "caller-chosen"
    );
}

#[tokio::test]
async fn health_reports_store_and_app_header() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-App"));
    let body = json_body(response).await;
    assert_eq!(body["database"], "ok");
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));

    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn rate_limit_applies_across_routes() {
    let app = app_with_limit(2);
    for uri in ["/", "/health"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header("x-forwarded-for", "198.51.100.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/me")
                .header("x-forwarded-for", "198.51.100.7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        json_body(response).await,
        json!({"message": rate_limit::LIMITED_MESSAGE})
    );

    // A different address still gets through.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-forwarded-for", "198.51.100.8")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn openapi_lists_every_route() {
    let doc = openapi();
    for path in ["/register", "/login", "/me", "/health"] {
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }
    let components = doc.components.unwrap();
    assert!(components
        .security_schemes
        .contains_key(handlers::SESSION_COOKIE_NAME));
}
