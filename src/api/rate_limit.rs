//! Per-address request limiting for every route.
//!
//! Fixed windows: the first request from an address opens a window, and up to
//! `max_requests` are served until it elapses. Once the table grows past
//! `SWEEP_THRESHOLD` entries, expired windows are swept at most once per window
//! length.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::warn;

use super::handlers::MessageResponse;

pub const DEFAULT_MAX_REQUESTS: u32 = 500;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const LIMITED_MESSAGE: &str =
    "Too many requests from this address, please try again later.";

const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
struct Table {
    windows: HashMap<String, Window>,
    last_sweep: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    sweep_threshold: usize,
    table: Mutex<Table>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            sweep_threshold: SWEEP_THRESHOLD,
            table: Mutex::new(Table {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let window = self.window;

        if table.windows.len() > self.sweep_threshold
            && now.saturating_duration_since(table.last_sweep) >= window
        {
            table
                .windows
                .retain(|_, entry| now.saturating_duration_since(entry.started) < window);
            table.last_sweep = now;
        }

        let entry = table.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            RateLimitDecision::Limited
        } else {
            entry.count += 1;
            RateLimitDecision::Allowed
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

/// Source address of the request: the socket peer when known, otherwise the
/// usual proxy headers.
fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    let headers = request.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| "unknown".to_string(), str::to_string)
}

pub async fn limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    match limiter.check(&key) {
        RateLimitDecision::Allowed => next.run(request).await,
        RateLimitDecision::Limited => {
            warn!(client = %key, "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(MessageResponse::new(LIMITED_MESSAGE)),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(limiter.check_at("10.0.0.1", now), RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.check_at("10.0.0.1", now), RateLimitDecision::Limited);
        // Other addresses have their own window.
        assert_eq!(limiter.check_at("10.0.0.2", now), RateLimitDecision::Allowed);
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(limiter.check_at("a", start), RateLimitDecision::Allowed);
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(59)),
            RateLimitDecision::Limited
        );
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(60)),
            RateLimitDecision::Allowed
        );
    }

    fn tracked(limiter: &RateLimiter) -> usize {
        limiter
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .windows
            .len()
    }

    #[test]
    fn sweeps_at_most_once_per_window() {
        let mut limiter = RateLimiter::new(10, Duration::from_secs(60));
        limiter.sweep_threshold = 2;
        let start = Instant::now();

        for key in ["a", "b", "c"] {
            limiter.check_at(key, start);
        }
        assert_eq!(tracked(&limiter), 3);

        // Past the threshold and a full window since the last sweep.
        limiter.check_at("d", start + Duration::from_secs(61));
        assert_eq!(tracked(&limiter), 1);

        limiter.check_at("e", start + Duration::from_secs(62));
        limiter.check_at("f", start + Duration::from_secs(62));
        // d, e and f are still live, and the last sweep was too recent anyway.
        limiter.check_at("g", start + Duration::from_secs(100));
        assert_eq!(tracked(&limiter), 4);

        // d, e and f have expired by now; g has not.
        limiter.check_at("h", start + Duration::from_secs(130));
        assert_eq!(tracked(&limiter), 2);
    }

    #[test]
    fn default_matches_fifteen_minute_window() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.max_requests, 500);
        assert_eq!(limiter.window, Duration::from_secs(900));
    }

    #[test]
    fn client_key_prefers_socket_address() {
        let mut request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap_or_default();
        assert_eq!(client_key(&request), "203.0.113.9");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_key(&request), "192.0.2.1");
    }

    #[test]
    fn client_key_falls_back_to_unknown() {
        let request = axum::http::Request::builder()
            .body(Body::empty())
            .unwrap_or_default();
        assert_eq!(client_key(&request), "unknown");
    }
}
