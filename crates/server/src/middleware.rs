// crates/server/src/middleware.rs
//! Request guards: auth extraction, admin role check, IP rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE, RETRY_AFTER};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use gitscout_core::models::{Role, User};
use gitscout_core::store::UserStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The authenticated caller's id, from a bearer header or the access-token
/// cookie.
pub struct AuthUser(pub Uuid);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing access token".into()))?;
        let user_id = state
            .jwt
            .validate(&token)
            .map_err(|_| ApiError::Unauthorized("invalid access token".into()))?;
        Ok(AuthUser(user_id))
    }
}

/// The authenticated caller, loaded and checked for the admin role.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = state
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("unknown user".into()))?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("admin access required".into()));
        }
        Ok(AdminUser(user))
    }
}

fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        if let Ok(raw) = value.to_str() {
            if let Some(token) = raw.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    let cookies = parts.headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == ACCESS_TOKEN_COOKIE).then(|| value.to_string())
    })
}

struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request limiter keyed by client IP.
///
/// Entries are overwritten on the next hit after their window ends, so no
/// background sweeper is needed.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Count one hit; on refusal, returns the seconds until the window
    /// resets.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("rate limiter lock");

        let entry = entries.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            reset_at: now + self.window,
        });
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        entry.count += 1;
        if entry.count > self.limit {
            let retry_after = entry.reset_at.saturating_duration_since(now).as_secs().max(1);
            return Err(retry_after);
        }
        Ok(())
    }
}

/// Tower layer body for the limiter. The peer address comes from connect
/// info when the listener provides it; otherwise all callers share one
/// bucket, which only happens in tests.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match state.rate_limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let mut response = (
                axum::http::StatusCode::TOO_MANY_REQUESTS,
                axum::Json(crate::error::ErrorResponse::new("rate limit exceeded")),
            )
                .into_response();
            response.headers_mut().insert(
                RETRY_AFTER,
                axum::http::HeaderValue::from_str(&retry_after.to_string())
                    .unwrap_or_else(|_| axum::http::HeaderValue::from_static("60")),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("1.2.3.4").is_ok());
        }
        assert!(limiter.check("1.2.3.4").is_err());
        // A different client has its own bucket.
        assert!(limiter.check("5.6.7.8").is_ok());
    }

    #[test]
    fn test_rate_limiter_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(30));
        assert!(limiter.check("ip").is_ok());
        assert!(limiter.check("ip").is_err());

        std::thread::sleep(Duration::from_millis(40));
        // Window elapsed: the entry is overwritten on the next hit.
        assert!(limiter.check("ip").is_ok());
    }

    #[test]
    fn test_rate_limiter_reports_retry_after() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.check("ip").unwrap();
        let retry_after = limiter.check("ip").unwrap_err();
        assert!((1..=60).contains(&retry_after));
    }
}
