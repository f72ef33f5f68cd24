// crates/server/src/routes/auth.rs
//! OAuth login/callback, token refresh, and logout.
//!
//! The access JWT and the opaque refresh token travel as HttpOnly cookies;
//! `Secure` is added in production.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::{HeaderValue, COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::RngCore;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, ACCESS_TOKEN_COOKIE};
use crate::state::AppState;

const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
const OAUTH_STATE_COOKIE: &str = "oauth_state";

const ACCESS_TOKEN_MAX_AGE_SECS: i64 = 15 * 60;
const REFRESH_TOKEN_MAX_AGE_SECS: i64 = 7 * 24 * 3600;
const OAUTH_STATE_MAX_AGE_SECS: i64 = 5 * 60;

fn cookie_value(
    name: &str,
    value: &str,
    max_age_secs: i64,
    domain: &str,
    secure: bool,
) -> HeaderValue {
    let mut cookie = format!(
        "{name}={value}; Path=/; Domain={domain}; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).expect("cookie header value")
}

fn session_cookies(state: &AppState, access: &str, refresh: &str) -> [HeaderValue; 2] {
    let secure = state.config.is_prod();
    let domain = &state.config.cookie_domain;
    [
        cookie_value(ACCESS_TOKEN_COOKIE, access, ACCESS_TOKEN_MAX_AGE_SECS, domain, secure),
        cookie_value(REFRESH_TOKEN_COOKIE, refresh, REFRESH_TOKEN_MAX_AGE_SECS, domain, secure),
    ]
}

fn clear_cookies(state: &AppState) -> [HeaderValue; 2] {
    let secure = state.config.is_prod();
    let domain = &state.config.cookie_domain;
    [
        cookie_value(ACCESS_TOKEN_COOKIE, "", 0, domain, secure),
        cookie_value(REFRESH_TOKEN_COOKIE, "", 0, domain, secure),
    ]
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (cookie_name, value) = pair.trim().split_once('=')?;
        (cookie_name == name).then(|| value.to_string())
    })
}

/// GET /auth/github/login — redirect to GitHub with a CSRF state cookie.
async fn login(State(state): State<Arc<AppState>>) -> Response {
    let mut state_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut state_bytes);
    let oauth_state = hex::encode(state_bytes);

    let redirect_uri = format!("{}/auth/github/callback", state.config.backend_url);
    let authorize_url = state.github.authorize_url(&redirect_uri, &oauth_state);

    let mut response = Redirect::temporary(&authorize_url).into_response();
    response.headers_mut().append(
        SET_COOKIE,
        cookie_value(
            OAUTH_STATE_COOKIE,
            &oauth_state,
            OAUTH_STATE_MAX_AGE_SECS,
            &state.config.cookie_domain,
            state.config.is_prod(),
        ),
    );
    response
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// GET /auth/github/callback — exchange the code, set session cookies, and
/// land the user back on the frontend.
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Response> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing oauth code".into()))?;

    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE)
        .ok_or_else(|| ApiError::BadRequest("missing oauth state".into()))?;
    if query.state.as_deref() != Some(expected.as_str()) {
        return Err(ApiError::BadRequest("oauth state mismatch".into()));
    }

    let result = state.auth.handle_callback(&code).await?;

    let destination = if result.user.onboarding_done {
        state.config.frontend_url.clone()
    } else {
        format!("{}/onboarding", state.config.frontend_url)
    };

    let mut response = Redirect::to(&destination).into_response();
    for cookie in session_cookies(&state, &result.access_token, &result.refresh_token) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    // The state cookie is single-use.
    response.headers_mut().append(
        SET_COOKIE,
        cookie_value(OAUTH_STATE_COOKIE, "", 0, &state.config.cookie_domain, state.config.is_prod()),
    );
    Ok(response)
}

/// POST /auth/refresh — rotate the refresh token and mint a new access
/// token.
async fn refresh(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Response> {
    let token = read_cookie(&headers, REFRESH_TOKEN_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("missing refresh token".into()))?;

    let result = state.auth.refresh(&token).await?;

    let mut response = Json(result.user).into_response();
    for cookie in session_cookies(&state, &result.access_token, &result.refresh_token) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    Ok(response)
}

/// POST /auth/logout — revoke refresh tokens and clear cookies.
async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Response> {
    state.auth.logout(user_id).await?;

    let mut response = Json(serde_json::json!({"status": "logged_out"})).into_response();
    for cookie in clear_cookies(&state) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    Ok(response)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/github/login", get(login))
        .route("/github/callback", get(callback))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_app;
    use crate::testutil::{test_state, test_state_with};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn extract_cookie(response: &Response, name: &str) -> Option<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{name}=")))
            .map(String::from)
    }

    #[tokio::test]
    async fn test_login_redirects_to_github_with_state_cookie() {
        let (state, _store) = test_state();
        let app = create_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/github/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.contains("/login/oauth/authorize"));
        assert!(location.contains("client_id=test-client"));

        let state_cookie = extract_cookie(&response, OAUTH_STATE_COOKIE).unwrap();
        assert!(state_cookie.contains("HttpOnly"));
        // The state parameter in the redirect matches the cookie value.
        let cookie_state = state_cookie
            .split_once('=')
            .unwrap()
            .1
            .split(';')
            .next()
            .unwrap();
        assert!(location.ends_with(&format!("state={cookie_state}")));
    }

    #[tokio::test]
    async fn test_callback_sets_session_cookies_and_redirects() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login/oauth/access_token")
            .with_status(200)
            .with_body(r#"{"access_token": "gho_x", "token_type": "bearer"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/user")
            .with_status(200)
            .with_body(r#"{"id": 5, "login": "alice", "avatar_url": "", "bio": null}"#)
            .create_async()
            .await;

        let (state, _store) = test_state_with(&server.url(), None);
        let app = create_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/github/callback?code=abc&state=xyz")
                    .header(header::COOKIE, format!("{OAUTH_STATE_COOKIE}=xyz"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        // New user: onboarding has not been completed yet.
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.ends_with("/onboarding"));

        assert!(extract_cookie(&response, ACCESS_TOKEN_COOKIE).is_some());
        assert!(extract_cookie(&response, REFRESH_TOKEN_COOKIE).is_some());
    }

    #[tokio::test]
    async fn test_callback_rejects_state_mismatch() {
        let (state, _store) = test_state();
        let app = create_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/github/callback?code=abc&state=evil")
                    .header(header::COOKIE, format!("{OAUTH_STATE_COOKIE}=good"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_is_unauthorized() {
        let (state, _store) = test_state();
        let app = create_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_with_valid_cookie_rotates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login/oauth/access_token")
            .with_status(200)
            .with_body(r#"{"access_token": "gho_x", "token_type": "bearer"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/user")
            .with_status(200)
            .with_body(r#"{"id": 5, "login": "alice", "avatar_url": "", "bio": null}"#)
            .create_async()
            .await;

        let (state, _store) = test_state_with(&server.url(), None);
        let login = state.auth.handle_callback("abc").await.unwrap();

        let app = create_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(
                        header::COOKIE,
                        format!("{REFRESH_TOKEN_COOKIE}={}", login.refresh_token),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let new_refresh = extract_cookie(&response, REFRESH_TOKEN_COOKIE).unwrap();
        assert!(!new_refresh.contains(&login.refresh_token));
    }
}
