// crates/server/src/routes/mod.rs
//! API route handlers for the gitscout server.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod health;
pub mod issues;
pub mod saved;
pub mod users;

use std::sync::Arc;

use axum::http::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use axum::http::Method;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::rate_limit;
use crate::state::AppState;

/// Build the full application router.
///
/// - `GET /health` — liveness
/// - `/auth/*` — OAuth login/callback, refresh, logout
/// - `/api/*` — authenticated product surface
/// - `/admin/*` — admin-only management surface
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest(
            "/api",
            users::router()
                .merge(issues::router())
                .merge(saved::router())
                .merge(categories::router()),
        )
        .nest("/admin", admin::router())
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = frontend_url
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:5173"));
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, COOKIE])
        .allow_credentials(true)
}

/// Pagination clamps shared by every listing endpoint.
pub(crate) fn clamp_page(page: Option<i64>) -> i64 {
    page.filter(|p| *p >= 1).unwrap_or(1)
}

pub(crate) fn clamp_per_page(per_page: Option<i64>, max: i64, default: i64) -> i64 {
    match per_page {
        Some(p) if (1..=max).contains(&p) => p,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;

    #[tokio::test]
    async fn test_create_app_builds() {
        let (state, _store) = test_state();
        let _router = create_app(state);
    }

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(-3)), 1);
        assert_eq!(clamp_page(Some(7)), 7);

        assert_eq!(clamp_per_page(None, 50, 20), 20);
        assert_eq!(clamp_per_page(Some(0), 50, 20), 20);
        assert_eq!(clamp_per_page(Some(200), 50, 20), 20);
        assert_eq!(clamp_per_page(Some(35), 50, 20), 35);
    }
}
