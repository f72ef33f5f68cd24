// crates/server/src/routes/saved.rs
//! Saved-issue bookmarks.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use gitscout_core::models::IssuePage;
use gitscout_core::store::{IssueStore, SavedIssueStore};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::routes::{clamp_page, clamp_per_page};
use crate::state::AppState;

fn parse_issue_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid issue id".into()))
}

async fn require_issue(state: &AppState, id: Uuid) -> ApiResult<()> {
    state
        .issues
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("issue not found".into()))?;
    Ok(())
}

/// POST /api/issues/{id}/save — idempotent bookmark.
async fn save_issue(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let id = parse_issue_id(&id)?;
    require_issue(&state, id).await?;
    state.saved.save(user_id, id).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({"status": "saved"}))))
}

/// DELETE /api/issues/{id}/save
async fn unsave_issue(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_issue_id(&id)?;
    state.saved.unsave(user_id, id).await?;
    Ok(Json(serde_json::json!({"status": "unsaved"})))
}

/// GET /api/issues/{id}/saved
async fn is_saved(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_issue_id(&id)?;
    let saved = state.saved.is_saved(user_id, id).await?;
    Ok(Json(serde_json::json!({"saved": saved})))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

/// GET /api/issues/saved — the viewer's bookmarks, newest first.
async fn list_saved(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<IssuePage>> {
    let page = clamp_page(query.page);
    let per_page = clamp_per_page(query.per_page, 50, 20);

    let (issues, total_count) = state
        .saved
        .list(user_id, per_page, (page - 1) * per_page)
        .await?;

    Ok(Json(IssuePage {
        issues,
        total_count,
        page,
        per_page,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/issues/saved", get(list_saved))
        .route("/issues/{id}/save", axum::routing::post(save_issue).delete(unsave_issue))
        .route("/issues/{id}/saved", get(is_saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_app;
    use crate::testutil::{bearer, create_issue, create_repo, create_user, test_state};
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn request(
        app: axum::Router,
        method: &str,
        uri: &str,
        token: &str,
    ) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_then_save_is_idempotent() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let issue = create_issue(&store, &repo, 1, "bookmark me", &["Rust"]).await;
        let token = bearer(&state, &user);
        let uri = format!("/api/issues/{}/save", issue.id);

        let response = request(create_app(state.clone()), "POST", &uri, &token).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = request(create_app(state.clone()), "POST", &uri, &token).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let page: IssuePage = body_json(
            request(create_app(state), "GET", "/api/issues/saved", &token).await,
        )
        .await;
        assert_eq!(page.total_count, 1);
        assert!(page.issues[0].is_saved);
    }

    #[tokio::test]
    async fn test_unsave_restores_prior_state() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let issue = create_issue(&store, &repo, 1, "transient", &["Rust"]).await;
        let token = bearer(&state, &user);

        request(create_app(state.clone()), "POST", &format!("/api/issues/{}/save", issue.id), &token).await;
        request(create_app(state.clone()), "DELETE", &format!("/api/issues/{}/save", issue.id), &token).await;

        let response = request(
            create_app(state),
            "GET",
            &format!("/api/issues/{}/saved", issue.id),
            &token,
        )
        .await;
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["saved"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn test_save_unknown_issue_is_404() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let token = bearer(&state, &user);

        let response = request(
            create_app(state),
            "POST",
            &format!("/api/issues/{}/save", Uuid::new_v4()),
            &token,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_saved_list_is_scoped_to_viewer() {
        let (state, store) = test_state();
        let alice = create_user(&store, 1, "alice").await;
        let bob = create_user(&store, 2, "bob").await;
        let repo = create_repo(&store, 100, "demo").await;
        let issue = create_issue(&store, &repo, 1, "alice's pick", &["Rust"]).await;
        store.save(alice.id, issue.id).await.unwrap();

        let bob_token = bearer(&state, &bob);
        let page: IssuePage = body_json(
            request(create_app(state), "GET", "/api/issues/saved", &bob_token).await,
        )
        .await;
        assert_eq!(page.total_count, 0);
    }
}
