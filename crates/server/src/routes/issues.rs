// crates/server/src/routes/issues.rs
//! The issue feed, search, detail, comments proxy, and deep-dive endpoint.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use gitscout_core::matching::score_issues;
use gitscout_core::models::{DeepDive, FeedFilter, Issue, IssuePage};
use gitscout_core::store::{IssueStore, SavedIssueStore, UserStore};
use gitscout_github::types::GitHubComment;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::routes::{clamp_page, clamp_per_page};
use crate::state::AppState;

fn parse_issue_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid issue id".into()))
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    page: Option<i64>,
    per_page: Option<i64>,
    /// Comma-separated language override; defaults to the viewer's skills.
    languages: Option<String>,
    category: Option<String>,
    difficulty: Option<i32>,
}

/// GET /api/issues/feed — filtered, scored for the viewer, and enriched
/// with the saved bit.
async fn get_feed(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<IssuePage>> {
    let user = state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    if let Some(d) = query.difficulty {
        if !(1..=3).contains(&d) {
            return Err(ApiError::BadRequest("difficulty must be 1-3".into()));
        }
    }

    let page = clamp_page(query.page);
    let per_page = clamp_per_page(query.per_page, 50, 20);

    // Language filter: explicit override, otherwise the viewer's skills.
    let languages = match query.languages.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        None => user.skills.iter().map(|s| s.language.clone()).collect(),
    };

    let filter = FeedFilter {
        languages,
        difficulty: query.difficulty,
        category: query.category.filter(|c| !c.is_empty()),
    };

    let (mut issues, total_count) = state
        .issues
        .feed(&filter, per_page, (page - 1) * per_page)
        .await?;

    score_issues(&user, &mut issues);
    mark_saved(&state, user_id, &mut issues).await?;

    Ok(Json(IssuePage {
        issues,
        total_count,
        page,
        per_page,
    }))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

/// GET /api/issues/search — substring search over open issues.
async fn search_issues(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<IssuePage>> {
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing search query".into()))?;

    let page = clamp_page(query.page);
    let per_page = clamp_per_page(query.per_page, 50, 20);

    let (mut issues, total_count) = state
        .issues
        .search(needle, per_page, (page - 1) * per_page)
        .await?;
    mark_saved(&state, user_id, &mut issues).await?;

    Ok(Json(IssuePage {
        issues,
        total_count,
        page,
        per_page,
    }))
}

/// GET /api/issues/{id} — issue with repository and skill tags.
async fn get_issue(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Issue>> {
    let id = parse_issue_id(&id)?;
    let mut issue = state
        .issues
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("issue not found".into()))?;
    issue.is_saved = state.saved.is_saved(user_id, id).await?;
    Ok(Json(issue))
}

/// GET /api/issues/{id}/comments — live comments proxy.
async fn get_issue_comments(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<GitHubComment>>> {
    let id = parse_issue_id(&id)?;
    let issue = state
        .issues
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("issue not found".into()))?;
    let repo = issue
        .repo
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("issue not found".into()))?;

    let comments = state
        .github
        .get_public_issue_comments(&repo.owner, &repo.name, issue.number)
        .await?;
    Ok(Json(comments))
}

/// GET /api/issues/{id}/deep-dive — cached or freshly generated briefing.
async fn get_deep_dive(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeepDive>> {
    let id = parse_issue_id(&id)?;
    let deep_dive = state.deep_dive.generate(id, user_id).await?;
    Ok(Json(deep_dive))
}

async fn mark_saved(
    state: &AppState,
    user_id: Uuid,
    issues: &mut [Issue],
) -> Result<(), ApiError> {
    let ids: Vec<Uuid> = issues.iter().map(|i| i.id).collect();
    let saved: HashSet<Uuid> = state.saved.saved_ids(user_id, &ids).await?.into_iter().collect();
    for issue in issues {
        issue.is_saved = saved.contains(&issue.id);
    }
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/issues/feed", get(get_feed))
        .route("/issues/search", get(search_issues))
        .route("/issues/{id}", get(get_issue))
        .route("/issues/{id}/comments", get(get_issue_comments))
        .route("/issues/{id}/deep-dive", get(get_deep_dive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_app;
    use crate::testutil::{bearer, create_issue, create_repo, create_user, test_state, test_state_with};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use gitscout_core::models::UserProfile;
    use gitscout_core::store::SavedIssueStore;
    use tower::ServiceExt;

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn get(app: axum::Router, uri: &str, token: &str) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_feed_scores_and_ranks_for_viewer() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        state
            .users
            .update_profile(
                user.id,
                &UserProfile {
                    comfort_level: "beginner".into(),
                    time_commitment: "weekends".into(),
                    goals: vec![],
                },
            )
            .await
            .unwrap();

        let repo = create_repo(&store, 100, "demo").await;
        let strong = create_issue(&store, &repo, 1, "rust issue", &["Rust"]).await;
        let weak = create_issue(&store, &repo, 2, "haskell issue", &["Haskell"]).await;

        let token = bearer(&state, &user);
        let app = create_app(state);
        // No language filter: the user has no skills recorded, so all
        // issues come back, scored.
        let response = get(app, "/api/issues/feed", &token).await;
        assert_eq!(response.status(), StatusCode::OK);

        let page: IssuePage = body_json(response).await;
        assert_eq!(page.total_count, 2);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 20);
        assert!(page.issues.iter().all(|i| i.match_score.is_some()));
        let ids: Vec<Uuid> = page.issues.iter().map(|i| i.id).collect();
        assert!(ids.contains(&strong.id) && ids.contains(&weak.id));
    }

    #[tokio::test]
    async fn test_feed_language_filter_narrows_results() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let rust = create_issue(&store, &repo, 1, "rust issue", &["Rust"]).await;
        create_issue(&store, &repo, 2, "go issue", &["Go"]).await;

        let token = bearer(&state, &user);
        let app = create_app(state);
        let response = get(app, "/api/issues/feed?languages=rust", &token).await;
        let page: IssuePage = body_json(response).await;

        assert_eq!(page.total_count, 1);
        assert_eq!(page.issues[0].id, rust.id);
        // Every returned issue is open and intersects the filter.
        assert!(page.issues.iter().all(|i| {
            i.skills.iter().any(|s| s.language.eq_ignore_ascii_case("rust"))
        }));
    }

    #[tokio::test]
    async fn test_feed_marks_saved_issues() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let saved_issue = create_issue(&store, &repo, 1, "saved one", &["Rust"]).await;
        create_issue(&store, &repo, 2, "other", &["Rust"]).await;
        store.save(user.id, saved_issue.id).await.unwrap();

        let token = bearer(&state, &user);
        let app = create_app(state);
        let page: IssuePage = body_json(get(app, "/api/issues/feed", &token).await).await;

        let saved_flags: Vec<(Uuid, bool)> =
            page.issues.iter().map(|i| (i.id, i.is_saved)).collect();
        assert!(saved_flags.contains(&(saved_issue.id, true)));
        assert_eq!(saved_flags.iter().filter(|(_, s)| *s).count(), 1);
    }

    #[tokio::test]
    async fn test_feed_rejects_out_of_range_difficulty() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let token = bearer(&state, &user);
        let app = create_app(state);
        let response = get(app, "/api/issues/feed?difficulty=9", &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let token = bearer(&state, &user);

        let app = create_app(state.clone());
        let response = get(app, "/api/issues/search", &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = create_app(state);
        let response = get(app, "/api/issues/search?q=", &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_matches_title_case_insensitively() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let hit = create_issue(&store, &repo, 1, "Fix CLI panic", &["Rust"]).await;
        create_issue(&store, &repo, 2, "unrelated", &["Rust"]).await;

        let token = bearer(&state, &user);
        let app = create_app(state);
        let page: IssuePage =
            body_json(get(app, "/api/issues/search?q=cli", &token).await).await;
        assert_eq!(page.total_count, 1);
        assert_eq!(page.issues[0].id, hit.id);
    }

    #[tokio::test]
    async fn test_get_issue_detail_and_bad_id() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let issue = create_issue(&store, &repo, 1, "detail", &["Rust"]).await;
        let token = bearer(&state, &user);

        let app = create_app(state.clone());
        let response = get(app, &format!("/api/issues/{}", issue.id), &token).await;
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Issue = body_json(response).await;
        assert_eq!(fetched.id, issue.id);
        assert!(fetched.repo.is_some());
        assert!(!fetched.skills.is_empty());

        let app = create_app(state.clone());
        let response = get(app, "/api/issues/not-a-uuid", &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = create_app(state);
        let response = get(app, &format!("/api/issues/{}", Uuid::new_v4()), &token).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_comments_proxy_forwards_upstream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/repos/octo/demo/issues/1/comments.*".into()))
            .with_status(200)
            .with_body(
                r#"[{"id": 9, "body": "I can take this", "created_at": "2025-01-01T00:00:00Z",
                     "user": {"id": 2, "login": "bob", "avatar_url": "", "bio": null}}]"#,
            )
            .create_async()
            .await;

        let (state, store) = test_state_with(&server.url(), None);
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let issue = create_issue(&store, &repo, 1, "with comments", &["Rust"]).await;
        let token = bearer(&state, &user);

        let app = create_app(state);
        let response = get(app, &format!("/api/issues/{}/comments", issue.id), &token).await;
        assert_eq!(response.status(), StatusCode::OK);
        let comments: Vec<GitHubComment> = body_json(response).await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].user.as_ref().unwrap().login, "bob");
    }

    #[tokio::test]
    async fn test_deep_dive_not_configured_returns_503() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        let repo = create_repo(&store, 100, "demo").await;
        let issue = create_issue(&store, &repo, 1, "dive", &["Rust"]).await;
        let token = bearer(&state, &user);

        let app = create_app(state);
        let response = get(app, &format!("/api/issues/{}/deep-dive", issue.id), &token).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
