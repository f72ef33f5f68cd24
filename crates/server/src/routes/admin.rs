// crates/server/src/routes/admin.rs
//! Admin surface: stats, user management, job triggers, and repository
//! curation. Every handler requires the admin role.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gitscout_core::models::{Job, JobType, RepoListItem, Role, UserSummary};
use gitscout_core::store::{IssueStore, RepoStore, UserStore};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AdminUser;
use crate::routes::{clamp_page, clamp_per_page};
use crate::state::AppState;

fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid {what} id")))
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct AdminStats {
    pub user_count: i64,
    pub repo_count: i64,
    pub issue_count: i64,
}

/// GET /admin/stats
async fn get_stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<Json<AdminStats>> {
    let (users, repos, issues) = tokio::join!(
        state.users.count(),
        RepoStore::count(state.repos.as_ref()),
        IssueStore::count(state.issues.as_ref()),
    );
    Ok(Json(AdminStats {
        user_count: users?,
        repo_count: repos?,
        issue_count: issues?,
    }))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct UserList {
    pub users: Vec<UserSummary>,
    pub total_count: i64,
    pub page: i64,
    pub per_page: i64,
}

/// GET /admin/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<UserList>> {
    let page = clamp_page(query.page);
    let per_page = clamp_per_page(query.per_page, 100, 50);

    let (users, total_count) = state.users.list(per_page, (page - 1) * per_page).await?;
    Ok(Json(UserList {
        users,
        total_count,
        page,
        per_page,
    }))
}

#[derive(Debug, Deserialize)]
struct RoleUpdate {
    role: String,
}

/// PATCH /admin/users/{id}
async fn update_user_role(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<RoleUpdate>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id, "user")?;
    let role: Role = body
        .role
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid role: {}", body.role)))?;
    state.users.update_role(id, role).await?;
    Ok(Json(serde_json::json!({"status": "updated"})))
}

/// POST /admin/seed — fetch the bundled seed list as a background job.
async fn trigger_seed(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let indexer = state.indexer.clone();
    let job = state
        .jobs
        .start_job(JobType::Seed, move |progress| async move {
            indexer.seed(progress).await
        })?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// POST /admin/index — re-index every known repository.
async fn trigger_index(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let indexer = state.indexer.clone();
    let job = state
        .jobs
        .start_job(JobType::Index, move |progress| async move {
            indexer.index_all(progress).await
        })?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// POST /admin/discover — run one discovery pass.
async fn trigger_discover(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = state.discovery.discover()?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /admin/jobs — registry snapshot.
async fn list_jobs(State(state): State<Arc<AppState>>, _admin: AdminUser) -> Json<Vec<Job>> {
    Json(state.jobs.jobs())
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct RepoList {
    pub repos: Vec<RepoListItem>,
    pub total_count: i64,
    pub page: i64,
    pub per_page: i64,
}

/// GET /admin/repos
async fn list_repos(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<RepoList>> {
    let page = clamp_page(query.page);
    let per_page = clamp_per_page(query.per_page, 100, 50);

    let (repos, total_count) = state
        .repos
        .list_with_issue_counts(per_page, (page - 1) * per_page)
        .await?;
    Ok(Json(RepoList {
        repos,
        total_count,
        page,
        per_page,
    }))
}

/// DELETE /admin/repos/{id}
async fn delete_repo(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id, "repo")?;
    RepoStore::delete(state.repos.as_ref(), id).await?;
    Ok(Json(serde_json::json!({"status": "deleted"})))
}

#[derive(Debug, Deserialize)]
struct CurationUpdate {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    difficulty_level: String,
    #[serde(default)]
    activity_status: String,
}

/// PATCH /admin/repos/{id} — curation metadata.
async fn update_repo_metadata(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<CurationUpdate>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id, "repo")?;
    state
        .repos
        .update_curation(id, &body.tags, &body.difficulty_level, &body.activity_status)
        .await?;
    Ok(Json(serde_json::json!({"status": "updated"})))
}

/// POST /admin/repos/{id}/categories/{category_id}
async fn assign_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path((id, category_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id, "repo")?;
    let category_id = parse_id(&category_id, "category")?;
    state.repos.assign_category(id, category_id).await?;
    Ok(Json(serde_json::json!({"status": "assigned"})))
}

/// DELETE /admin/repos/{id}/categories/{category_id}
async fn remove_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path((id, category_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id, "repo")?;
    let category_id = parse_id(&category_id, "category")?;
    state.repos.remove_category(id, category_id).await?;
    Ok(Json(serde_json::json!({"status": "removed"})))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/users", get(list_users))
        .route("/users/{id}", patch(update_user_role))
        .route("/seed", post(trigger_seed))
        .route("/index", post(trigger_index))
        .route("/discover", post(trigger_discover))
        .route("/jobs", get(list_jobs))
        .route("/repos", get(list_repos))
        .route("/repos/{id}", delete(delete_repo).patch(update_repo_metadata))
        .route(
            "/repos/{id}/categories/{category_id}",
            post(assign_category).delete(remove_category),
        )
}
