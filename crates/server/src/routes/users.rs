// crates/server/src/routes/users.rs
//! The authenticated user's profile, skills, and PR history.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use gitscout_core::models::{SkillSource, User, UserProfile, UserSkill};
use gitscout_core::store::{SavedIssueStore, UserStore};
use gitscout_github::types::PrSearchResult;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::routes::{clamp_page, clamp_per_page};
use crate::state::AppState;

/// Skills below this share of the user's code are noise.
const MIN_PROFICIENCY: f64 = 0.01;
const MAX_SKILLS: usize = 15;
const MANUAL_PROFICIENCY: f64 = 0.5;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub saved_count: i64,
    pub merged_pr_count: i64,
}

/// GET /api/users/me — profile plus saved-issue and merged-PR counts.
///
/// The two counts are fetched concurrently; a PR-search failure degrades
/// to zero rather than failing the profile read.
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<MeResponse>> {
    let user = state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let (saved_count, prs) = tokio::join!(
        state.saved.count_for_user(user_id),
        state.github.get_user_prs(&user.github_username, true, 1, 1),
    );

    let merged_pr_count = match prs {
        Ok(result) => result.total_count,
        Err(err) => {
            warn!(user = %user.github_username, error = %err, "merged PR count unavailable");
            0
        }
    };

    Ok(Json(MeResponse {
        user,
        saved_count: saved_count?,
        merged_pr_count,
    }))
}

/// PATCH /api/users/me/profile — onboarding profile.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(profile): Json<UserProfile>,
) -> ApiResult<Json<serde_json::Value>> {
    state.users.update_profile(user_id, &profile).await?;
    Ok(Json(serde_json::json!({"status": "updated"})))
}

#[derive(Debug, Deserialize)]
struct PrQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

/// GET /api/users/me/prs — proxy to the hosting service's PR search.
async fn get_my_prs(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<PrQuery>,
) -> ApiResult<Json<PrSearchResult>> {
    let merged = match query.kind.as_deref() {
        None | Some("merged") => true,
        Some("open") => false,
        Some(other) => {
            return Err(ApiError::BadRequest(format!("unknown pr type: {other}")));
        }
    };

    let user = state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let page = clamp_page(query.page);
    let per_page = clamp_per_page(query.per_page, 50, 30);

    let result = state
        .github
        .get_user_prs(&user.github_username, merged, page as i32, per_page as i32)
        .await?;
    Ok(Json(result))
}

/// POST /api/users/me/skills/analyze — derive skills from the user's own
/// repositories using their linked GitHub token.
async fn analyze_skills(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<UserSkill>>> {
    let token_enc = state
        .users
        .access_token_enc(user_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("no linked GitHub token".into()))?;
    let token = state.encryptor.decrypt(&token_enc)?;

    let repos = state.github.get_user_repos(&token).await?;

    let mut language_bytes: HashMap<String, i64> = HashMap::new();
    for repo in &repos {
        match state
            .github
            .get_repo_languages(&token, &repo.owner.login, &repo.name)
            .await
        {
            Ok(languages) => {
                for (language, bytes) in languages {
                    *language_bytes.entry(language).or_default() += bytes;
                }
            }
            Err(err) => {
                warn!(repo = %repo.name, error = %err, "failed to get languages for repo");
            }
        }
    }

    if language_bytes.is_empty() {
        return Ok(Json(vec![]));
    }

    let total: i64 = language_bytes.values().sum();
    let mut skills: Vec<UserSkill> = language_bytes
        .into_iter()
        .filter_map(|(language, bytes)| {
            let proficiency = bytes as f64 / total as f64;
            (proficiency >= MIN_PROFICIENCY).then_some(UserSkill {
                language,
                proficiency,
                source: SkillSource::Github,
            })
        })
        .collect();

    skills.sort_by(|a, b| {
        b.proficiency
            .partial_cmp(&a.proficiency)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    skills.truncate(MAX_SKILLS);

    state
        .users
        .replace_skills(user_id, SkillSource::Github, &skills)
        .await?;

    Ok(Json(skills))
}

#[derive(Debug, Deserialize)]
struct ManualSkills {
    languages: Vec<String>,
}

/// PUT /api/users/me/skills — replace manually-declared skills.
async fn set_manual_skills(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ManualSkills>,
) -> ApiResult<Json<Vec<UserSkill>>> {
    let skills: Vec<UserSkill> = body
        .languages
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|language| UserSkill {
            language: language.trim().to_string(),
            proficiency: MANUAL_PROFICIENCY,
            source: SkillSource::Manual,
        })
        .collect();

    state
        .users
        .replace_skills(user_id, SkillSource::Manual, &skills)
        .await?;

    let user = state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(user.skills))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/me/profile", patch(update_profile))
        .route("/users/me/prs", get(get_my_prs))
        .route("/users/me/skills/analyze", post(analyze_skills))
        .route("/users/me/skills", put(set_manual_skills))
}
