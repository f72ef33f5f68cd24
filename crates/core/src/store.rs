// crates/core/src/store.rs
//! Persistence capability traits.
//!
//! One narrow trait per entity surface, injected at service constructors.
//! `gitscout-db` implements them on Postgres; tests use its in-memory
//! implementation. Lookups that can miss return `Option` rather than an
//! error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Category, DeepDive, FeedFilter, Issue, IssueSkill, NewDeepDive, NewIssue, NewRepository,
    NewUser, RefreshToken, RepoListItem, Repository, Role, SkillSource, User, UserProfile,
    UserSkill, UserSummary,
};

/// Storage-backend failure. Handlers map this to a 500.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Repository>>;
    /// Insert-or-update keyed by `github_id`. Curation fields (tags,
    /// difficulty level, activity status, category links) are never
    /// written here.
    async fn upsert(&self, repo: &NewRepository) -> StoreResult<Repository>;
    async fn list_all(&self) -> StoreResult<Vec<Repository>>;
    /// Every known hosting-service repo id, for discovery dedup.
    async fn all_github_ids(&self) -> StoreResult<Vec<i64>>;
    async fn count(&self) -> StoreResult<i64>;
    async fn list_with_issue_counts(
        &self,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RepoListItem>, i64)>;
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
    async fn update_curation(
        &self,
        id: Uuid,
        tags: &[String],
        difficulty_level: &str,
        activity_status: &str,
    ) -> StoreResult<()>;
    async fn assign_category(&self, repo_id: Uuid, category_id: Uuid) -> StoreResult<()>;
    async fn remove_category(&self, repo_id: Uuid, category_id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Fetch an issue hydrated with its repository and skill tags.
    async fn get(&self, id: Uuid) -> StoreResult<Option<Issue>>;
    async fn feed(
        &self,
        filter: &FeedFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Issue>, i64)>;
    async fn search(&self, query: &str, limit: i64, offset: i64)
        -> StoreResult<(Vec<Issue>, i64)>;
    /// Insert-or-update keyed by `(github_id, repo_id)`; refreshes
    /// `indexed_at` on every call.
    async fn upsert(&self, issue: &NewIssue) -> StoreResult<Issue>;
    /// Replace the issue's skill tags atomically (delete-then-insert in one
    /// transaction).
    async fn set_skills(&self, issue_id: Uuid, skills: &[IssueSkill]) -> StoreResult<()>;
    async fn count(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Insert-or-update keyed by `github_id`; stores the encrypted
    /// third-party access token alongside the identity fields.
    async fn upsert(&self, user: &NewUser, access_token_enc: &[u8]) -> StoreResult<User>;
    async fn update_profile(&self, id: Uuid, profile: &UserProfile) -> StoreResult<()>;
    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<()>;
    /// Replace all skills of one source, keeping the other source intact.
    async fn replace_skills(
        &self,
        user_id: Uuid,
        source: SkillSource,
        skills: &[UserSkill],
    ) -> StoreResult<()>;
    async fn access_token_enc(&self, user_id: Uuid) -> StoreResult<Option<Vec<u8>>>;
    async fn count(&self) -> StoreResult<i64>;
    async fn list(&self, limit: i64, offset: i64) -> StoreResult<(Vec<UserSummary>, i64)>;
}

#[async_trait]
pub trait SavedIssueStore: Send + Sync {
    /// Idempotent: saving twice is a no-op.
    async fn save(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<()>;
    async fn unsave(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<()>;
    async fn is_saved(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<bool>;
    async fn list(&self, user_id: Uuid, limit: i64, offset: i64)
        -> StoreResult<(Vec<Issue>, i64)>;
    /// Which of `issue_ids` the user has saved, for feed enrichment.
    async fn saved_ids(&self, user_id: Uuid, issue_ids: &[Uuid]) -> StoreResult<Vec<Uuid>>;
    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<i64>;
}

#[async_trait]
pub trait DeepDiveStore: Send + Sync {
    async fn get(&self, issue_id: Uuid, user_id: Uuid) -> StoreResult<Option<DeepDive>>;
    /// Insert-or-update keyed by `(issue_id, user_id)`; last writer wins.
    async fn upsert(&self, deep_dive: &NewDeepDive) -> StoreResult<DeepDive>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Category>>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Look up an unexpired token by hash.
    async fn find_valid(&self, token_hash: &[u8]) -> StoreResult<Option<RefreshToken>>;
    async fn delete_by_hash(&self, token_hash: &[u8]) -> StoreResult<()>;
    async fn delete_for_user(&self, user_id: Uuid) -> StoreResult<()>;
}
