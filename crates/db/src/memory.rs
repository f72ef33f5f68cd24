// crates/db/src/memory.rs
//! In-memory implementation of every store trait.
//!
//! Mirrors the Postgres semantics that matter to callers: upsert keys,
//! curation-field preservation, `indexed_at` refresh, idempotent saves,
//! feed filtering and ordering. Service and handler tests construct a
//! fresh instance per case.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gitscout_core::models::{
    Category, DeepDive, FeedFilter, Issue, IssueSkill, NewDeepDive, NewIssue, NewRepository,
    NewUser, RefreshToken, RepoListItem, Repository, Role, SkillSource, User, UserProfile,
    UserSkill, UserSummary,
};
use gitscout_core::store::{
    CategoryStore, DeepDiveStore, IssueStore, RefreshTokenStore, RepoStore, SavedIssueStore,
    StoreResult, UserStore,
};

#[derive(Debug, Clone)]
struct SavedLink {
    user_id: Uuid,
    issue_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    repos: Vec<Repository>,
    issues: Vec<Issue>,
    issue_skills: HashMap<Uuid, Vec<IssueSkill>>,
    users: Vec<User>,
    tokens_enc: HashMap<Uuid, Vec<u8>>,
    categories: Vec<Category>,
    repo_categories: Vec<(Uuid, Uuid)>,
    saved: Vec<SavedLink>,
    deep_dives: HashMap<(Uuid, Uuid), DeepDive>,
    refresh_tokens: Vec<RefreshToken>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a category (there is no write API for categories).
    pub fn push_category(&self, category: Category) {
        self.inner.lock().unwrap().categories.push(category);
    }

    fn hydrate(inner: &Inner, issue: &Issue) -> Issue {
        let mut hydrated = issue.clone();
        hydrated.repo = inner.repos.iter().find(|r| r.id == issue.repo_id).cloned();
        hydrated.skills = inner
            .issue_skills
            .get(&issue.id)
            .cloned()
            .unwrap_or_default();
        hydrated
    }

    fn feed_matches(inner: &Inner, issue: &Issue, filter: &FeedFilter) -> bool {
        if issue.status.as_str() != "open" {
            return false;
        }
        if !filter.languages.is_empty() {
            let wanted: Vec<String> = filter.languages.iter().map(|l| l.to_lowercase()).collect();
            let skills = inner.issue_skills.get(&issue.id);
            let overlaps = skills.is_some_and(|skills| {
                skills
                    .iter()
                    .any(|s| wanted.contains(&s.language.to_lowercase()))
            });
            if !overlaps {
                return false;
            }
        }
        if let Some(difficulty) = filter.difficulty {
            if issue.difficulty != difficulty {
                return false;
            }
        }
        if let Some(slug) = &filter.category {
            let Some(category) = inner.categories.iter().find(|c| &c.slug == slug) else {
                return false;
            };
            if !inner
                .repo_categories
                .iter()
                .any(|(rid, cid)| *rid == issue.repo_id && *cid == category.id)
            {
                return false;
            }
        }
        true
    }

    fn sort_feed(issues: &mut [Issue]) {
        issues.sort_by(|a, b| {
            b.freshness_score
                .partial_cmp(&a.freshness_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.created_at.cmp(&a.created_at))
        });
    }

    fn page(issues: Vec<Issue>, limit: i64, offset: i64) -> Vec<Issue> {
        issues
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect()
    }
}

#[async_trait]
impl RepoStore for InMemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Repository>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.repos.iter().find(|r| r.id == id).cloned())
    }

    async fn upsert(&self, repo: &NewRepository) -> StoreResult<Repository> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = inner.repos.iter_mut().find(|r| r.github_id == repo.github_id) {
            existing.owner = repo.owner.clone();
            existing.name = repo.name.clone();
            existing.description = repo.description.clone();
            existing.stars = repo.stars;
            existing.primary_language = repo.primary_language.clone();
            existing.topics = repo.topics.clone();
            existing.has_contributing = repo.has_contributing;
            existing.health_score = repo.health_score;
            existing.last_commit_at = repo.last_commit_at;
            existing.indexed_at = now;
            // tags / difficulty_level / activity_status / categories untouched.
            return Ok(existing.clone());
        }

        let created = Repository {
            id: Uuid::new_v4(),
            github_id: repo.github_id,
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            description: repo.description.clone(),
            stars: repo.stars,
            primary_language: repo.primary_language.clone(),
            topics: repo.topics.clone(),
            has_contributing: repo.has_contributing,
            health_score: repo.health_score,
            last_commit_at: repo.last_commit_at,
            indexed_at: now,
            tags: vec![],
            difficulty_level: String::new(),
            activity_status: String::new(),
        };
        inner.repos.push(created.clone());
        Ok(created)
    }

    async fn list_all(&self) -> StoreResult<Vec<Repository>> {
        let inner = self.inner.lock().unwrap();
        let mut repos = inner.repos.clone();
        repos.sort_by(|a, b| b.stars.cmp(&a.stars));
        Ok(repos)
    }

    async fn all_github_ids(&self) -> StoreResult<Vec<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.repos.iter().map(|r| r.github_id).collect())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().unwrap().repos.len() as i64)
    }

    async fn list_with_issue_counts(
        &self,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RepoListItem>, i64)> {
        let inner = self.inner.lock().unwrap();
        let total = inner.repos.len() as i64;
        let mut repos = inner.repos.clone();
        repos.sort_by(|a, b| b.stars.cmp(&a.stars));

        let items = repos
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|r| {
                let issue_count =
                    inner.issues.iter().filter(|i| i.repo_id == r.id).count() as i64;
                let categories = inner
                    .repo_categories
                    .iter()
                    .filter(|(rid, _)| *rid == r.id)
                    .filter_map(|(_, cid)| {
                        inner.categories.iter().find(|c| c.id == *cid).cloned()
                    })
                    .collect();
                RepoListItem {
                    id: r.id,
                    owner: r.owner,
                    name: r.name,
                    stars: r.stars,
                    primary_language: r.primary_language,
                    issue_count,
                    indexed_at: r.indexed_at,
                    tags: r.tags,
                    difficulty_level: r.difficulty_level,
                    activity_status: r.activity_status,
                    categories,
                }
            })
            .collect();
        Ok((items, total))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.repos.retain(|r| r.id != id);
        let orphaned: Vec<Uuid> = inner
            .issues
            .iter()
            .filter(|i| i.repo_id == id)
            .map(|i| i.id)
            .collect();
        inner.issues.retain(|i| i.repo_id != id);
        for issue_id in &orphaned {
            inner.issue_skills.remove(issue_id);
            inner.saved.retain(|s| s.issue_id != *issue_id);
            inner.deep_dives.retain(|(iid, _), _| iid != issue_id);
        }
        inner.repo_categories.retain(|(rid, _)| *rid != id);
        Ok(())
    }

    async fn update_curation(
        &self,
        id: Uuid,
        tags: &[String],
        difficulty_level: &str,
        activity_status: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(repo) = inner.repos.iter_mut().find(|r| r.id == id) {
            repo.tags = tags.to_vec();
            repo.difficulty_level = difficulty_level.to_string();
            repo.activity_status = activity_status.to_string();
        }
        Ok(())
    }

    async fn assign_category(&self, repo_id: Uuid, category_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner
            .repo_categories
            .iter()
            .any(|(r, c)| *r == repo_id && *c == category_id)
        {
            inner.repo_categories.push((repo_id, category_id));
        }
        Ok(())
    }

    async fn remove_category(&self, repo_id: Uuid, category_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .repo_categories
            .retain(|(r, c)| !(*r == repo_id && *c == category_id));
        Ok(())
    }
}

#[async_trait]
impl IssueStore for InMemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Issue>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .issues
            .iter()
            .find(|i| i.id == id)
            .map(|i| Self::hydrate(&inner, i)))
    }

    async fn feed(
        &self,
        filter: &FeedFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let inner = self.inner.lock().unwrap();
        let mut matched: Vec<Issue> = inner
            .issues
            .iter()
            .filter(|i| Self::feed_matches(&inner, i, filter))
            .map(|i| Self::hydrate(&inner, i))
            .collect();
        let total = matched.len() as i64;
        Self::sort_feed(&mut matched);
        Ok((Self::page(matched, limit, offset), total))
    }

    async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().unwrap();
        let mut matched: Vec<Issue> = inner
            .issues
            .iter()
            .filter(|i| {
                i.status.as_str() == "open"
                    && (i.title.to_lowercase().contains(&needle)
                        || i.body.to_lowercase().contains(&needle))
            })
            .map(|i| Self::hydrate(&inner, i))
            .collect();
        let total = matched.len() as i64;
        Self::sort_feed(&mut matched);
        Ok((Self::page(matched, limit, offset), total))
    }

    async fn upsert(&self, issue: &NewIssue) -> StoreResult<Issue> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = inner
            .issues
            .iter_mut()
            .find(|i| i.github_id == issue.github_id && i.repo_id == issue.repo_id)
        {
            existing.number = issue.number;
            existing.title = issue.title.clone();
            existing.body = issue.body.clone();
            existing.summary = issue.summary.clone();
            existing.labels = issue.labels.clone();
            existing.difficulty = issue.difficulty;
            existing.time_estimate = issue.time_estimate.clone();
            existing.status = issue.status;
            existing.comment_count = issue.comment_count;
            existing.freshness_score = issue.freshness_score;
            existing.indexed_at = now;
            return Ok(existing.clone());
        }

        let created = Issue {
            id: Uuid::new_v4(),
            github_id: issue.github_id,
            repo_id: issue.repo_id,
            number: issue.number,
            title: issue.title.clone(),
            body: issue.body.clone(),
            summary: issue.summary.clone(),
            labels: issue.labels.clone(),
            difficulty: issue.difficulty,
            time_estimate: issue.time_estimate.clone(),
            status: issue.status,
            comment_count: issue.comment_count,
            freshness_score: issue.freshness_score,
            created_at: now,
            indexed_at: now,
            repo: None,
            skills: vec![],
            match_score: None,
            match_reasons: vec![],
            is_saved: false,
        };
        inner.issues.push(created.clone());
        Ok(created)
    }

    async fn set_skills(&self, issue_id: Uuid, skills: &[IssueSkill]) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.issue_skills.insert(issue_id, skills.to_vec());
        Ok(())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().unwrap().issues.len() as i64)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn upsert(&self, user: &NewUser, access_token_enc: &[u8]) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = inner.users.iter_mut().find(|u| u.github_id == user.github_id) {
            existing.github_username = user.github_username.clone();
            existing.avatar_url = user.avatar_url.clone();
            existing.bio = user.bio.clone();
            existing.updated_at = now;
            let updated = existing.clone();
            inner.tokens_enc.insert(updated.id, access_token_enc.to_vec());
            return Ok(updated);
        }

        let created = User {
            id: Uuid::new_v4(),
            github_id: user.github_id,
            github_username: user.github_username.clone(),
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
            role: Role::User,
            comfort_level: String::new(),
            time_commitment: String::new(),
            goals: vec![],
            onboarding_done: false,
            skills: vec![],
            created_at: now,
            updated_at: now,
        };
        inner.users.push(created.clone());
        inner.tokens_enc.insert(created.id, access_token_enc.to_vec());
        Ok(created)
    }

    async fn update_profile(&self, id: Uuid, profile: &UserProfile) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.comfort_level = profile.comfort_level.clone();
            user.time_commitment = profile.time_commitment.clone();
            user.goals = profile.goals.clone();
            user.onboarding_done = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.role = role;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_skills(
        &self,
        user_id: Uuid,
        source: SkillSource,
        skills: &[UserSkill],
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.skills.retain(|s| s.source != source);
            user.skills.extend(skills.iter().cloned());
            user.skills.sort_by(|a, b| {
                b.proficiency
                    .partial_cmp(&a.proficiency)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        Ok(())
    }

    async fn access_token_enc(&self, user_id: Uuid) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tokens_enc
            .get(&user_id)
            .filter(|enc| !enc.is_empty())
            .cloned())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().unwrap().users.len() as i64)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<(Vec<UserSummary>, i64)> {
        let inner = self.inner.lock().unwrap();
        let total = inner.users.len() as i64;
        let mut users = inner.users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let summaries = users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|u| UserSummary {
                id: u.id,
                github_username: u.github_username,
                avatar_url: u.avatar_url,
                role: u.role,
                onboarding_done: u.onboarding_done,
                created_at: u.created_at,
            })
            .collect();
        Ok((summaries, total))
    }
}

#[async_trait]
impl SavedIssueStore for InMemoryStore {
    async fn save(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner
            .saved
            .iter()
            .any(|s| s.user_id == user_id && s.issue_id == issue_id)
        {
            inner.saved.push(SavedLink {
                user_id,
                issue_id,
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn unsave(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .saved
            .retain(|s| !(s.user_id == user_id && s.issue_id == issue_id));
        Ok(())
    }

    async fn is_saved(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .saved
            .iter()
            .any(|s| s.user_id == user_id && s.issue_id == issue_id))
    }

    async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let inner = self.inner.lock().unwrap();
        let mut links: Vec<&SavedLink> =
            inner.saved.iter().filter(|s| s.user_id == user_id).collect();
        let total = links.len() as i64;
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let issues = links
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .filter_map(|link| {
                inner.issues.iter().find(|i| i.id == link.issue_id).map(|i| {
                    let mut issue = Self::hydrate(&inner, i);
                    issue.is_saved = true;
                    issue
                })
            })
            .collect();
        Ok((issues, total))
    }

    async fn saved_ids(&self, user_id: Uuid, issue_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .saved
            .iter()
            .filter(|s| s.user_id == user_id && issue_ids.contains(&s.issue_id))
            .map(|s| s.issue_id)
            .collect())
    }

    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.saved.iter().filter(|s| s.user_id == user_id).count() as i64)
    }
}

#[async_trait]
impl DeepDiveStore for InMemoryStore {
    async fn get(&self, issue_id: Uuid, user_id: Uuid) -> StoreResult<Option<DeepDive>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.deep_dives.get(&(issue_id, user_id)).cloned())
    }

    async fn upsert(&self, dd: &NewDeepDive) -> StoreResult<DeepDive> {
        let mut inner = self.inner.lock().unwrap();
        let key = (dd.issue_id, dd.user_id);
        let id = inner.deep_dives.get(&key).map_or_else(Uuid::new_v4, |d| d.id);
        let stored = DeepDive {
            id,
            issue_id: dd.issue_id,
            user_id: dd.user_id,
            issue_indexed_at: dd.issue_indexed_at,
            project_overview: dd.project_overview.clone(),
            issue_context: dd.issue_context.clone(),
            suggested_approach: dd.suggested_approach.clone(),
            questions_to_ask: dd.questions_to_ask.clone(),
            red_flags: dd.red_flags.clone(),
            first_comment: dd.first_comment.clone(),
            model_used: dd.model_used.clone(),
            prompt_tokens: dd.prompt_tokens,
            completion_tokens: dd.completion_tokens,
            created_at: Utc::now(),
        };
        inner.deep_dives.insert(key, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl CategoryStore for InMemoryStore {
    async fn list(&self) -> StoreResult<Vec<Category>> {
        let inner = self.inner.lock().unwrap();
        let mut categories = inner.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.refresh_tokens.push(RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_vec(),
            expires_at,
        });
        Ok(())
    }

    async fn find_valid(&self, token_hash: &[u8]) -> StoreResult<Option<RefreshToken>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .refresh_tokens
            .iter()
            .find(|t| t.token_hash == token_hash && t.expires_at > Utc::now())
            .cloned())
    }

    async fn delete_by_hash(&self, token_hash: &[u8]) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.refresh_tokens.retain(|t| t.token_hash != token_hash);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.refresh_tokens.retain(|t| t.user_id != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitscout_core::models::IssueStatus;
    use pretty_assertions::assert_eq;

    fn new_repo(github_id: i64) -> NewRepository {
        NewRepository {
            github_id,
            owner: "octo".into(),
            name: format!("repo-{github_id}"),
            description: "a repo".into(),
            stars: 120,
            primary_language: "Rust".into(),
            topics: vec!["cli".into()],
            has_contributing: true,
            health_score: 0.7,
            last_commit_at: Some(Utc::now()),
        }
    }

    fn new_issue(github_id: i64, repo_id: Uuid) -> NewIssue {
        NewIssue {
            github_id,
            repo_id,
            number: github_id as i32,
            title: format!("issue {github_id}"),
            body: "body".into(),
            summary: String::new(),
            labels: vec!["good first issue".into()],
            difficulty: 1,
            time_estimate: "1-2 hours".into(),
            status: IssueStatus::Open,
            comment_count: 0,
            freshness_score: 0.9,
        }
    }

    async fn seeded_user(store: &InMemoryStore) -> User {
        UserStore::upsert(
            store,
            &NewUser {
                github_id: 99,
                github_username: "alice".into(),
                avatar_url: String::new(),
                bio: String::new(),
            },
            b"enc",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_repo_upsert_preserves_curation_fields() {
        let store = InMemoryStore::new();
        let repo = RepoStore::upsert(&store, &new_repo(1)).await.unwrap();

        store
            .update_curation(repo.id, &["curated".into()], "beginner", "active")
            .await
            .unwrap();

        // Re-ingestion with fresh metadata must not clobber curation.
        let mut update = new_repo(1);
        update.stars = 999;
        let updated = RepoStore::upsert(&store, &update).await.unwrap();

        assert_eq!(updated.id, repo.id);
        assert_eq!(updated.stars, 999);
        assert_eq!(updated.tags, vec!["curated".to_string()]);
        assert_eq!(updated.difficulty_level, "beginner");
        assert_eq!(updated.activity_status, "active");
    }

    #[tokio::test]
    async fn test_issue_upsert_keyed_by_github_id_and_repo() {
        let store = InMemoryStore::new();
        let repo_a = RepoStore::upsert(&store, &new_repo(1)).await.unwrap();
        let repo_b = RepoStore::upsert(&store, &new_repo(2)).await.unwrap();

        // Same github issue id under two repos: two distinct rows.
        let a = IssueStore::upsert(&store, &new_issue(10, repo_a.id)).await.unwrap();
        let b = IssueStore::upsert(&store, &new_issue(10, repo_b.id)).await.unwrap();
        assert_ne!(a.id, b.id);

        // Same key again: the row is updated in place, indexed_at refreshed.
        let before = a.indexed_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let again = IssueStore::upsert(&store, &new_issue(10, repo_a.id)).await.unwrap();
        assert_eq!(again.id, a.id);
        assert!(again.indexed_at > before);
        assert_eq!(IssueStore::count(&store).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_feed_filters_languages_and_difficulty() {
        let store = InMemoryStore::new();
        let repo = RepoStore::upsert(&store, &new_repo(1)).await.unwrap();

        let rust_issue = IssueStore::upsert(&store, &new_issue(1, repo.id)).await.unwrap();
        store
            .set_skills(rust_issue.id, &[IssueSkill { language: "Rust".into(), framework: String::new() }])
            .await
            .unwrap();

        let mut go_draft = new_issue(2, repo.id);
        go_draft.difficulty = 3;
        let go_issue = IssueStore::upsert(&store, &go_draft).await.unwrap();
        store
            .set_skills(go_issue.id, &[IssueSkill { language: "Go".into(), framework: String::new() }])
            .await
            .unwrap();

        let filter = FeedFilter {
            languages: vec!["rust".into()],
            ..Default::default()
        };
        let (issues, total) = store.feed(&filter, 20, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(issues[0].id, rust_issue.id);
        assert!(issues[0].skills.iter().any(|s| s.language == "Rust"));

        let filter = FeedFilter {
            difficulty: Some(3),
            ..Default::default()
        };
        let (issues, _) = store.feed(&filter, 20, 0).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, go_issue.id);
    }

    #[tokio::test]
    async fn test_feed_orders_by_freshness_descending() {
        let store = InMemoryStore::new();
        let repo = RepoStore::upsert(&store, &new_repo(1)).await.unwrap();

        let mut stale = new_issue(1, repo.id);
        stale.freshness_score = 0.1;
        let mut fresh = new_issue(2, repo.id);
        fresh.freshness_score = 1.0;
        let stale = IssueStore::upsert(&store, &stale).await.unwrap();
        let fresh = IssueStore::upsert(&store, &fresh).await.unwrap();

        let (issues, _) = store.feed(&FeedFilter::default(), 20, 0).await.unwrap();
        assert_eq!(issues[0].id, fresh.id);
        assert_eq!(issues[1].id, stale.id);
    }

    #[tokio::test]
    async fn test_save_is_idempotent_and_unsave_restores() {
        let store = InMemoryStore::new();
        let repo = RepoStore::upsert(&store, &new_repo(1)).await.unwrap();
        let issue = IssueStore::upsert(&store, &new_issue(1, repo.id)).await.unwrap();
        let user = seeded_user(&store).await;

        store.save(user.id, issue.id).await.unwrap();
        store.save(user.id, issue.id).await.unwrap();
        assert_eq!(store.count_for_user(user.id).await.unwrap(), 1);
        assert!(store.is_saved(user.id, issue.id).await.unwrap());

        store.unsave(user.id, issue.id).await.unwrap();
        assert_eq!(store.count_for_user(user.id).await.unwrap(), 0);
        assert!(!store.is_saved(user.id, issue.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deep_dive_upsert_overwrites_same_pair() {
        let store = InMemoryStore::new();
        let user = seeded_user(&store).await;
        let issue_id = Uuid::new_v4();
        let t0 = Utc::now();

        let first = NewDeepDive {
            issue_id,
            user_id: user.id,
            issue_indexed_at: t0,
            project_overview: "v1".into(),
            issue_context: String::new(),
            suggested_approach: String::new(),
            questions_to_ask: String::new(),
            red_flags: String::new(),
            first_comment: String::new(),
            model_used: "glm-4.5-air".into(),
            prompt_tokens: 10,
            completion_tokens: 5,
        };
        let stored = DeepDiveStore::upsert(&store, &first).await.unwrap();

        let mut second = first.clone();
        second.project_overview = "v2".into();
        let replaced = DeepDiveStore::upsert(&store, &second).await.unwrap();

        assert_eq!(replaced.id, stored.id);
        let fetched = DeepDiveStore::get(&store, issue_id, user.id).await.unwrap().unwrap();
        assert_eq!(fetched.project_overview, "v2");
    }

    #[tokio::test]
    async fn test_repo_delete_cascades_to_issues() {
        let store = InMemoryStore::new();
        let repo = RepoStore::upsert(&store, &new_repo(1)).await.unwrap();
        let issue = IssueStore::upsert(&store, &new_issue(1, repo.id)).await.unwrap();
        let user = seeded_user(&store).await;
        store.save(user.id, issue.id).await.unwrap();

        RepoStore::delete(&store, repo.id).await.unwrap();
        assert_eq!(IssueStore::count(&store).await.unwrap(), 0);
        assert_eq!(store.count_for_user(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_token_expiry_and_rotation() {
        let store = InMemoryStore::new();
        let user = seeded_user(&store).await;

        store
            .insert(user.id, b"hash-live", Utc::now() + chrono::Duration::days(7))
            .await
            .unwrap();
        store
            .insert(user.id, b"hash-dead", Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        assert!(store.find_valid(b"hash-live").await.unwrap().is_some());
        assert!(store.find_valid(b"hash-dead").await.unwrap().is_none());

        store.delete_by_hash(b"hash-live").await.unwrap();
        assert!(store.find_valid(b"hash-live").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_skills_keeps_other_source() {
        let store = InMemoryStore::new();
        let user = seeded_user(&store).await;

        store
            .replace_skills(
                user.id,
                SkillSource::Github,
                &[UserSkill { language: "Rust".into(), proficiency: 0.9, source: SkillSource::Github }],
            )
            .await
            .unwrap();
        store
            .replace_skills(
                user.id,
                SkillSource::Manual,
                &[UserSkill { language: "Go".into(), proficiency: 0.5, source: SkillSource::Manual }],
            )
            .await
            .unwrap();

        // Replacing github skills must not disturb the manual one.
        store
            .replace_skills(
                user.id,
                SkillSource::Github,
                &[UserSkill { language: "Python".into(), proficiency: 0.4, source: SkillSource::Github }],
            )
            .await
            .unwrap();

        let user = UserStore::get(&store, user.id).await.unwrap().unwrap();
        let langs: Vec<&str> = user.skills.iter().map(|s| s.language.as_str()).collect();
        assert!(langs.contains(&"Go"));
        assert!(langs.contains(&"Python"));
        assert!(!langs.contains(&"Rust"));
    }
}
