// crates/server/src/testutil.rs
//! Shared helpers for handler tests: in-memory state, seeded entities, and
//! auth headers.

use std::sync::Arc;
use std::time::Duration;

use gitscout_core::llm::LlmProvider;
use gitscout_core::models::{
    Issue, IssueSkill, IssueStatus, NewIssue, NewRepository, NewUser, Repository, Role, User,
};
use gitscout_core::store::{IssueStore, RepoStore, UserStore};
use gitscout_db::memory::InMemoryStore;
use gitscout_github::GitHubClient;

use crate::config::Config;
use crate::crypto::{Encryptor, JwtManager};
use crate::state::{AppState, Stores};

pub(crate) fn test_config() -> Config {
    Config {
        port: 0,
        database_url: "postgres://unused".into(),
        redis_url: None,
        github_client_id: "test-client".into(),
        github_client_secret: "test-secret".into(),
        encrypt_key: "ab".repeat(32),
        jwt_secret: "test-jwt-secret".into(),
        frontend_url: "http://localhost:5173".into(),
        backend_url: "http://localhost:8080".into(),
        cookie_domain: "localhost".into(),
        env: "development".into(),
        admin_github_username: None,
        glm_api_key: None,
        discovery_interval: Some(Duration::from_secs(3600)),
    }
}

/// State over a fresh in-memory store. The GitHub client points at a
/// closed local port; tests that exercise upstream calls pass a mockito
/// URL instead.
pub(crate) fn test_state() -> (Arc<AppState>, Arc<InMemoryStore>) {
    test_state_with("http://127.0.0.1:9", None)
}

pub(crate) fn test_state_with(
    github_url: &str,
    llm: Option<Arc<dyn LlmProvider>>,
) -> (Arc<AppState>, Arc<InMemoryStore>) {
    let config = test_config();
    let store = Arc::new(InMemoryStore::new());
    let github = Arc::new(GitHubClient::with_base_urls(
        config.github_client_id.clone(),
        config.github_client_secret.clone(),
        github_url,
        github_url,
    ));
    let encryptor = Encryptor::from_hex_key(&config.encrypt_key).unwrap();
    let jwt = JwtManager::new(&config.jwt_secret);
    let state = AppState::new(
        config,
        Stores::from_memory(store.clone()),
        github,
        llm,
        encryptor,
        jwt,
    );
    (state, store)
}

pub(crate) fn bearer(state: &AppState, user: &User) -> String {
    format!("Bearer {}", state.jwt.generate(user.id).unwrap())
}

pub(crate) async fn create_user(store: &InMemoryStore, github_id: i64, username: &str) -> User {
    UserStore::upsert(
        store,
        &NewUser {
            github_id,
            github_username: username.into(),
            avatar_url: String::new(),
            bio: String::new(),
        },
        b"token-enc",
    )
    .await
    .unwrap()
}

pub(crate) async fn create_admin(store: &InMemoryStore, github_id: i64, username: &str) -> User {
    let user = create_user(store, github_id, username).await;
    store.update_role(user.id, Role::Admin).await.unwrap();
    UserStore::get(store, user.id).await.unwrap().unwrap()
}

pub(crate) async fn create_repo(store: &InMemoryStore, github_id: i64, name: &str) -> Repository {
    RepoStore::upsert(
        store,
        &NewRepository {
            github_id,
            owner: "octo".into(),
            name: name.into(),
            description: "demo".into(),
            stars: 200,
            primary_language: "Rust".into(),
            topics: vec!["tooling".into()],
            has_contributing: true,
            health_score: 0.8,
            last_commit_at: Some(chrono::Utc::now()),
        },
    )
    .await
    .unwrap()
}

pub(crate) async fn create_issue(
    store: &InMemoryStore,
    repo: &Repository,
    github_id: i64,
    title: &str,
    languages: &[&str],
) -> Issue {
    let issue = IssueStore::upsert(
        store,
        &NewIssue {
            github_id,
            repo_id: repo.id,
            number: github_id as i32,
            title: title.into(),
            body: "body text".into(),
            summary: String::new(),
            labels: vec!["good first issue".into()],
            difficulty: 1,
            time_estimate: "1-2 hours".into(),
            status: IssueStatus::Open,
            comment_count: 0,
            freshness_score: 0.9,
        },
    )
    .await
    .unwrap();

    let skills: Vec<IssueSkill> = languages
        .iter()
        .map(|l| IssueSkill {
            language: (*l).into(),
            framework: String::new(),
        })
        .collect();
    store.set_skills(issue.id, &skills).await.unwrap();
    issue
}
