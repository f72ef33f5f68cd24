// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gitscout_core::llm::LlmProvider;
use gitscout_core::store::{
    CategoryStore, DeepDiveStore, IssueStore, RefreshTokenStore, RepoStore, SavedIssueStore,
    UserStore,
};
use gitscout_db::memory::InMemoryStore;
use gitscout_db::Database;
use gitscout_github::GitHubClient;

use crate::auth::AuthService;
use crate::config::Config;
use crate::crypto::{Encryptor, JwtManager};
use crate::deep_dive::DeepDiveService;
use crate::ingest::{Discovery, Indexer};
use crate::jobs::JobManager;
use crate::middleware::RateLimiter;

const RATE_LIMIT_PER_MINUTE: u32 = 60;

/// One handle per entity surface, so tests can swap the backend without
/// touching the services.
#[derive(Clone)]
pub struct Stores {
    pub repos: Arc<dyn RepoStore>,
    pub issues: Arc<dyn IssueStore>,
    pub users: Arc<dyn UserStore>,
    pub saved: Arc<dyn SavedIssueStore>,
    pub deep_dives: Arc<dyn DeepDiveStore>,
    pub categories: Arc<dyn CategoryStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl Stores {
    pub fn from_database(db: Database) -> Self {
        let db = Arc::new(db);
        Self {
            repos: db.clone(),
            issues: db.clone(),
            users: db.clone(),
            saved: db.clone(),
            deep_dives: db.clone(),
            categories: db.clone(),
            refresh_tokens: db,
        }
    }

    pub fn from_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            repos: store.clone(),
            issues: store.clone(),
            users: store.clone(),
            saved: store.clone(),
            deep_dives: store.clone(),
            categories: store.clone(),
            refresh_tokens: store,
        }
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub start_time: Instant,
    pub config: Config,
    pub repos: Arc<dyn RepoStore>,
    pub issues: Arc<dyn IssueStore>,
    pub users: Arc<dyn UserStore>,
    pub saved: Arc<dyn SavedIssueStore>,
    pub categories: Arc<dyn CategoryStore>,
    pub github: Arc<GitHubClient>,
    pub encryptor: Encryptor,
    pub jwt: JwtManager,
    pub jobs: Arc<JobManager>,
    pub indexer: Arc<Indexer>,
    pub discovery: Arc<Discovery>,
    pub deep_dive: DeepDiveService,
    pub auth: AuthService,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        github: Arc<GitHubClient>,
        llm: Option<Arc<dyn LlmProvider>>,
        encryptor: Encryptor,
        jwt: JwtManager,
    ) -> Arc<Self> {
        let jobs = Arc::new(JobManager::new());
        let indexer = Arc::new(Indexer::new(
            github.clone(),
            stores.repos.clone(),
            stores.issues.clone(),
        ));
        let discovery = Arc::new(Discovery::new(
            github.clone(),
            stores.repos.clone(),
            indexer.clone(),
            jobs.clone(),
        ));
        let deep_dive = DeepDiveService::new(
            stores.deep_dives.clone(),
            stores.issues.clone(),
            stores.users.clone(),
            github.clone(),
            llm,
        );
        let auth = AuthService::new(
            github.clone(),
            stores.users.clone(),
            stores.refresh_tokens.clone(),
            encryptor.clone(),
            jwt.clone(),
            config.admin_github_username.clone(),
        );

        Arc::new(Self {
            start_time: Instant::now(),
            config,
            repos: stores.repos,
            issues: stores.issues,
            users: stores.users,
            saved: stores.saved,
            categories: stores.categories,
            github,
            encryptor,
            jwt,
            jobs,
            indexer,
            discovery,
            deep_dive,
            auth,
            rate_limiter: RateLimiter::new(RATE_LIMIT_PER_MINUTE, Duration::from_secs(60)),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
