// crates/server/src/ingest/discovery.rs
//! Repository discovery: a rotating set of search queries, diffed against
//! the known-repo set, budget-bounded, feeding straight into indexing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use chrono::{Months, Utc};
use tracing::{info, warn};

use gitscout_core::models::{Job, JobType};
use gitscout_core::store::RepoStore;
use gitscout_github::types::GitHubRepo;
use gitscout_github::GitHubClient;

use super::indexer::{parse_pushed_at, Indexer};
use crate::jobs::{JobError, JobManager};

/// Search queries rotated across runs. Six are consumed per run, so the
/// full list cycles roughly every two and a half runs.
const DISCOVERY_QUERIES: [(&str, &str); 14] = [
    ("good-first-issues:>10 stars:>500 pushed:>2025-01-01", "good-first-issues-popular"),
    ("good-first-issues:>3 stars:>100 pushed:>2025-01-01", "good-first-issues-emerging"),
    ("help-wanted-issues:>5 stars:>200 pushed:>2025-01-01", "help-wanted"),
    ("topic:hacktoberfest stars:>200 pushed:>2025-01-01", "hacktoberfest"),
    ("topic:good-first-issue stars:>100 pushed:>2025-01-01", "topic-gfi"),
    ("topic:beginner-friendly stars:>50 pushed:>2025-01-01", "beginner-friendly"),
    ("good-first-issues:>3 language:python stars:>100", "python"),
    ("good-first-issues:>3 language:javascript stars:>100", "javascript"),
    ("good-first-issues:>3 language:typescript stars:>100", "typescript"),
    ("good-first-issues:>3 language:go stars:>100", "go"),
    ("good-first-issues:>3 language:rust stars:>100", "rust"),
    ("good-first-issues:>3 language:java stars:>100", "java"),
    ("good-first-issues:>5 stars:>300 sort:updated", "recently-updated"),
    ("help-wanted-issues:>10 stars:>1000", "major-projects"),
];

const QUERIES_PER_RUN: usize = 6;
const MAX_NEW_PER_RUN: usize = 50;
const MIN_STARS: i32 = 50;
const STALE_CUTOFF_MONTHS: u32 = 6;
const SEARCH_SLEEP: Duration = Duration::from_secs(2);
const SEED_SLEEP: Duration = Duration::from_millis(500);

pub struct Discovery {
    github: Arc<GitHubClient>,
    repos: Arc<dyn RepoStore>,
    indexer: Arc<Indexer>,
    jobs: Arc<JobManager>,
    /// Rotating offset into `DISCOVERY_QUERIES`.
    query_offset: Mutex<usize>,
}

impl Discovery {
    pub fn new(
        github: Arc<GitHubClient>,
        repos: Arc<dyn RepoStore>,
        indexer: Arc<Indexer>,
        jobs: Arc<JobManager>,
    ) -> Self {
        Self {
            github,
            repos,
            indexer,
            jobs,
            query_offset: Mutex::new(0),
        }
    }

    /// Start a discovery run through the job manager. Returns
    /// `already-running` while a previous run is still going.
    pub fn discover(self: &Arc<Self>) -> Result<Job, JobError> {
        let offset = {
            let mut cursor = self.query_offset.lock().expect("discovery cursor lock");
            let offset = *cursor;
            *cursor = (*cursor + QUERIES_PER_RUN) % DISCOVERY_QUERIES.len();
            offset
        };

        let queries: Vec<(&'static str, &'static str)> = (0..QUERIES_PER_RUN)
            .map(|i| DISCOVERY_QUERIES[(offset + i) % DISCOVERY_QUERIES.len()])
            .collect();

        let service = Arc::clone(self);
        self.jobs.start_job(JobType::Discovery, move |progress| async move {
            service.run(queries, progress).await
        })
    }

    async fn run(
        &self,
        queries: Vec<(&'static str, &'static str)>,
        progress: crate::jobs::ProgressHandle,
    ) -> anyhow::Result<()> {
        let existing = self
            .repos
            .all_github_ids()
            .await
            .context("loading existing github ids")?;
        let mut known: HashSet<i64> = existing.iter().copied().collect();

        info!(existing_repos = existing.len(), queries = queries.len(), "discovery started");

        let stale_cutoff = Utc::now()
            .checked_sub_months(Months::new(STALE_CUTOFF_MONTHS))
            .expect("cutoff in range");

        let mut candidates: Vec<GitHubRepo> = Vec::new();
        for (i, (query, label)) in queries.iter().enumerate() {
            info!(query = label, progress = format!("{}/{}", i + 1, queries.len()), "discovery: searching");

            let result = match self.github.search_repositories(query, 1).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(query = label, error = %err, "discovery: search failed");
                    tokio::time::sleep(SEARCH_SLEEP).await;
                    continue;
                }
            };

            for repo in result.items {
                if known.contains(&repo.id) {
                    continue;
                }
                if repo.stargazers_count < MIN_STARS {
                    continue;
                }
                // An absent or unparsable timestamp passes the cutoff.
                if let Some(pushed) = parse_pushed_at(repo.pushed_at.as_deref()) {
                    if pushed < stale_cutoff {
                        continue;
                    }
                }
                known.insert(repo.id);
                candidates.push(repo);
                if candidates.len() >= MAX_NEW_PER_RUN {
                    break;
                }
            }

            if candidates.len() >= MAX_NEW_PER_RUN {
                break;
            }
            tokio::time::sleep(SEARCH_SLEEP).await;
        }

        info!(count = candidates.len(), "discovery: found new repos");
        if candidates.is_empty() {
            progress.update(1, 1);
            return Ok(());
        }

        let total = candidates.len();
        progress.update(0, total);

        let (mut seeded, mut failed) = (0usize, 0usize);
        for (i, candidate) in candidates.iter().enumerate() {
            let full_name = format!("{}/{}", candidate.owner.login, candidate.name);

            if let Err(err) = self.indexer.seed_repo(candidate).await {
                warn!(repo = %full_name, error = %err, "discovery: failed to upsert");
                failed += 1;
                progress.update(i + 1, total);
                tokio::time::sleep(SEED_SLEEP).await;
                continue;
            }

            // Index issues immediately; a failed index still counts the
            // repo as seeded.
            if let Err(err) = self
                .indexer
                .index_repository(&candidate.owner.login, &candidate.name)
                .await
            {
                warn!(repo = %full_name, error = %err, "discovery: failed to index");
            }

            info!(
                repo = %full_name,
                stars = candidate.stargazers_count,
                language = candidate.language.as_deref().unwrap_or(""),
                "discovery: seeded+indexed"
            );
            seeded += 1;
            progress.update(i + 1, total);
            tokio::time::sleep(SEED_SLEEP).await;
        }

        info!(seeded, failed, total_found = total, "discovery completed");
        Ok(())
    }
}
