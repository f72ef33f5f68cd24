// crates/server/src/ingest/indexer.rs
//! Repository indexing and seeding.
//!
//! One indexing pass fetches a repository's metadata, language breakdown,
//! and `CONTRIBUTING.md` probe, recomputes its health score, upserts it,
//! then upserts every contributor-friendly open issue with derived
//! difficulty / time-estimate / freshness and replaces its skill tags.
//! Per-issue failures are contained: one bad issue never aborts a run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use gitscout_core::models::{IssueSkill, IssueStatus, NewIssue, NewRepository};
use gitscout_core::scoring::{
    classify_difficulty, compute_freshness, estimate_time, health_score, HealthSignals,
};
use gitscout_core::store::{IssueStore, RepoStore};
use gitscout_github::types::GitHubRepo;
use gitscout_github::GitHubClient;

use crate::jobs::ProgressHandle;

/// Courtesy delay between seed upserts.
const SEED_SLEEP: Duration = Duration::from_millis(500);
/// Courtesy delay between full index passes.
const INDEX_SLEEP: Duration = Duration::from_secs(1);

/// Seed file locations, tried in order.
const SEED_PATHS: [&str; 2] = ["data/seed_repos.json", "api/data/seed_repos.json"];

#[derive(Debug, Deserialize)]
struct SeedRepo {
    owner: String,
    name: String,
}

pub struct Indexer {
    github: Arc<GitHubClient>,
    repos: Arc<dyn RepoStore>,
    issues: Arc<dyn IssueStore>,
}

impl Indexer {
    pub fn new(
        github: Arc<GitHubClient>,
        repos: Arc<dyn RepoStore>,
        issues: Arc<dyn IssueStore>,
    ) -> Self {
        Self {
            github,
            repos,
            issues,
        }
    }

    /// Index one repository and its labelled open issues.
    pub async fn index_repository(&self, owner: &str, name: &str) -> anyhow::Result<()> {
        let gh_repo = self
            .github
            .get_public_repo(owner, name)
            .await
            .with_context(|| format!("fetching repo {owner}/{name}"))?;

        let languages = match self.github.get_public_repo_languages(owner, name).await {
            Ok(languages) => languages,
            Err(err) => {
                warn!(repo = %format!("{owner}/{name}"), error = %err, "failed to get languages");
                HashMap::new()
            }
        };

        // A missing probe is not an error; any fetch failure means "absent".
        let has_contributing = self
            .github
            .get_public_file_content(owner, name, "CONTRIBUTING.md")
            .await
            .is_ok();

        let last_commit_at = parse_pushed_at(gh_repo.pushed_at.as_deref());
        let description = gh_repo.description.clone().unwrap_or_default();
        let primary_language = gh_repo.language.clone().unwrap_or_default();

        let score = health_score(&HealthSignals {
            stars: gh_repo.stargazers_count,
            last_commit_at,
            has_issues: gh_repo.has_issues,
            has_topics: !gh_repo.topics.is_empty(),
            has_description: !description.is_empty(),
            has_contributing,
        });

        let repo = self
            .repos
            .upsert(&NewRepository {
                github_id: gh_repo.id,
                owner: gh_repo.owner.login.clone(),
                name: gh_repo.name.clone(),
                description,
                stars: gh_repo.stargazers_count,
                primary_language: primary_language.clone(),
                topics: gh_repo.topics.clone(),
                has_contributing,
                health_score: score,
                last_commit_at,
            })
            .await
            .context("upserting repo")?;

        let gh_issues = self
            .github
            .get_public_repo_issues(owner, name)
            .await
            .context("fetching issues")?;

        let issue_count = gh_issues.len();
        for gh_issue in gh_issues {
            let labels = gh_issue.label_names();
            let draft = NewIssue {
                github_id: gh_issue.id,
                repo_id: repo.id,
                number: gh_issue.number,
                title: gh_issue.title,
                body: gh_issue.body.unwrap_or_default(),
                summary: String::new(),
                difficulty: classify_difficulty(&labels),
                time_estimate: estimate_time(&labels).to_string(),
                labels,
                status: IssueStatus::Open,
                comment_count: gh_issue.comments,
                freshness_score: compute_freshness(&gh_issue.updated_at),
            };

            let issue = match self.issues.upsert(&draft).await {
                Ok(issue) => issue,
                Err(err) => {
                    warn!(issue = gh_issue.number, error = %err, "failed to upsert issue");
                    continue;
                }
            };

            let mut skills = Vec::new();
            if !primary_language.is_empty() {
                skills.push(IssueSkill {
                    language: primary_language.clone(),
                    framework: String::new(),
                });
            }
            for language in languages.keys() {
                if *language != primary_language {
                    skills.push(IssueSkill {
                        language: language.clone(),
                        framework: String::new(),
                    });
                }
            }

            if let Err(err) = self.issues.set_skills(issue.id, &skills).await {
                warn!(issue_id = %issue.id, error = %err, "failed to set issue skills");
            }
        }

        info!(repo = %repo.full_name(), issues = issue_count, "indexed repository");
        Ok(())
    }

    /// Re-index every known repository. Per-repo failures are counted, not
    /// fatal.
    pub async fn index_all(&self, progress: ProgressHandle) -> anyhow::Result<()> {
        let repos = self.repos.list_all().await.context("getting repos")?;
        progress.update(0, repos.len());

        let mut failed = 0usize;
        for (i, repo) in repos.iter().enumerate() {
            if let Err(err) = self.index_repository(&repo.owner, &repo.name).await {
                warn!(repo = %repo.full_name(), error = %err, "failed to index");
                failed += 1;
            }
            progress.update(i + 1, repos.len());
            tokio::time::sleep(INDEX_SLEEP).await;
        }

        info!(total = repos.len(), failed, "index run completed");
        Ok(())
    }

    /// Seed repositories from the bundled seed file, then leave issue
    /// indexing to the next index/discovery run.
    pub async fn seed(&self, progress: ProgressHandle) -> anyhow::Result<()> {
        let seeds = read_seed_file().await?;

        info!(total_repos = seeds.len(), "seed started");
        progress.update(0, seeds.len());

        let (mut seeded, mut failed) = (0usize, 0usize);
        for (i, seed) in seeds.iter().enumerate() {
            let full_name = format!("{}/{}", seed.owner, seed.name);

            match self.github.get_public_repo(&seed.owner, &seed.name).await {
                Ok(gh_repo) => {
                    if let Err(err) = self.seed_repo(&gh_repo).await {
                        warn!(repo = %full_name, error = %err, "failed to upsert repo");
                        failed += 1;
                    } else {
                        info!(repo = %full_name, stars = gh_repo.stargazers_count, "seeded repo");
                        seeded += 1;
                    }
                }
                Err(err) => {
                    warn!(repo = %full_name, error = %err, "failed to fetch repo from github");
                    failed += 1;
                }
            }

            progress.update(i + 1, seeds.len());
            tokio::time::sleep(SEED_SLEEP).await;
        }

        info!(seeded, failed, total = seeds.len(), "seed completed");
        Ok(())
    }

    /// Upsert a repository from a search/seed payload with a neutral health
    /// score; a later index pass computes the real one.
    pub async fn seed_repo(&self, gh_repo: &GitHubRepo) -> anyhow::Result<()> {
        self.repos
            .upsert(&NewRepository {
                github_id: gh_repo.id,
                owner: gh_repo.owner.login.clone(),
                name: gh_repo.name.clone(),
                description: gh_repo.description.clone().unwrap_or_default(),
                stars: gh_repo.stargazers_count,
                primary_language: gh_repo.language.clone().unwrap_or_default(),
                topics: gh_repo.topics.clone(),
                has_contributing: false,
                health_score: 0.5,
                last_commit_at: parse_pushed_at(gh_repo.pushed_at.as_deref()),
            })
            .await
            .context("upserting repo")?;
        Ok(())
    }
}

pub(crate) fn parse_pushed_at(pushed_at: Option<&str>) -> Option<DateTime<Utc>> {
    pushed_at
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
}

async fn read_seed_file() -> anyhow::Result<Vec<SeedRepo>> {
    for path in SEED_PATHS {
        match tokio::fs::read(path).await {
            Ok(data) => {
                return serde_json::from_slice(&data)
                    .with_context(|| format!("parsing seed file {path}"));
            }
            Err(_) => continue,
        }
    }
    anyhow::bail!("reading seed file: tried {}", SEED_PATHS.join(", "))
}
