// crates/github/src/types.rs
//! Wire types for the GitHub REST API. Fields default where the API omits
//! them (null descriptions, missing topics, etc.).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoOwner {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: i64,
    #[serde(default)]
    pub owner: RepoOwner,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: i32,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub has_issues: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    pub id: i64,
    pub number: i32,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(default)]
    pub comments: i32,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl GitHubIssue {
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubComment {
    pub id: i64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSearchResult {
    #[serde(default)]
    pub total_count: i64,
    #[serde(default)]
    pub items: Vec<GitHubRepo>,
}

/// One pull request as returned by the issue-search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchedPullRequest {
    pub id: i64,
    pub number: i32,
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub repository_url: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(default)]
    pub merged_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrSearchResult {
    #[serde(default)]
    pub total_count: i64,
    #[serde(default)]
    pub items: Vec<SearchedPullRequest>,
}

/// `GET /repos/{owner}/{repo}/contents/{path}` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FileContent {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct OAuthTokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
