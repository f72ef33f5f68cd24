// crates/github/src/lib.rs
//! Typed GitHub REST client.
//!
//! Two authorization modes:
//! - **app-basic** — the platform's client id/secret as Basic credentials,
//!   used for all public reads (raises the rate-limit ceiling).
//! - **user-bearer** — a user's own access token, used only for reads on
//!   that user's behalf.
//!
//! Non-2xx responses surface as [`GitHubError::Api`] with the status code
//! and a bounded prefix of the body.

pub mod types;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use base64::Engine;
use serde::de::DeserializeOwned;
use thiserror::Error;

use gitscout_core::scoring::ISSUE_LABELS;
use types::{
    FileContent, GitHubComment, GitHubIssue, GitHubRepo, GitHubUser, OAuthTokenResponse,
    PrSearchResult, RepoSearchResult,
};

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_OAUTH_URL: &str = "https://github.com";
const ACCEPT_JSON: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("gitscout/", env!("CARGO_PKG_VERSION"));

/// Listings and metadata reads.
const LIST_TIMEOUT: Duration = Duration::from_secs(15);
/// Single-file fetches can be larger (README blobs).
const FILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum error-body bytes echoed into error messages.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("github api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("github transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oauth exchange rejected: {0}")]
    OAuth(String),

    #[error("unexpected file encoding: {0}")]
    FileEncoding(String),
}

enum Auth<'a> {
    /// Platform client id/secret as Basic credentials.
    App,
    /// A user's own access token.
    Bearer(&'a str),
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl GitHubClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_base_urls(client_id, client_secret, DEFAULT_API_URL, DEFAULT_OAUTH_URL)
    }

    /// Point the client at different endpoints (tests).
    pub fn with_base_urls(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_url: impl Into<String>,
        oauth_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .expect("reqwest client"),
            api_url: api_url.into(),
            oauth_url: oauth_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    // ── OAuth ────────────────────────────────────────────────────────

    /// The GitHub authorize URL to redirect a logging-in user to.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/login/oauth/authorize?client_id={}&redirect_uri={}&scope=read%3Auser%20user%3Aemail&state={}",
            self.oauth_url,
            self.client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Exchange an OAuth code for the user's access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, GitHubError> {
        let url = format!("{}/login/oauth/access_token", self.oauth_url);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(LIST_TIMEOUT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().await.ok()));
        }

        let token: OAuthTokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(GitHubError::OAuth(
                token
                    .error_description
                    .unwrap_or_else(|| "no access token in response".into()),
            ));
        }
        Ok(token.access_token)
    }

    // ── User-bearer reads ────────────────────────────────────────────

    pub async fn get_authenticated_user(&self, token: &str) -> Result<GitHubUser, GitHubError> {
        self.get_json(&format!("{}/user", self.api_url), &[], Auth::Bearer(token), LIST_TIMEOUT)
            .await
    }

    /// The user's own repositories, most recently pushed first.
    pub async fn get_user_repos(&self, token: &str) -> Result<Vec<GitHubRepo>, GitHubError> {
        self.get_json(
            &format!("{}/user/repos", self.api_url),
            &[
                ("per_page", "100".to_string()),
                ("sort", "pushed".to_string()),
                ("affiliation", "owner".to_string()),
            ],
            Auth::Bearer(token),
            LIST_TIMEOUT,
        )
        .await
    }

    pub async fn get_repo_languages(
        &self,
        token: &str,
        owner: &str,
        name: &str,
    ) -> Result<HashMap<String, i64>, GitHubError> {
        self.get_json(
            &format!("{}/repos/{owner}/{name}/languages", self.api_url),
            &[],
            Auth::Bearer(token),
            LIST_TIMEOUT,
        )
        .await
    }

    // ── App-basic (public) reads ─────────────────────────────────────

    pub async fn get_public_repo(&self, owner: &str, name: &str) -> Result<GitHubRepo, GitHubError> {
        self.get_json(
            &format!("{}/repos/{owner}/{name}", self.api_url),
            &[],
            Auth::App,
            LIST_TIMEOUT,
        )
        .await
    }

    pub async fn get_public_repo_languages(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<HashMap<String, i64>, GitHubError> {
        self.get_json(
            &format!("{}/repos/{owner}/{name}/languages", self.api_url),
            &[],
            Auth::App,
            LIST_TIMEOUT,
        )
        .await
    }

    /// Fetch one file's decoded content via the contents API.
    pub async fn get_public_file_content(
        &self,
        owner: &str,
        name: &str,
        path: &str,
    ) -> Result<String, GitHubError> {
        let file: FileContent = self
            .get_json(
                &format!("{}/repos/{owner}/{name}/contents/{path}", self.api_url),
                &[],
                Auth::App,
                FILE_TIMEOUT,
            )
            .await?;

        if file.encoding != "base64" {
            return Err(GitHubError::FileEncoding(file.encoding));
        }
        // The API wraps base64 at 60 columns; strip the newlines first.
        let compact: String = file.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| GitHubError::FileEncoding(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Open issues carrying any of the contributor-friendly labels.
    ///
    /// The API AND-combines labels within one call, so this issues one call
    /// per label and merges the results, deduplicating by issue id.
    pub async fn get_public_repo_issues(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<GitHubIssue>, GitHubError> {
        let url = format!("{}/repos/{owner}/{name}/issues", self.api_url);
        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for label in ISSUE_LABELS {
            let batch: Vec<GitHubIssue> = self
                .get_json(
                    &url,
                    &[
                        ("state", "open".to_string()),
                        ("per_page", "100".to_string()),
                        ("labels", label.to_string()),
                    ],
                    Auth::App,
                    LIST_TIMEOUT,
                )
                .await?;
            for issue in batch {
                if seen.insert(issue.id) {
                    merged.push(issue);
                }
            }
        }

        Ok(merged)
    }

    pub async fn get_public_issue_comments(
        &self,
        owner: &str,
        name: &str,
        number: i32,
    ) -> Result<Vec<GitHubComment>, GitHubError> {
        self.get_json(
            &format!("{}/repos/{owner}/{name}/issues/{number}/comments", self.api_url),
            &[("per_page", "100".to_string())],
            Auth::App,
            LIST_TIMEOUT,
        )
        .await
    }

    /// One page of the repository-search endpoint.
    pub async fn search_repositories(
        &self,
        query: &str,
        page: i32,
    ) -> Result<RepoSearchResult, GitHubError> {
        self.get_json(
            &format!("{}/search/repositories", self.api_url),
            &[
                ("q", query.to_string()),
                ("page", page.to_string()),
                ("per_page", "30".to_string()),
            ],
            Auth::App,
            LIST_TIMEOUT,
        )
        .await
    }

    /// Search a user's pull requests, optionally only merged ones.
    pub async fn get_user_prs(
        &self,
        username: &str,
        merged: bool,
        page: i32,
        per_page: i32,
    ) -> Result<PrSearchResult, GitHubError> {
        let mut q = format!("type:pr author:{username}");
        if merged {
            q.push_str(" is:merged");
        }
        self.get_json(
            &format!("{}/search/issues", self.api_url),
            &[
                ("q", q),
                ("sort", "created".to_string()),
                ("order", "desc".to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ],
            Auth::App,
            LIST_TIMEOUT,
        )
        .await
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        auth: Auth<'_>,
        timeout: Duration,
    ) -> Result<T, GitHubError> {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_JSON)
            .timeout(timeout)
            .query(query);

        request = match auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::App if !self.client_id.is_empty() => {
                request.basic_auth(&self.client_id, Some(&self.client_secret))
            }
            Auth::App => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().await.ok()));
        }
        Ok(response.json().await?)
    }
}

fn api_error(status: u16, body: Option<String>) -> GitHubError {
    let mut body = body.unwrap_or_default();
    body.truncate(MAX_ERROR_BODY);
    GitHubError::Api { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> GitHubClient {
        GitHubClient::with_base_urls("client-id", "client-secret", server.url(), server.url())
    }

    #[tokio::test]
    async fn test_get_public_repo_uses_app_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        // "client-id:client-secret" base64-encoded.
        let mock = server
            .mock("GET", "/repos/rust-lang/cargo")
            .match_header(
                "authorization",
                "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=",
            )
            .with_status(200)
            .with_body(
                r#"{"id": 9, "owner": {"login": "rust-lang"}, "name": "cargo",
                    "description": "package manager", "stargazers_count": 11000,
                    "language": "Rust", "topics": ["build-tool"],
                    "pushed_at": "2025-05-01T10:00:00Z", "has_issues": true}"#,
            )
            .create_async()
            .await;

        let repo = client(&server).get_public_repo("rust-lang", "cargo").await.unwrap();
        assert_eq!(repo.id, 9);
        assert_eq!(repo.language.as_deref(), Some("Rust"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_2xx_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/ghost/none")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let err = client(&server).get_public_repo("ghost", "none").await.unwrap_err();
        match err {
            GitHubError::Api { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("Not Found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_issue_listing_merges_labels_and_dedupes() {
        let mut server = mockito::Server::new_async().await;
        let issue = |id: i64, label: &str| {
            format!(
                r#"{{"id": {id}, "number": {id}, "title": "issue {id}",
                    "labels": [{{"name": "{label}"}}], "comments": 0, "state": "open",
                    "created_at": "2025-01-01T00:00:00Z", "updated_at": "2025-01-02T00:00:00Z"}}"#
            )
        };

        for label in ISSUE_LABELS {
            let body = match label {
                // Issue 1 appears under two labels; it must come back once.
                "good first issue" => format!("[{},{}]", issue(1, label), issue(2, label)),
                "help wanted" => format!("[{}]", issue(1, label)),
                "easy" => format!("[{}]", issue(3, label)),
                _ => "[]".to_string(),
            };
            server
                .mock("GET", "/repos/o/n/issues")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("state".into(), "open".into()),
                    Matcher::UrlEncoded("labels".into(), label.into()),
                ]))
                .with_status(200)
                .with_body(body)
                .create_async()
                .await;
        }

        let issues = client(&server).get_public_repo_issues("o", "n").await.unwrap();
        let mut ids: Vec<i64> = issues.iter().map(|i| i.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_file_content_is_base64_decoded() {
        let mut server = mockito::Server::new_async().await;
        // "# Contributing\n" base64-encoded, wrapped as the API does.
        server
            .mock("GET", "/repos/o/n/contents/CONTRIBUTING.md")
            .with_status(200)
            .with_body(r#"{"content": "IyBDb250cmli\ndXRpbmcK", "encoding": "base64"}"#)
            .create_async()
            .await;

        let content = client(&server)
            .get_public_file_content("o", "n", "CONTRIBUTING.md")
            .await
            .unwrap();
        assert_eq!(content, "# Contributing\n");
    }

    #[tokio::test]
    async fn test_file_content_rejects_unknown_encoding() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/n/contents/README.md")
            .with_status(200)
            .with_body(r#"{"content": "0000", "encoding": "utf-16"}"#)
            .create_async()
            .await;

        assert!(matches!(
            client(&server).get_public_file_content("o", "n", "README.md").await,
            Err(GitHubError::FileEncoding(_))
        ));
    }

    #[tokio::test]
    async fn test_search_repositories_passes_query_and_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/repositories")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "stars:>500 good-first-issues:>10".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("per_page".into(), "30".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"total_count": 1, "items": [{"id": 7, "owner": {"login": "a"}, "name": "b"}]}"#)
            .create_async()
            .await;

        let result = client(&server)
            .search_repositories("stars:>500 good-first-issues:>10", 1)
            .await
            .unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.items[0].id, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_user_prs_builds_merged_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/issues")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "type:pr author:octocat is:merged".into()),
                Matcher::UrlEncoded("per_page".into(), "30".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"total_count": 1, "items": [{
                    "id": 44, "number": 12, "title": "Fix panic",
                    "html_url": "https://github.com/o/n/pull/12",
                    "repository_url": "https://api.github.com/repos/o/n",
                    "state": "closed",
                    "pull_request": {"merged_at": "2025-03-01T09:00:00Z"}
                }]}"#,
            )
            .create_async()
            .await;

        let result = client(&server).get_user_prs("octocat", true, 1, 30).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert!(result.items[0].pull_request.as_ref().unwrap().merged_at.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_user_bearer_reads_send_bearer_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer gho_token")
            .with_status(200)
            .with_body(r#"{"id": 1, "login": "octocat", "avatar_url": "", "bio": null}"#)
            .create_async()
            .await;

        let user = client(&server).get_authenticated_user("gho_token").await.unwrap();
        assert_eq!(user.login, "octocat");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_code_returns_access_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login/oauth/access_token")
            .with_status(200)
            .with_body(r#"{"access_token": "gho_abc", "token_type": "bearer"}"#)
            .create_async()
            .await;

        let token = client(&server).exchange_code("code-123").await.unwrap();
        assert_eq!(token, "gho_abc");
    }

    #[tokio::test]
    async fn test_exchange_code_without_token_is_oauth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login/oauth/access_token")
            .with_status(200)
            .with_body(r#"{"error": "bad_verification_code", "error_description": "The code is incorrect"}"#)
            .create_async()
            .await;

        match client(&server).exchange_code("nope").await {
            Err(GitHubError::OAuth(msg)) => assert!(msg.contains("incorrect")),
            other => panic!("expected OAuth error, got {other:?}"),
        }
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let client = GitHubClient::new("id-1", "secret");
        let url = client.authorize_url("http://localhost:8080/auth/github/callback", "st/ate");
        assert!(url.starts_with("https://github.com/login/oauth/authorize?client_id=id-1"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fgithub%2Fcallback"));
        assert!(url.contains("state=st%2Fate"));
    }
}
