// crates/server/src/deep_dive.rs
//! AI deep-dive generation: an idempotent per-(issue, user) cache around
//! repo-context assembly, a structured completion, and a section parser.
//!
//! A cached row is served while its `issue_indexed_at` is at least the
//! issue's current `indexed_at`; re-indexing the issue invalidates it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use gitscout_core::llm::{CompletionRequest, LlmError, LlmProvider};
use gitscout_core::models::{DeepDive, Issue, NewDeepDive, User};
use gitscout_core::store::{DeepDiveStore, IssueStore, StoreError, UserStore};
use gitscout_github::GitHubClient;

const README_LIMIT: usize = 4000;
const CONTRIBUTING_LIMIT: usize = 3000;

#[derive(Debug, Error)]
pub enum DeepDiveError {
    #[error("deep dive feature is not available: LLM credential not configured")]
    NotConfigured,

    #[error("issue not found")]
    IssueNotFound,

    #[error("generating deep dive: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The six response sections, in their required order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    ProjectOverview,
    IssueContext,
    SuggestedApproach,
    QuestionsToAsk,
    RedFlags,
    FirstComment,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::ProjectOverview,
        Section::IssueContext,
        Section::SuggestedApproach,
        Section::QuestionsToAsk,
        Section::RedFlags,
        Section::FirstComment,
    ];

    fn header(self) -> &'static str {
        match self {
            Section::ProjectOverview => "## PROJECT_OVERVIEW",
            Section::IssueContext => "## ISSUE_CONTEXT",
            Section::SuggestedApproach => "## SUGGESTED_APPROACH",
            Section::QuestionsToAsk => "## QUESTIONS_TO_ASK",
            Section::RedFlags => "## RED_FLAGS",
            Section::FirstComment => "## FIRST_COMMENT",
        }
    }
}

/// All lines between a known header and the next one belong to that
/// section; text before the first header is dropped. Missing sections come
/// back empty.
pub fn parse_sections(text: &str) -> HashMap<Section, String> {
    let mut sections: HashMap<Section, String> =
        Section::ALL.iter().map(|s| (*s, String::new())).collect();

    let mut current: Option<Section> = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(section) = Section::ALL.iter().find(|s| s.header() == trimmed) {
            current = Some(*section);
            continue;
        }
        if let Some(section) = current {
            let buf = sections.get_mut(&section).expect("all sections present");
            buf.push_str(line);
            buf.push('\n');
        }
    }

    for value in sections.values_mut() {
        let trimmed = value.trim();
        *value = trimmed.to_string();
    }
    sections
}

/// Truncate on a char boundary and mark the cut.
fn truncate_excerpt(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("\n... [truncated]");
    text
}

#[derive(Default)]
struct RepoContext {
    readme: String,
    contributing: String,
    languages: HashMap<String, i64>,
}

pub struct DeepDiveService {
    deep_dives: Arc<dyn DeepDiveStore>,
    issues: Arc<dyn IssueStore>,
    users: Arc<dyn UserStore>,
    github: Arc<GitHubClient>,
    llm: Option<Arc<dyn LlmProvider>>,
}

impl DeepDiveService {
    pub fn new(
        deep_dives: Arc<dyn DeepDiveStore>,
        issues: Arc<dyn IssueStore>,
        users: Arc<dyn UserStore>,
        github: Arc<GitHubClient>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self {
            deep_dives,
            issues,
            users,
            github,
            llm,
        }
    }

    pub async fn generate(&self, issue_id: Uuid, user_id: Uuid) -> Result<DeepDive, DeepDiveError> {
        let llm = self.llm.as_ref().ok_or(DeepDiveError::NotConfigured)?;

        let issue = self
            .issues
            .get(issue_id)
            .await?
            .ok_or(DeepDiveError::IssueNotFound)?;

        // Cache hit: the stored row is at least as fresh as the issue.
        if let Some(cached) = self.deep_dives.get(issue_id, user_id).await? {
            if cached.issue_indexed_at >= issue.indexed_at {
                return Ok(cached);
            }
        }

        // Profile is calibration only; a missing user falls back to defaults.
        let user = self.users.get(user_id).await?;

        let repo = issue.repo.as_ref().ok_or(DeepDiveError::IssueNotFound)?;
        let context = self.assemble_repo_context(&repo.owner, &repo.name).await;

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: build_user_message(&issue, user.as_ref(), &context),
        };
        let completion = llm.complete(request).await?;

        let mut sections = parse_sections(&completion.text);
        let dd = NewDeepDive {
            issue_id,
            user_id,
            issue_indexed_at: issue.indexed_at,
            project_overview: sections.remove(&Section::ProjectOverview).unwrap_or_default(),
            issue_context: sections.remove(&Section::IssueContext).unwrap_or_default(),
            suggested_approach: sections.remove(&Section::SuggestedApproach).unwrap_or_default(),
            questions_to_ask: sections.remove(&Section::QuestionsToAsk).unwrap_or_default(),
            red_flags: sections.remove(&Section::RedFlags).unwrap_or_default(),
            first_comment: sections.remove(&Section::FirstComment).unwrap_or_default(),
            model_used: completion.model,
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
        };

        Ok(self.deep_dives.upsert(&dd).await?)
    }

    /// README, CONTRIBUTING, and language mix. Missing files never fail the
    /// operation.
    async fn assemble_repo_context(&self, owner: &str, name: &str) -> RepoContext {
        let mut context = RepoContext::default();

        match self.github.get_public_file_content(owner, name, "README.md").await {
            Ok(readme) => context.readme = truncate_excerpt(readme, README_LIMIT),
            Err(err) => debug!(repo = %format!("{owner}/{name}"), error = %err, "no README found"),
        }

        match self
            .github
            .get_public_file_content(owner, name, "CONTRIBUTING.md")
            .await
        {
            Ok(contributing) => {
                context.contributing = truncate_excerpt(contributing, CONTRIBUTING_LIMIT)
            }
            Err(err) => {
                debug!(repo = %format!("{owner}/{name}"), error = %err, "no CONTRIBUTING.md found")
            }
        }

        match self.github.get_public_repo_languages(owner, name).await {
            Ok(languages) => context.languages = languages,
            Err(err) => {
                debug!(repo = %format!("{owner}/{name}"), error = %err, "failed to get languages")
            }
        }

        context
    }
}

const SYSTEM_PROMPT: &str = r#"You are an expert open-source mentor helping developers contribute to open-source projects. You produce clear, actionable analysis of GitHub issues.

You MUST structure your response with EXACTLY these 6 sections, using these EXACT headers:

## PROJECT_OVERVIEW
What the project does, its tech stack, and how contributions work.

## ISSUE_CONTEXT
A plain-language explanation of what is broken or missing and why it matters.

## SUGGESTED_APPROACH
A numbered checklist of concrete steps for tackling this issue. Format each step as:
1. [ ] Step description
2. [ ] Step description
Include which files/areas to look at and what to test. NOT code, but clear enough to follow.

## QUESTIONS_TO_ASK
3-5 smart questions the contributor should post in the issue thread before starting. Write them as exact copy-pasteable questions — phrased politely and specifically, as if posting on GitHub.

## RED_FLAGS
Warnings about stale issues, duplicate PRs, abandoned repos, or anything else to watch out for. If there are no red flags, say so explicitly.

## FIRST_COMMENT
Write a ready-to-paste GitHub comment that the contributor can post on the issue to express interest and ask for clarification. It should:
- Introduce themselves as interested in working on this
- Mention their relevant skills briefly
- Ask 1-2 of the most important clarifying questions
- Be concise, professional, and friendly

Rules:
- Never write code. Describe approaches in plain language.
- Be honest about difficulty and time estimates.
- Tailor your explanation to the contributor's experience level.
- Be concise but thorough. Each section should be 2-5 sentences or bullet points."#;

fn build_user_message(issue: &Issue, user: Option<&User>, context: &RepoContext) -> String {
    let mut msg = String::new();

    msg.push_str("## CONTRIBUTOR PROFILE\n");
    if let Some(user) = user {
        let _ = writeln!(msg, "- Comfort level: {}", user.comfort_level);
        let _ = writeln!(msg, "- Time commitment: {}", user.time_commitment);
        if !user.skills.is_empty() {
            msg.push_str("- Skills: ");
            for (i, skill) in user.skills.iter().enumerate() {
                if i > 0 {
                    msg.push_str(", ");
                }
                let _ = write!(msg, "{} ({:.0}%)", skill.language, skill.proficiency * 100.0);
            }
            msg.push('\n');
        }
        if !user.goals.is_empty() {
            let _ = writeln!(msg, "- Goals: {}", user.goals.join(", "));
        }
    }

    msg.push_str("\n## REPOSITORY\n");
    if let Some(repo) = &issue.repo {
        let _ = writeln!(msg, "- Name: {}/{}", repo.owner, repo.name);
        let _ = writeln!(msg, "- Description: {}", repo.description);
        let _ = writeln!(msg, "- Stars: {}", repo.stars);
        let _ = writeln!(msg, "- Primary language: {}", repo.primary_language);
        if !repo.topics.is_empty() {
            let _ = writeln!(msg, "- Topics: {}", repo.topics.join(", "));
        }
        let _ = writeln!(msg, "- Health score: {:.2}", repo.health_score);
        let _ = writeln!(msg, "- Has CONTRIBUTING.md: {}", repo.has_contributing);
        if let Some(last_commit) = repo.last_commit_at {
            let _ = writeln!(msg, "- Last commit: {}", last_commit.format("%Y-%m-%d"));
        }
    }

    if !context.languages.is_empty() {
        msg.push_str("\n## LANGUAGE BREAKDOWN\n");
        let total: i64 = context.languages.values().sum();
        if total > 0 {
            let mut entries: Vec<(&String, &i64)> = context.languages.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1));
            for (language, bytes) in entries {
                let pct = *bytes as f64 / total as f64 * 100.0;
                if pct >= 1.0 {
                    let _ = writeln!(msg, "- {language}: {pct:.1}%");
                }
            }
        }
    }

    if !context.readme.is_empty() {
        msg.push_str("\n## README CONTENT\n");
        msg.push_str(&context.readme);
        msg.push('\n');
    }

    if !context.contributing.is_empty() {
        msg.push_str("\n## CONTRIBUTING GUIDE\n");
        msg.push_str(&context.contributing);
        msg.push('\n');
    }

    msg.push_str("\n## ISSUE\n");
    let _ = writeln!(msg, "- Title: {}", issue.title);
    let _ = writeln!(msg, "- Number: #{}", issue.number);
    let _ = writeln!(msg, "- Labels: {}", issue.labels.join(", "));
    let _ = writeln!(msg, "- Difficulty: {}/3", issue.difficulty);
    let _ = writeln!(msg, "- Time estimate: {}", issue.time_estimate);
    let _ = writeln!(msg, "- Comments: {}", issue.comment_count);
    let _ = writeln!(msg, "- Freshness: {:.0}%", issue.freshness_score * 100.0);
    if !issue.body.is_empty() {
        let _ = write!(msg, "\n### Issue body:\n{}\n", issue.body);
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitscout_core::llm::CompletionResponse;
    use gitscout_core::models::{IssueStatus, NewIssue, NewRepository};
    use gitscout_core::store::RepoStore;
    use gitscout_db::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider that counts completion calls.
    struct FakeLlm {
        calls: AtomicUsize,
        response: String,
    }

    impl FakeLlm {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: response.to_string(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for FakeLlm {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse {
                text: self.response.clone(),
                model: "glm-4.5-air".into(),
                prompt_tokens: 100,
                completion_tokens: 50,
            })
        }

        fn model(&self) -> &str {
            "glm-4.5-air"
        }
    }

    const SCRIPTED_RESPONSE: &str = "## PROJECT_OVERVIEW\noverview text\n\n## ISSUE_CONTEXT\ncontext text\n\n## SUGGESTED_APPROACH\n1. [ ] read\n\n## QUESTIONS_TO_ASK\nq1\n\n## RED_FLAGS\nnone\n\n## FIRST_COMMENT\nhi there";

    async fn seeded_issue(store: &InMemoryStore) -> gitscout_core::models::Issue {
        let repo = RepoStore::upsert(
            store,
            &NewRepository {
                github_id: 1,
                owner: "octo".into(),
                name: "demo".into(),
                description: "demo repo".into(),
                stars: 100,
                primary_language: "Rust".into(),
                health_score: 0.8,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        IssueStore::upsert(
            store,
            &NewIssue {
                github_id: 10,
                repo_id: repo.id,
                number: 3,
                title: "Fix flag parsing".into(),
                body: "the flag breaks".into(),
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
        .unwrap()
    }

    fn service_with(
        store: Arc<InMemoryStore>,
        llm: Option<Arc<dyn LlmProvider>>,
        github_url: &str,
    ) -> DeepDiveService {
        let github = Arc::new(GitHubClient::with_base_urls("id", "secret", github_url, github_url));
        DeepDiveService::new(store.clone(), store.clone(), store, github, llm)
    }

    #[test]
    fn test_parse_sections_extracts_all_six() {
        let sections = parse_sections(SCRIPTED_RESPONSE);
        assert_eq!(sections[&Section::ProjectOverview], "overview text");
        assert_eq!(sections[&Section::IssueContext], "context text");
        assert_eq!(sections[&Section::SuggestedApproach], "1. [ ] read");
        assert_eq!(sections[&Section::QuestionsToAsk], "q1");
        assert_eq!(sections[&Section::RedFlags], "none");
        assert_eq!(sections[&Section::FirstComment], "hi there");
    }

    #[test]
    fn test_parse_sections_ignores_preamble_and_unknown_headers() {
        let text = "Sure! Here is the analysis.\n## PROJECT_OVERVIEW\nreal\n## NOT_A_SECTION\nstill overview? no — plain content\n## RED_FLAGS\nflagged";
        let sections = parse_sections(text);
        // Unknown headers are ordinary content lines of the current section.
        assert!(sections[&Section::ProjectOverview].contains("real"));
        assert!(sections[&Section::ProjectOverview].contains("## NOT_A_SECTION"));
        assert_eq!(sections[&Section::RedFlags], "flagged");
        assert_eq!(sections[&Section::FirstComment], "");
    }

    #[test]
    fn test_parse_sections_trims_trailing_whitespace() {
        let text = "## FIRST_COMMENT\nhello\n\n\n";
        let sections = parse_sections(text);
        assert_eq!(sections[&Section::FirstComment], "hello");
    }

    #[test]
    fn test_truncate_excerpt_respects_char_boundaries() {
        let text = "é".repeat(3000);
        let cut = truncate_excerpt(text, 4000);
        assert!(cut.ends_with("[truncated]"));
        assert!(cut.len() <= 4000 + "\n... [truncated]".len());

        let short = truncate_excerpt("tiny".into(), 4000);
        assert_eq!(short, "tiny");
    }

    #[tokio::test]
    async fn test_generate_without_credential_is_not_configured() {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(store, None, "http://127.0.0.1:1");
        let err = service.generate(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DeepDiveError::NotConfigured));
    }

    #[tokio::test]
    async fn test_generate_unknown_issue_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let llm: Arc<dyn LlmProvider> = FakeLlm::new(SCRIPTED_RESPONSE);
        let service = service_with(store, Some(llm), "http://127.0.0.1:1");
        let err = service.generate(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DeepDiveError::IssueNotFound));
    }

    #[tokio::test]
    async fn test_generate_caches_until_reindex() {
        let mut server = mockito::Server::new_async().await;
        // Context fetches 404: missing files must not fail generation.
        server
            .mock("GET", mockito::Matcher::Regex(r"^/repos/.*".into()))
            .with_status(404)
            .with_body("{}")
            .expect_at_least(1)
            .create_async()
            .await;

        let store = Arc::new(InMemoryStore::new());
        let issue = seeded_issue(&store).await;
        let user_id = Uuid::new_v4();

        let fake = FakeLlm::new(SCRIPTED_RESPONSE);
        let llm: Arc<dyn LlmProvider> = fake.clone();
        let service = service_with(store.clone(), Some(llm), &server.url());

        // First call generates and persists.
        let first = service.generate(issue.id, user_id).await.unwrap();
        assert_eq!(first.project_overview, "overview text");
        assert_eq!(first.model_used, "glm-4.5-air");
        assert_eq!(fake.calls(), 1);

        // Second call is a cache hit: no new completion.
        let second = service.generate(issue.id, user_id).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(fake.calls(), 1);

        // Re-index the issue (indexed_at moves forward) -> cache is stale.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        IssueStore::upsert(
            store.as_ref(),
            &NewIssue {
                github_id: issue.github_id,
                repo_id: issue.repo_id,
                number: issue.number,
                title: issue.title.clone(),
                body: issue.body.clone(),
                summary: String::new(),
                labels: issue.labels.clone(),
                difficulty: issue.difficulty,
                time_estimate: issue.time_estimate.clone(),
                status: IssueStatus::Open,
                comment_count: issue.comment_count,
                freshness_score: issue.freshness_score,
            },
        )
        .await
        .unwrap();

        let third = service.generate(issue.id, user_id).await.unwrap();
        assert_eq!(fake.calls(), 2);
        assert!(third.issue_indexed_at > first.issue_indexed_at);
    }

    #[tokio::test]
    async fn test_generate_is_per_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/repos/.*".into()))
            .with_status(404)
            .with_body("{}")
            .expect_at_least(1)
            .create_async()
            .await;

        let store = Arc::new(InMemoryStore::new());
        let issue = seeded_issue(&store).await;
        let fake = FakeLlm::new(SCRIPTED_RESPONSE);
        let llm: Arc<dyn LlmProvider> = fake.clone();
        let service = service_with(store, Some(llm), &server.url());

        service.generate(issue.id, Uuid::new_v4()).await.unwrap();
        service.generate(issue.id, Uuid::new_v4()).await.unwrap();
        // Distinct users never share cache rows.
        assert_eq!(fake.calls(), 2);
    }

    #[test]
    fn test_user_message_includes_profile_and_issue() {
        let mut issue = Issue {
            id: Uuid::new_v4(),
            github_id: 1,
            repo_id: Uuid::new_v4(),
            number: 42,
            title: "Broken link".into(),
            body: "the docs 404".into(),
            summary: String::new(),
            labels: vec!["docs".into()],
            difficulty: 1,
            time_estimate: "1-2 hours".into(),
            status: IssueStatus::Open,
            comment_count: 2,
            freshness_score: 0.9,
            created_at: chrono::Utc::now(),
            indexed_at: chrono::Utc::now(),
            repo: None,
            skills: vec![],
            match_score: None,
            match_reasons: vec![],
            is_saved: false,
        };
        issue.repo = Some(gitscout_core::models::Repository {
            id: Uuid::new_v4(),
            github_id: 1,
            owner: "octo".into(),
            name: "demo".into(),
            description: "a demo".into(),
            stars: 55,
            primary_language: "Rust".into(),
            topics: vec![],
            has_contributing: true,
            health_score: 0.77,
            last_commit_at: None,
            indexed_at: chrono::Utc::now(),
            tags: vec![],
            difficulty_level: String::new(),
            activity_status: String::new(),
        });

        let mut languages = HashMap::new();
        languages.insert("Rust".to_string(), 9900_i64);
        languages.insert("Shell".to_string(), 50_i64);
        let context = RepoContext {
            readme: "readme body".into(),
            contributing: String::new(),
            languages,
        };

        let msg = build_user_message(&issue, None, &context);
        assert!(msg.contains("## REPOSITORY"));
        assert!(msg.contains("- Name: octo/demo"));
        assert!(msg.contains("- Title: Broken link"));
        assert!(msg.contains("- Number: #42"));
        assert!(msg.contains("Rust: 99"));
        // Sub-1% languages are dropped from the breakdown.
        assert!(!msg.contains("Shell"));
        assert!(msg.contains("## README CONTENT"));
        assert!(!msg.contains("## CONTRIBUTING GUIDE"));
    }
}
