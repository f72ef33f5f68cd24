// crates/db/src/queries/row_types.rs
//! sqlx row structs and their conversions into domain models. FromRow is
//! implemented by hand: the sqlx macros feature stays off.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use gitscout_core::models::{
    Issue, IssueSkill, IssueStatus, RefreshToken, Repository, Role, SkillSource, User, UserSkill,
    UserSummary,
};

#[derive(Debug)]
pub struct RepoRow {
    pub id: Uuid,
    pub github_id: i64,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub stars: i32,
    pub primary_language: String,
    pub topics: Vec<String>,
    pub has_contributing: bool,
    pub health_score: f64,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub indexed_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub difficulty_level: String,
    pub activity_status: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for RepoRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            github_id: row.try_get("github_id")?,
            owner: row.try_get("owner")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            stars: row.try_get("stars")?,
            primary_language: row.try_get("primary_language")?,
            topics: row.try_get("topics")?,
            has_contributing: row.try_get("has_contributing")?,
            health_score: row.try_get("health_score")?,
            last_commit_at: row.try_get("last_commit_at")?,
            indexed_at: row.try_get("indexed_at")?,
            tags: row.try_get("tags")?,
            difficulty_level: row.try_get("difficulty_level")?,
            activity_status: row.try_get("activity_status")?,
        })
    }
}

impl From<RepoRow> for Repository {
    fn from(row: RepoRow) -> Self {
        Repository {
            id: row.id,
            github_id: row.github_id,
            owner: row.owner,
            name: row.name,
            description: row.description,
            stars: row.stars,
            primary_language: row.primary_language,
            topics: row.topics,
            has_contributing: row.has_contributing,
            health_score: row.health_score,
            last_commit_at: row.last_commit_at,
            indexed_at: row.indexed_at,
            tags: row.tags,
            difficulty_level: row.difficulty_level,
            activity_status: row.activity_status,
        }
    }
}

/// Issue joined with its repository (`r_`-prefixed aliases).
#[derive(Debug)]
pub struct IssueRow {
    pub id: Uuid,
    pub github_id: i64,
    pub repo_id: Uuid,
    pub number: i32,
    pub title: String,
    pub body: String,
    pub summary: String,
    pub labels: Vec<String>,
    pub difficulty: i32,
    pub time_estimate: String,
    pub status: String,
    pub comment_count: i32,
    pub freshness_score: f64,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub repo: RepoRow,
}

/// Column list matching [`IssueRow`], for reuse across feed/search/detail.
pub const ISSUE_COLUMNS: &str = r#"
    i.id, i.github_id, i.repo_id, i.number, i.title, i.body, i.summary,
    i.labels, i.difficulty, i.time_estimate, i.status, i.comment_count,
    i.freshness_score, i.created_at, i.indexed_at,
    r.id AS r_id, r.github_id AS r_github_id, r.owner AS r_owner,
    r.name AS r_name, r.description AS r_description, r.stars AS r_stars,
    r.primary_language AS r_primary_language, r.topics AS r_topics,
    r.has_contributing AS r_has_contributing, r.health_score AS r_health_score,
    r.last_commit_at AS r_last_commit_at, r.indexed_at AS r_indexed_at,
    r.tags AS r_tags, r.difficulty_level AS r_difficulty_level,
    r.activity_status AS r_activity_status
"#;

impl<'r> sqlx::FromRow<'r, PgRow> for IssueRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            github_id: row.try_get("github_id")?,
            repo_id: row.try_get("repo_id")?,
            number: row.try_get("number")?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            summary: row.try_get("summary")?,
            labels: row.try_get("labels")?,
            difficulty: row.try_get("difficulty")?,
            time_estimate: row.try_get("time_estimate")?,
            status: row.try_get("status")?,
            comment_count: row.try_get("comment_count")?,
            freshness_score: row.try_get("freshness_score")?,
            created_at: row.try_get("created_at")?,
            indexed_at: row.try_get("indexed_at")?,
            repo: RepoRow {
                id: row.try_get("r_id")?,
                github_id: row.try_get("r_github_id")?,
                owner: row.try_get("r_owner")?,
                name: row.try_get("r_name")?,
                description: row.try_get("r_description")?,
                stars: row.try_get("r_stars")?,
                primary_language: row.try_get("r_primary_language")?,
                topics: row.try_get("r_topics")?,
                has_contributing: row.try_get("r_has_contributing")?,
                health_score: row.try_get("r_health_score")?,
                last_commit_at: row.try_get("r_last_commit_at")?,
                indexed_at: row.try_get("r_indexed_at")?,
                tags: row.try_get("r_tags")?,
                difficulty_level: row.try_get("r_difficulty_level")?,
                activity_status: row.try_get("r_activity_status")?,
            },
        })
    }
}

impl IssueRow {
    pub fn into_issue(self, skills: Vec<IssueSkill>) -> Issue {
        let status = self.status.parse().unwrap_or(IssueStatus::Open);
        Issue {
            id: self.id,
            github_id: self.github_id,
            repo_id: self.repo_id,
            number: self.number,
            title: self.title,
            body: self.body,
            summary: self.summary,
            labels: self.labels,
            difficulty: self.difficulty,
            time_estimate: self.time_estimate,
            status,
            comment_count: self.comment_count,
            freshness_score: self.freshness_score,
            created_at: self.created_at,
            indexed_at: self.indexed_at,
            repo: Some(self.repo.into()),
            skills,
            match_score: None,
            match_reasons: vec![],
            is_saved: false,
        }
    }
}

#[derive(Debug)]
pub struct IssueSkillRow {
    pub issue_id: Uuid,
    pub language: String,
    pub framework: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for IssueSkillRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            issue_id: row.try_get("issue_id")?,
            language: row.try_get("language")?,
            framework: row.try_get("framework")?,
        })
    }
}

impl From<IssueSkillRow> for IssueSkill {
    fn from(row: IssueSkillRow) -> Self {
        IssueSkill {
            language: row.language,
            framework: row.framework,
        }
    }
}

#[derive(Debug)]
pub struct UserRow {
    pub id: Uuid,
    pub github_id: i64,
    pub github_username: String,
    pub avatar_url: String,
    pub bio: String,
    pub role: String,
    pub comfort_level: String,
    pub time_commitment: String,
    pub goals: Vec<String>,
    pub onboarding_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const USER_COLUMNS: &str = r#"
    id, github_id, github_username, avatar_url, bio, role, comfort_level,
    time_commitment, goals, onboarding_done, created_at, updated_at
"#;

impl<'r> sqlx::FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            github_id: row.try_get("github_id")?,
            github_username: row.try_get("github_username")?,
            avatar_url: row.try_get("avatar_url")?,
            bio: row.try_get("bio")?,
            role: row.try_get("role")?,
            comfort_level: row.try_get("comfort_level")?,
            time_commitment: row.try_get("time_commitment")?,
            goals: row.try_get("goals")?,
            onboarding_done: row.try_get("onboarding_done")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl UserRow {
    pub fn into_user(self, skills: Vec<UserSkill>) -> User {
        let role = self.role.parse().unwrap_or(Role::User);
        User {
            id: self.id,
            github_id: self.github_id,
            github_username: self.github_username,
            avatar_url: self.avatar_url,
            bio: self.bio,
            role,
            comfort_level: self.comfort_level,
            time_commitment: self.time_commitment,
            goals: self.goals,
            onboarding_done: self.onboarding_done,
            skills,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug)]
pub struct UserSkillRow {
    pub language: String,
    pub proficiency: f64,
    pub source: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserSkillRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            language: row.try_get("language")?,
            proficiency: row.try_get("proficiency")?,
            source: row.try_get("source")?,
        })
    }
}

impl From<UserSkillRow> for UserSkill {
    fn from(row: UserSkillRow) -> Self {
        let source = match row.source.as_str() {
            "manual" => SkillSource::Manual,
            _ => SkillSource::Github,
        };
        UserSkill {
            language: row.language,
            proficiency: row.proficiency,
            source,
        }
    }
}

#[derive(Debug)]
pub struct UserSummaryRow {
    pub id: Uuid,
    pub github_username: String,
    pub avatar_url: String,
    pub role: String,
    pub onboarding_done: bool,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserSummaryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            github_username: row.try_get("github_username")?,
            avatar_url: row.try_get("avatar_url")?,
            role: row.try_get("role")?,
            onboarding_done: row.try_get("onboarding_done")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        UserSummary {
            id: row.id,
            github_username: row.github_username,
            avatar_url: row.avatar_url,
            role: row.role.parse().unwrap_or(Role::User),
            onboarding_done: row.onboarding_done,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for RefreshTokenRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            token_hash: row.try_get("token_hash")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
        }
    }
}
