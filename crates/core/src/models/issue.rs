// crates/core/src/models/issue.rs
//! Issue entity, skill tags, and feed types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::Repository;

/// Issue lifecycle state as reported by the hosting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Open,
    Closed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(IssueStatus::Open),
            "closed" => Ok(IssueStatus::Closed),
            other => Err(format!("unknown issue status: {other}")),
        }
    }
}

/// A language (and optionally framework) an issue calls for. Derived from
/// the repository's language breakdown during indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSkill {
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub framework: String,
}

/// An indexed issue, optionally hydrated with its repository, skill tags,
/// and per-viewer match/saved annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub github_id: i64,
    pub repo_id: Uuid,
    pub number: i32,
    pub title: String,
    pub body: String,
    pub summary: String,
    pub labels: Vec<String>,
    /// 1 = beginner, 2 = intermediate, 3 = advanced.
    pub difficulty: i32,
    pub time_estimate: String,
    pub status: IssueStatus,
    pub comment_count: i32,
    /// [0, 1], monotone-decreasing in age since last update.
    pub freshness_score: f64,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<Repository>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<IssueSkill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_reasons: Vec<String>,
    #[serde(default)]
    pub is_saved: bool,
}

/// Writable issue fields for an upsert, keyed by `(github_id, repo_id)`.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub github_id: i64,
    pub repo_id: Uuid,
    pub number: i32,
    pub title: String,
    pub body: String,
    pub summary: String,
    pub labels: Vec<String>,
    pub difficulty: i32,
    pub time_estimate: String,
    pub status: IssueStatus,
    pub comment_count: i32,
    pub freshness_score: f64,
}

/// Feed filters. Empty vectors / `None` mean "any".
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub languages: Vec<String>,
    pub difficulty: Option<i32>,
    /// Category slug.
    pub category: Option<String>,
}

/// One page of issues plus pagination envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    pub total_count: i64,
    pub page: i64,
    pub per_page: i64,
}
