// crates/core/src/models/repo.rs
//! Repository and category entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An indexed GitHub repository.
///
/// `tags`, `difficulty_level`, `activity_status` and the category links are
/// curation fields: administrators own them and re-ingestion must never
/// overwrite them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: Uuid,
    pub github_id: i64,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub stars: i32,
    pub primary_language: String,
    pub topics: Vec<String>,
    pub has_contributing: bool,
    /// Composite quality signal in [0, 1]; see `scoring::health_score`.
    pub health_score: f64,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub indexed_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub difficulty_level: String,
    #[serde(default)]
    pub activity_status: String,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Writable repository fields for an upsert, keyed by `github_id`.
#[derive(Debug, Clone, Default)]
pub struct NewRepository {
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
}

/// Curated taxonomy entry; repositories link to categories many-to-many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique slug.
    pub slug: String,
    pub description: String,
    pub icon: String,
}

/// Admin listing row: repository plus issue count and categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoListItem {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub stars: i32,
    pub primary_language: String,
    pub issue_count: i64,
    pub indexed_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub difficulty_level: String,
    pub activity_status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
}
