// crates/core/src/models/deep_dive.rs
//! AI deep-dive briefing entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generated briefing for one (issue, user) pair.
///
/// `issue_indexed_at` captures the issue's `indexed_at` at generation time
/// and is the cache-invalidation witness: the row is served from cache only
/// while `issue_indexed_at >= issue.indexed_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepDive {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip)]
    pub issue_indexed_at: DateTime<Utc>,
    pub project_overview: String,
    pub issue_context: String,
    pub suggested_approach: String,
    pub questions_to_ask: String,
    pub red_flags: String,
    pub first_comment: String,
    pub model_used: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub created_at: DateTime<Utc>,
}

/// Writable deep-dive fields, upserted on `(issue_id, user_id)`.
#[derive(Debug, Clone)]
pub struct NewDeepDive {
    pub issue_id: Uuid,
    pub user_id: Uuid,
    pub issue_indexed_at: DateTime<Utc>,
    pub project_overview: String,
    pub issue_context: String,
    pub suggested_approach: String,
    pub questions_to_ask: String,
    pub red_flags: String,
    pub first_comment: String,
    pub model_used: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
}
