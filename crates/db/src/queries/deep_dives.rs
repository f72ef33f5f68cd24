// crates/db/src/queries/deep_dives.rs
//! Deep-dive cache rows, keyed by (issue_id, user_id). Last writer wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use gitscout_core::models::{DeepDive, NewDeepDive};
use gitscout_core::store::{DeepDiveStore, StoreResult};

use crate::Database;

#[derive(Debug)]
struct DeepDiveRow {
    id: Uuid,
    issue_id: Uuid,
    user_id: Uuid,
    issue_indexed_at: DateTime<Utc>,
    project_overview: String,
    issue_context: String,
    suggested_approach: String,
    questions_to_ask: String,
    red_flags: String,
    first_comment: String,
    model_used: String,
    prompt_tokens: i32,
    completion_tokens: i32,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for DeepDiveRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            issue_id: row.try_get("issue_id")?,
            user_id: row.try_get("user_id")?,
            issue_indexed_at: row.try_get("issue_indexed_at")?,
            project_overview: row.try_get("project_overview")?,
            issue_context: row.try_get("issue_context")?,
            suggested_approach: row.try_get("suggested_approach")?,
            questions_to_ask: row.try_get("questions_to_ask")?,
            red_flags: row.try_get("red_flags")?,
            first_comment: row.try_get("first_comment")?,
            model_used: row.try_get("model_used")?,
            prompt_tokens: row.try_get("prompt_tokens")?,
            completion_tokens: row.try_get("completion_tokens")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<DeepDiveRow> for DeepDive {
    fn from(row: DeepDiveRow) -> Self {
        DeepDive {
            id: row.id,
            issue_id: row.issue_id,
            user_id: row.user_id,
            issue_indexed_at: row.issue_indexed_at,
            project_overview: row.project_overview,
            issue_context: row.issue_context,
            suggested_approach: row.suggested_approach,
            questions_to_ask: row.questions_to_ask,
            red_flags: row.red_flags,
            first_comment: row.first_comment,
            model_used: row.model_used,
            prompt_tokens: row.prompt_tokens,
            completion_tokens: row.completion_tokens,
            created_at: row.created_at,
        }
    }
}

const DEEP_DIVE_COLUMNS: &str = r#"
    id, issue_id, user_id, issue_indexed_at, project_overview, issue_context,
    suggested_approach, questions_to_ask, red_flags, first_comment,
    model_used, prompt_tokens, completion_tokens, created_at
"#;

#[async_trait]
impl DeepDiveStore for Database {
    async fn get(&self, issue_id: Uuid, user_id: Uuid) -> StoreResult<Option<DeepDive>> {
        let row: Option<DeepDiveRow> = sqlx::query_as(&format!(
            "SELECT {DEEP_DIVE_COLUMNS} FROM deep_dives WHERE issue_id = $1 AND user_id = $2"
        ))
        .bind(issue_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(Self::store_err)?;

        Ok(row.map(DeepDive::from))
    }

    async fn upsert(&self, dd: &NewDeepDive) -> StoreResult<DeepDive> {
        let row: DeepDiveRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO deep_dives (issue_id, user_id, issue_indexed_at,
                project_overview, issue_context, suggested_approach,
                questions_to_ask, red_flags, first_comment, model_used,
                prompt_tokens, completion_tokens)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (issue_id, user_id) DO UPDATE SET
                issue_indexed_at = EXCLUDED.issue_indexed_at,
                project_overview = EXCLUDED.project_overview,
                issue_context = EXCLUDED.issue_context,
                suggested_approach = EXCLUDED.suggested_approach,
                questions_to_ask = EXCLUDED.questions_to_ask,
                red_flags = EXCLUDED.red_flags,
                first_comment = EXCLUDED.first_comment,
                model_used = EXCLUDED.model_used,
                prompt_tokens = EXCLUDED.prompt_tokens,
                completion_tokens = EXCLUDED.completion_tokens,
                created_at = NOW()
            RETURNING {DEEP_DIVE_COLUMNS}
            "#
        ))
        .bind(dd.issue_id)
        .bind(dd.user_id)
        .bind(dd.issue_indexed_at)
        .bind(&dd.project_overview)
        .bind(&dd.issue_context)
        .bind(&dd.suggested_approach)
        .bind(&dd.questions_to_ask)
        .bind(&dd.red_flags)
        .bind(&dd.first_comment)
        .bind(&dd.model_used)
        .bind(dd.prompt_tokens)
        .bind(dd.completion_tokens)
        .fetch_one(self.pool())
        .await
        .map_err(Self::store_err)?;

        Ok(row.into())
    }
}
