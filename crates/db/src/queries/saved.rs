// crates/db/src/queries/saved.rs
//! Saved-issue links. Saving is idempotent on (user_id, issue_id).

use async_trait::async_trait;
use uuid::Uuid;

use gitscout_core::models::Issue;
use gitscout_core::store::{SavedIssueStore, StoreResult};

use super::row_types::{IssueRow, ISSUE_COLUMNS};
use crate::Database;

#[async_trait]
impl SavedIssueStore for Database {
    async fn save(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO saved_issues (user_id, issue_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, issue_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(issue_id)
        .execute(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn unsave(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM saved_issues WHERE user_id = $1 AND issue_id = $2")
            .bind(user_id)
            .bind(issue_id)
            .execute(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn is_saved(&self, user_id: Uuid, issue_id: Uuid) -> StoreResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM saved_issues WHERE user_id = $1 AND issue_id = $2)",
        )
        .bind(user_id)
        .bind(issue_id)
        .fetch_one(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(exists)
    }

    async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let total = self.count_for_user(user_id).await?;

        let rows: Vec<IssueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM saved_issues si
            JOIN issues i ON i.id = si.issue_id
            JOIN repositories r ON r.id = i.repo_id
            WHERE si.user_id = $1
            ORDER BY si.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        let issues = rows
            .into_iter()
            .map(|row| {
                let mut issue = row.into_issue(vec![]);
                issue.is_saved = true;
                issue
            })
            .collect();
        Ok((issues, total))
    }

    async fn saved_ids(&self, user_id: Uuid, issue_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        if issue_ids.is_empty() {
            return Ok(vec![]);
        }
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT issue_id FROM saved_issues WHERE user_id = $1 AND issue_id = ANY($2)",
        )
        .bind(user_id)
        .bind(issue_ids)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM saved_issues WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool())
                .await
                .map_err(Self::store_err)?;
        Ok(count)
    }
}
