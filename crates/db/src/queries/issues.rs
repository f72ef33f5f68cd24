// crates/db/src/queries/issues.rs
//! Issue reads and writes. Upserts are keyed by `(github_id, repo_id)` and
//! refresh `indexed_at` on every call; skill tags are replaced inside one
//! transaction so readers never see a torn set.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use gitscout_core::models::{FeedFilter, Issue, IssueSkill, NewIssue};
use gitscout_core::store::{IssueStore, StoreResult};

use super::row_types::{IssueRow, IssueSkillRow, ISSUE_COLUMNS};
use crate::Database;

impl Database {
    /// Skill tags for a batch of issues, grouped by issue id.
    async fn skills_for(&self, issue_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<IssueSkill>>> {
        if issue_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<IssueSkillRow> = sqlx::query_as(
            "SELECT issue_id, language, framework FROM issue_skills WHERE issue_id = ANY($1)",
        )
        .bind(issue_ids)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        let mut grouped: HashMap<Uuid, Vec<IssueSkill>> = HashMap::new();
        for row in rows {
            grouped.entry(row.issue_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    fn hydrate(rows: Vec<IssueRow>, mut skills: HashMap<Uuid, Vec<IssueSkill>>) -> Vec<Issue> {
        rows.into_iter()
            .map(|row| {
                let issue_skills = skills.remove(&row.id).unwrap_or_default();
                row.into_issue(issue_skills)
            })
            .collect()
    }
}

/// Shared feed predicate: open issues, optional language / difficulty /
/// category filters. `$1` text[] (lowercased) or NULL, `$2` int or NULL,
/// `$3` category slug or NULL.
const FEED_WHERE: &str = r#"
    i.status = 'open'
    AND ($1::text[] IS NULL OR EXISTS (
        SELECT 1 FROM issue_skills s
        WHERE s.issue_id = i.id AND LOWER(s.language) = ANY($1)
    ))
    AND ($2::int IS NULL OR i.difficulty = $2)
    AND ($3::text IS NULL OR EXISTS (
        SELECT 1 FROM repo_categories rc
        JOIN categories c ON c.id = rc.category_id
        WHERE rc.repo_id = i.repo_id AND c.slug = $3
    ))
"#;

#[async_trait]
impl IssueStore for Database {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Issue>> {
        let row: Option<IssueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues i
            JOIN repositories r ON r.id = i.repo_id
            WHERE i.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(Self::store_err)?;

        let Some(row) = row else { return Ok(None) };
        let mut skills = self.skills_for(&[row.id]).await?;
        let issue_skills = skills.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_issue(issue_skills)))
    }

    async fn feed(
        &self,
        filter: &FeedFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let languages: Option<Vec<String>> = if filter.languages.is_empty() {
            None
        } else {
            Some(filter.languages.iter().map(|l| l.to_lowercase()).collect())
        };

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM issues i WHERE {FEED_WHERE}"
        ))
        .bind(&languages)
        .bind(filter.difficulty)
        .bind(&filter.category)
        .fetch_one(self.pool())
        .await
        .map_err(Self::store_err)?;

        let rows: Vec<IssueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues i
            JOIN repositories r ON r.id = i.repo_id
            WHERE {FEED_WHERE}
            ORDER BY i.freshness_score DESC, i.created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(&languages)
        .bind(filter.difficulty)
        .bind(&filter.category)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let skills = self.skills_for(&ids).await?;
        Ok((Self::hydrate(rows, skills), total))
    }

    async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let pattern = format!("%{query}%");

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM issues i
            WHERE i.status = 'open' AND (i.title ILIKE $1 OR i.body ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(self.pool())
        .await
        .map_err(Self::store_err)?;

        let rows: Vec<IssueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues i
            JOIN repositories r ON r.id = i.repo_id
            WHERE i.status = 'open' AND (i.title ILIKE $1 OR i.body ILIKE $1)
            ORDER BY i.freshness_score DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let skills = self.skills_for(&ids).await?;
        Ok((Self::hydrate(rows, skills), total))
    }

    async fn upsert(&self, issue: &NewIssue) -> StoreResult<Issue> {
        let row: IssueRow = sqlx::query_as(&format!(
            r#"
            WITH upserted AS (
                INSERT INTO issues (github_id, repo_id, number, title, body, summary,
                    labels, difficulty, time_estimate, status, comment_count,
                    freshness_score, indexed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
                ON CONFLICT (github_id, repo_id) DO UPDATE SET
                    number = EXCLUDED.number,
                    title = EXCLUDED.title,
                    body = EXCLUDED.body,
                    summary = EXCLUDED.summary,
                    labels = EXCLUDED.labels,
                    difficulty = EXCLUDED.difficulty,
                    time_estimate = EXCLUDED.time_estimate,
                    status = EXCLUDED.status,
                    comment_count = EXCLUDED.comment_count,
                    freshness_score = EXCLUDED.freshness_score,
                    indexed_at = NOW()
                RETURNING *
            )
            SELECT {ISSUE_COLUMNS}
            FROM upserted i
            JOIN repositories r ON r.id = i.repo_id
            "#
        ))
        .bind(issue.github_id)
        .bind(issue.repo_id)
        .bind(issue.number)
        .bind(&issue.title)
        .bind(&issue.body)
        .bind(&issue.summary)
        .bind(&issue.labels)
        .bind(issue.difficulty)
        .bind(&issue.time_estimate)
        .bind(issue.status.as_str())
        .bind(issue.comment_count)
        .bind(issue.freshness_score)
        .fetch_one(self.pool())
        .await
        .map_err(Self::store_err)?;

        Ok(row.into_issue(vec![]))
    }

    async fn set_skills(&self, issue_id: Uuid, skills: &[IssueSkill]) -> StoreResult<()> {
        let mut tx = self.pool().begin().await.map_err(Self::store_err)?;

        sqlx::query("DELETE FROM issue_skills WHERE issue_id = $1")
            .bind(issue_id)
            .execute(&mut *tx)
            .await
            .map_err(Self::store_err)?;

        for skill in skills {
            sqlx::query(
                r#"
                INSERT INTO issue_skills (issue_id, language, framework)
                VALUES ($1, $2, $3)
                ON CONFLICT (issue_id, language, framework) DO NOTHING
                "#,
            )
            .bind(issue_id)
            .bind(&skill.language)
            .bind(&skill.framework)
            .execute(&mut *tx)
            .await
            .map_err(Self::store_err)?;
        }

        tx.commit().await.map_err(Self::store_err)
    }

    async fn count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issues")
            .fetch_one(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(count)
    }
}
