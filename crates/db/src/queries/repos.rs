// crates/db/src/queries/repos.rs
//! Repository CRUD. The upsert deliberately never writes curation columns
//! (tags, difficulty_level, activity_status, category links): those are
//! administrator-owned and survive re-ingestion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use gitscout_core::models::{Category, NewRepository, RepoListItem, Repository};
use gitscout_core::store::{RepoStore, StoreResult};

use super::row_types::RepoRow;
use crate::Database;

const REPO_COLUMNS: &str = r#"
    id, github_id, owner, name, description, stars, primary_language, topics,
    has_contributing, health_score, last_commit_at, indexed_at, tags,
    difficulty_level, activity_status
"#;

struct RepoCountRow {
    id: Uuid,
    owner: String,
    name: String,
    stars: i32,
    primary_language: String,
    issue_count: i64,
    indexed_at: DateTime<Utc>,
    tags: Vec<String>,
    difficulty_level: String,
    activity_status: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for RepoCountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner: row.try_get("owner")?,
            name: row.try_get("name")?,
            stars: row.try_get("stars")?,
            primary_language: row.try_get("primary_language")?,
            issue_count: row.try_get("issue_count")?,
            indexed_at: row.try_get("indexed_at")?,
            tags: row.try_get("tags")?,
            difficulty_level: row.try_get("difficulty_level")?,
            activity_status: row.try_get("activity_status")?,
        })
    }
}

struct RepoCategoryRow {
    repo_id: Uuid,
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    icon: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for RepoCategoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            repo_id: row.try_get("repo_id")?,
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
        })
    }
}

#[async_trait]
impl RepoStore for Database {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Repository>> {
        let row: Option<RepoRow> = sqlx::query_as(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(Self::store_err)?;

        Ok(row.map(Repository::from))
    }

    async fn upsert(&self, repo: &NewRepository) -> StoreResult<Repository> {
        let row: RepoRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO repositories (github_id, owner, name, description, stars,
                primary_language, topics, has_contributing, health_score,
                last_commit_at, indexed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            ON CONFLICT (github_id) DO UPDATE SET
                owner = EXCLUDED.owner,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                stars = EXCLUDED.stars,
                primary_language = EXCLUDED.primary_language,
                topics = EXCLUDED.topics,
                has_contributing = EXCLUDED.has_contributing,
                health_score = EXCLUDED.health_score,
                last_commit_at = EXCLUDED.last_commit_at,
                indexed_at = NOW()
            RETURNING {REPO_COLUMNS}
            "#
        ))
        .bind(repo.github_id)
        .bind(&repo.owner)
        .bind(&repo.name)
        .bind(&repo.description)
        .bind(repo.stars)
        .bind(&repo.primary_language)
        .bind(&repo.topics)
        .bind(repo.has_contributing)
        .bind(repo.health_score)
        .bind(repo.last_commit_at)
        .fetch_one(self.pool())
        .await
        .map_err(Self::store_err)?;

        Ok(row.into())
    }

    async fn list_all(&self) -> StoreResult<Vec<Repository>> {
        let rows: Vec<RepoRow> = sqlx::query_as(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories ORDER BY stars DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        Ok(rows.into_iter().map(Repository::from).collect())
    }

    async fn all_github_ids(&self) -> StoreResult<Vec<i64>> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT github_id FROM repositories")
            .fetch_all(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM repositories")
            .fetch_one(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(count)
    }

    async fn list_with_issue_counts(
        &self,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RepoListItem>, i64)> {
        let total = RepoStore::count(self).await?;

        let rows: Vec<RepoCountRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.owner, r.name, r.stars, r.primary_language,
                COUNT(i.id) AS issue_count, r.indexed_at, r.tags,
                r.difficulty_level, r.activity_status
            FROM repositories r
            LEFT JOIN issues i ON i.repo_id = r.id
            GROUP BY r.id
            ORDER BY r.stars DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        let repo_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let category_rows: Vec<RepoCategoryRow> = sqlx::query_as(
            r#"
            SELECT rc.repo_id, c.id, c.name, c.slug, c.description, c.icon
            FROM repo_categories rc
            JOIN categories c ON c.id = rc.category_id
            WHERE rc.repo_id = ANY($1)
            "#,
        )
        .bind(&repo_ids)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        let mut by_repo: HashMap<Uuid, Vec<Category>> = HashMap::new();
        for row in category_rows {
            by_repo.entry(row.repo_id).or_default().push(Category {
                id: row.id,
                name: row.name,
                slug: row.slug,
                description: row.description,
                icon: row.icon,
            });
        }

        let items = rows
            .into_iter()
            .map(|r| RepoListItem {
                categories: by_repo.remove(&r.id).unwrap_or_default(),
                id: r.id,
                owner: r.owner,
                name: r.name,
                stars: r.stars,
                primary_language: r.primary_language,
                issue_count: r.issue_count,
                indexed_at: r.indexed_at,
                tags: r.tags,
                difficulty_level: r.difficulty_level,
                activity_status: r.activity_status,
            })
            .collect();

        Ok((items, total))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM repositories WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn update_curation(
        &self,
        id: Uuid,
        tags: &[String],
        difficulty_level: &str,
        activity_status: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE repositories
            SET tags = $2, difficulty_level = $3, activity_status = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(tags)
        .bind(difficulty_level)
        .bind(activity_status)
        .execute(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn assign_category(&self, repo_id: Uuid, category_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO repo_categories (repo_id, category_id)
            VALUES ($1, $2)
            ON CONFLICT (repo_id, category_id) DO NOTHING
            "#,
        )
        .bind(repo_id)
        .bind(category_id)
        .execute(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn remove_category(&self, repo_id: Uuid, category_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM repo_categories WHERE repo_id = $1 AND category_id = $2")
            .bind(repo_id)
            .bind(category_id)
            .execute(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }
}
