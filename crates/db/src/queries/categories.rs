// crates/db/src/queries/categories.rs

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use gitscout_core::models::Category;
use gitscout_core::store::{CategoryStore, StoreResult};

use crate::Database;

#[derive(Debug)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    icon: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CategoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
        })
    }
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            icon: row.icon,
        }
    }
}

#[async_trait]
impl CategoryStore for Database {
    async fn list(&self) -> StoreResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, slug, description, icon FROM categories ORDER BY name ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(rows.into_iter().map(Category::from).collect())
    }
}
