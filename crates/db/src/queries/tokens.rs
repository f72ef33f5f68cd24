// crates/db/src/queries/tokens.rs
//! Refresh tokens: only the SHA-256 hash ever reaches the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gitscout_core::models::RefreshToken;
use gitscout_core::store::{RefreshTokenStore, StoreResult};

use super::row_types::RefreshTokenRow;
use crate::Database;

#[async_trait]
impl RefreshTokenStore for Database {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn find_valid(&self, token_hash: &[u8]) -> StoreResult<Option<RefreshToken>> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, token_hash, expires_at
            FROM refresh_tokens
            WHERE token_hash = $1 AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(row.map(RefreshToken::from))
    }

    async fn delete_by_hash(&self, token_hash: &[u8]) -> StoreResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }
}
