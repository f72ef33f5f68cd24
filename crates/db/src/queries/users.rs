// crates/db/src/queries/users.rs
//! User CRUD, skill replacement, and the encrypted-token column.

use async_trait::async_trait;
use uuid::Uuid;

use gitscout_core::models::{NewUser, Role, SkillSource, User, UserProfile, UserSkill, UserSummary};
use gitscout_core::store::{StoreResult, UserStore};

use super::row_types::{UserRow, UserSkillRow, UserSummaryRow, USER_COLUMNS};
use crate::Database;

impl Database {
    async fn user_skills(&self, user_id: Uuid) -> StoreResult<Vec<UserSkill>> {
        let rows: Vec<UserSkillRow> = sqlx::query_as(
            r#"
            SELECT language, proficiency, source FROM user_skills
            WHERE user_id = $1
            ORDER BY proficiency DESC, language ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(rows.into_iter().map(UserSkill::from).collect())
    }
}

#[async_trait]
impl UserStore for Database {
    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(Self::store_err)?;

        let Some(row) = row else { return Ok(None) };
        let skills = self.user_skills(row.id).await?;
        Ok(Some(row.into_user(skills)))
    }

    async fn upsert(&self, user: &NewUser, access_token_enc: &[u8]) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (github_id, github_username, avatar_url, bio, access_token_enc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (github_id) DO UPDATE SET
                github_username = EXCLUDED.github_username,
                avatar_url = EXCLUDED.avatar_url,
                bio = EXCLUDED.bio,
                access_token_enc = EXCLUDED.access_token_enc,
                updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.github_id)
        .bind(&user.github_username)
        .bind(&user.avatar_url)
        .bind(&user.bio)
        .bind(access_token_enc)
        .fetch_one(self.pool())
        .await
        .map_err(Self::store_err)?;

        let skills = self.user_skills(row.id).await?;
        Ok(row.into_user(skills))
    }

    async fn update_profile(&self, id: Uuid, profile: &UserProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                comfort_level = $2,
                time_commitment = $3,
                goals = $4,
                onboarding_done = TRUE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&profile.comfort_level)
        .bind(&profile.time_commitment)
        .bind(&profile.goals)
        .execute(self.pool())
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<()> {
        sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role.as_str())
            .execute(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn replace_skills(
        &self,
        user_id: Uuid,
        source: SkillSource,
        skills: &[UserSkill],
    ) -> StoreResult<()> {
        let mut tx = self.pool().begin().await.map_err(Self::store_err)?;

        sqlx::query("DELETE FROM user_skills WHERE user_id = $1 AND source = $2")
            .bind(user_id)
            .bind(source.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Self::store_err)?;

        for skill in skills {
            sqlx::query(
                r#"
                INSERT INTO user_skills (user_id, language, proficiency, source)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, language, source) DO UPDATE SET
                    proficiency = EXCLUDED.proficiency
                "#,
            )
            .bind(user_id)
            .bind(&skill.language)
            .bind(skill.proficiency)
            .bind(source.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Self::store_err)?;
        }

        tx.commit().await.map_err(Self::store_err)
    }

    async fn access_token_enc(&self, user_id: Uuid) -> StoreResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT access_token_enc FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await
                .map_err(Self::store_err)?;
        Ok(row.map(|(enc,)| enc).filter(|enc| !enc.is_empty()))
    }

    async fn count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await
            .map_err(Self::store_err)?;
        Ok(count)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<(Vec<UserSummary>, i64)> {
        let total = UserStore::count(self).await?;

        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            r#"
            SELECT id, github_username, avatar_url, role, onboarding_done, created_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(Self::store_err)?;

        Ok((rows.into_iter().map(UserSummary::from).collect(), total))
    }
}
