// crates/server/src/auth.rs
//! OAuth callback handling, token issuance, and refresh rotation.
//!
//! The GitHub access token is AES-GCM-encrypted before it touches the
//! database. Access JWTs live 15 minutes; opaque refresh tokens are stored
//! as SHA-256 hashes, live 7 days, and rotate on every use.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use gitscout_core::models::{NewUser, Role, User};
use gitscout_core::store::{RefreshTokenStore, StoreError, UserStore};
use gitscout_github::{GitHubClient, GitHubError};

use crate::crypto::{generate_refresh_token, hash_refresh_token, CryptoError, Encryptor, JwtManager};

const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("github error: {0}")]
    Upstream(#[from] GitHubError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub struct AuthResult {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    github: Arc<GitHubClient>,
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    encryptor: Encryptor,
    jwt: JwtManager,
    admin_username: Option<String>,
}

impl AuthService {
    pub fn new(
        github: Arc<GitHubClient>,
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        encryptor: Encryptor,
        jwt: JwtManager,
        admin_username: Option<String>,
    ) -> Self {
        Self {
            github,
            users,
            refresh_tokens,
            encryptor,
            jwt,
            admin_username,
        }
    }

    /// Exchange the OAuth code, upsert the user, and mint a token pair.
    pub async fn handle_callback(&self, code: &str) -> Result<AuthResult, AuthError> {
        let github_token = self.github.exchange_code(code).await?;
        let gh_user = self.github.get_authenticated_user(&github_token).await?;
        let token_enc = self.encryptor.encrypt(&github_token)?;

        let mut user = self
            .users
            .upsert(
                &NewUser {
                    github_id: gh_user.id,
                    github_username: gh_user.login.clone(),
                    avatar_url: gh_user.avatar_url.clone(),
                    bio: gh_user.bio.clone().unwrap_or_default(),
                },
                &token_enc,
            )
            .await?;

        self.maybe_promote(&mut user).await?;

        let pair = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, github_username = %user.github_username, "user authenticated");
        Ok(AuthResult {
            user,
            access_token: pair.0,
            refresh_token: pair.1,
        })
    }

    /// Admin bootstrap: an explicit username match wins; with no username
    /// configured, the first user ever created is promoted.
    async fn maybe_promote(&self, user: &mut User) -> Result<(), AuthError> {
        if user.role == Role::Admin {
            return Ok(());
        }
        let promote = match &self.admin_username {
            Some(admin) => &user.github_username == admin,
            None => self.users.count().await? == 1,
        };
        if promote {
            if let Err(err) = self.users.update_role(user.id, Role::Admin).await {
                warn!(user_id = %user.id, error = %err, "failed to auto-promote admin");
            } else {
                user.role = Role::Admin;
            }
        }
        Ok(())
    }

    /// Rotate a refresh token: the presented token is invalidated and a new
    /// pair is issued.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, AuthError> {
        let hash = hash_refresh_token(refresh_token);

        let stored = self
            .refresh_tokens
            .find_valid(&hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        self.refresh_tokens.delete_by_hash(&hash).await?;

        let user = self
            .users
            .get(stored.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let (access_token, refresh_token) = self.issue_tokens(&user).await?;
        Ok(AuthResult {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Drop every refresh token the user holds.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        Ok(self.refresh_tokens.delete_for_user(user_id).await?)
    }

    async fn issue_tokens(&self, user: &User) -> Result<(String, String), AuthError> {
        let access_token = self.jwt.generate(user.id)?;
        let (refresh_token, refresh_hash) = generate_refresh_token();
        self.refresh_tokens
            .insert(
                user.id,
                &refresh_hash,
                Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS),
            )
            .await?;
        Ok((access_token, refresh_token))
    }
}
