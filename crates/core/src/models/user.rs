// crates/core/src/models/user.rs
//! User, skill, and refresh-token entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Where a recorded skill came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillSource {
    Github,
    Manual,
}

impl SkillSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillSource::Github => "github",
            SkillSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSkill {
    pub language: String,
    /// [0, 1] share of the user's public code in this language (github
    /// source) or a flat default (manual source).
    pub proficiency: f64,
    pub source: SkillSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub github_id: i64,
    pub github_username: String,
    pub avatar_url: String,
    pub bio: String,
    pub role: Role,
    pub comfort_level: String,
    pub time_commitment: String,
    pub goals: Vec<String>,
    pub onboarding_done: bool,
    #[serde(default)]
    pub skills: Vec<UserSkill>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity fields written on every login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub github_id: i64,
    pub github_username: String,
    pub avatar_url: String,
    pub bio: String,
}

/// Onboarding profile patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub comfort_level: String,
    pub time_commitment: String,
    pub goals: Vec<String>,
}

/// Admin listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub github_username: String,
    pub avatar_url: String,
    pub role: Role,
    pub onboarding_done: bool,
    pub created_at: DateTime<Utc>,
}

/// Opaque refresh token at rest: only the SHA-256 hash is stored.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.as_str(), "user");
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_skill_source_serde() {
        let skill = UserSkill {
            language: "Go".into(),
            proficiency: 0.8,
            source: SkillSource::Github,
        };
        let json = serde_json::to_string(&skill).unwrap();
        assert!(json.contains("\"source\":\"github\""));
    }
}
