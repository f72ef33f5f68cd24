// crates/server/src/config.rs
//! Environment-driven configuration. Missing or malformed required values
//! are fatal at boot.

use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub github_client_id: String,
    pub github_client_secret: String,
    /// 32-byte AEAD key, hex-encoded.
    pub encrypt_key: String,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub backend_url: String,
    pub cookie_domain: String,
    pub env: String,
    /// Username auto-promoted to admin on login. Unset: the first user ever
    /// created becomes admin instead.
    pub admin_github_username: Option<String>,
    pub glm_api_key: Option<String>,
    /// `None` disables the scheduler (DISCOVERY_INTERVAL=0).
    pub discovery_interval: Option<Duration>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match optional("PORT") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let discovery_interval = match optional("DISCOVERY_INTERVAL") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|e| ConfigError::Invalid {
                    name: "DISCOVERY_INTERVAL",
                    reason: format!("{e}"),
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => Some(Duration::from_secs(DEFAULT_DISCOVERY_INTERVAL_SECS)),
        };

        Ok(Self {
            port,
            database_url: required("DATABASE_URL")?,
            redis_url: optional("REDIS_URL"),
            github_client_id: required("GITHUB_CLIENT_ID")?,
            github_client_secret: required("GITHUB_CLIENT_SECRET")?,
            encrypt_key: required("ENCRYPT_KEY")?,
            jwt_secret: required("JWT_SECRET")?,
            frontend_url: optional("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".into()),
            backend_url: optional("BACKEND_URL").unwrap_or_else(|| "http://localhost:8080".into()),
            cookie_domain: optional("COOKIE_DOMAIN").unwrap_or_else(|| "localhost".into()),
            env: optional("ENV").unwrap_or_else(|| "development".into()),
            admin_github_username: optional("ADMIN_GITHUB_USERNAME"),
            glm_api_key: optional("GLM_API_KEY"),
            discovery_interval,
        })
    }

    pub fn is_prod(&self) -> bool {
        self.env == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        "PORT",
        "DATABASE_URL",
        "REDIS_URL",
        "GITHUB_CLIENT_ID",
        "GITHUB_CLIENT_SECRET",
        "ENCRYPT_KEY",
        "JWT_SECRET",
        "FRONTEND_URL",
        "BACKEND_URL",
        "COOKIE_DOMAIN",
        "ENV",
        "ADMIN_GITHUB_USERNAME",
        "GLM_API_KEY",
        "DISCOVERY_INTERVAL",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    fn set_required() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/gitscout");
        std::env::set_var("GITHUB_CLIENT_ID", "id");
        std::env::set_var("GITHUB_CLIENT_SECRET", "secret");
        std::env::set_var("ENCRYPT_KEY", "00".repeat(32));
        std::env::set_var("JWT_SECRET", "jwt-secret");
    }

    #[test]
    #[serial]
    fn test_defaults_applied() {
        clear_env();
        set_required();

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cookie_domain, "localhost");
        assert!(!config.is_prod());
        assert_eq!(config.discovery_interval, Some(Duration::from_secs(3600)));
        assert!(config.glm_api_key.is_none());
        assert!(config.admin_github_username.is_none());
    }

    #[test]
    #[serial]
    fn test_missing_database_url_fails() {
        clear_env();
        set_required();
        std::env::remove_var("DATABASE_URL");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    #[serial]
    fn test_discovery_interval_zero_disables() {
        clear_env();
        set_required();
        std::env::set_var("DISCOVERY_INTERVAL", "0");

        let config = Config::from_env().unwrap();
        assert!(config.discovery_interval.is_none());
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_rejected() {
        clear_env();
        set_required();
        std::env::set_var("PORT", "not-a-port");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
    }

    #[test]
    #[serial]
    fn test_production_env_flag() {
        clear_env();
        set_required();
        std::env::set_var("ENV", "production");

        assert!(Config::from_env().unwrap().is_prod());
    }
}
