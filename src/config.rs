//! Configuration management

use anyhow::{self, Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// JWT secret key for token signing/validation
    pub jwt_secret: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set — generate one with: openssl rand -base64 48")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        Ok(Self {
            nats_url,
            database_url,
            jwt_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_SECRET: &str = "a-test-secret-that-is-definitely-long-enough";

    #[test]
    fn test_config_loads_with_required_vars() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", LONG_SECRET);

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, "postgres://test");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_short_jwt_secret_rejected() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", "short");

        let result = Config::from_env();
        assert!(result.is_err());

        // Cleanup for the other tests
        std::env::set_var("JWT_SECRET", LONG_SECRET);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_nats_url_has_default() {
        std::env::remove_var("NATS_URL");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", LONG_SECRET);

        let config = Config::from_env().unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
    }

    #[test]
    fn test_config_nats_url_uses_env_when_set() {
        std::env::set_var("NATS_URL", "nats://nats.internal:4222");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", LONG_SECRET);

        let config = Config::from_env().unwrap();
        assert_eq!(config.nats_url, "nats://nats.internal:4222");

        // Cleanup
        std::env::remove_var("NATS_URL");
    }
}
