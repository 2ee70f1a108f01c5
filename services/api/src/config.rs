//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// The single-page client's origin, allowed by CORS with credentials.
    pub client_origin: String,
    /// Fixed session lifetime; expiry is checked when the cookie is presented.
    pub session_ttl_hours: i64,
    /// Whether the session cookie carries the `Secure` attribute. Off for
    /// plain-HTTP local development.
    pub cookie_secure: bool,
    /// Credentials for the bootstrap administrator account, created at
    /// startup when no system admin exists.
    pub seed_admin_email: String,
    pub seed_admin_password: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let client_origin = std::env::var("CLIENT_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let session_ttl_hours = match std::env::var("SESSION_TTL_HOURS") {
            Ok(raw) => raw.parse::<i64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "SESSION_TTL_HOURS".to_string(),
                    format!("'{}' is not a number of hours", raw),
                )
            })?,
            Err(_) => 24,
        };

        let cookie_secure = match std::env::var("COOKIE_SECURE") {
            Ok(raw) => raw.parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(
                    "COOKIE_SECURE".to_string(),
                    format!("'{}' is not a boolean", raw),
                )
            })?,
            Err(_) => false,
        };

        let seed_admin_email = std::env::var("SEED_ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@hospital.com".to_string());
        let seed_admin_password =
            std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "Admin123!".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            client_origin,
            session_ttl_hours,
            cookie_secure,
            seed_admin_email,
            seed_admin_password,
        })
    }
}
